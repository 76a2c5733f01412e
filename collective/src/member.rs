use std::time::Duration;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::debug;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    COORDINATOR, Chunk, CollectiveErr, Communicator, Result, coordinator::unexpected, guarded,
};

/// A rank other than 0, talks to the coordinator only.
#[derive(Debug)]
pub struct Member<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rank: usize,
    size: usize,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    timeout: Option<Duration>,
}

impl<R, W> Member<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Member`.
    ///
    /// # Arguments
    /// * `rank` - This process' rank, in `1..size`.
    /// * `size` - The total amount of processes.
    /// * `rx` - The receiving end of the channel to the coordinator.
    /// * `tx` - The sending end of the channel to the coordinator.
    /// * `timeout` - The limit for every collective, `None` waits forever.
    ///
    /// # Returns
    /// A new `Member` or an error if `rank` is out of range.
    pub fn new(
        rank: usize,
        size: usize,
        rx: OnoReceiver<R>,
        tx: OnoSender<W>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        if rank == COORDINATOR || rank >= size {
            return Err(CollectiveErr::InvalidRank { rank, size });
        }

        Ok(Self {
            rank,
            size,
            rx,
            tx,
            timeout,
        })
    }
}

/// Validates the count and offset tables against the topology and the local contribution.
///
/// The `offsets[r]..offsets[r] + counts[r]` ranges must cover the output exactly once,
/// empty ones may sit anywhere inside it.
///
/// # Returns
/// The length of the gathered output.
pub(crate) fn check_tables(
    size: usize,
    rank: usize,
    local: &[f64],
    counts: &[usize],
    offsets: &[usize],
) -> Result<usize> {
    for table in [counts.len(), offsets.len()] {
        if table != size {
            return Err(CollectiveErr::SizeMismatch {
                op: "gather_varying",
                got: table,
                expected: size,
            });
        }
    }

    if local.len() != counts[rank] {
        return Err(CollectiveErr::SizeMismatch {
            op: "gather_varying",
            got: local.len(),
            expected: counts[rank],
        });
    }

    let mut ranges: Vec<_> = offsets
        .iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (_, count))| **count > 0)
        .map(|(owner, (&offset, &count))| (offset, owner, count))
        .collect();
    ranges.sort_unstable();

    let mut total = 0;
    for (offset, owner, count) in ranges {
        if offset != total {
            return Err(CollectiveErr::OffsetMismatch {
                rank: owner,
                got: offset,
                expected: total,
            });
        }
        total += count;
    }

    if let Some(&offset) = offsets.iter().find(|&&offset| offset > total) {
        return Err(CollectiveErr::SizeMismatch {
            op: "gather_varying",
            got: offset,
            expected: total,
        });
    }

    Ok(total)
}

impl<R, W> Communicator for Member<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn broadcast<T>(&mut self, _value: Option<T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let limit = self.timeout;

        guarded("broadcast", limit, async {
            match self.rx.recv().await? {
                Msg::Control(Command::Broadcast(value)) => Ok(serde_json::from_value(value)?),
                msg => Err(unexpected("broadcast", COORDINATOR, msg)),
            }
        })
        .await
    }

    async fn send_chunk(
        &mut self,
        _dest: usize,
        _rows: usize,
        _cols: usize,
        _data: &[f64],
    ) -> Result<()> {
        Err(CollectiveErr::RoleMismatch {
            op: "send_chunk",
            rank: self.rank,
        })
    }

    async fn recv_chunk(&mut self) -> Result<Chunk> {
        let limit = self.timeout;
        let rank = self.rank;

        guarded("recv_chunk", limit, async {
            let mut chunk = Chunk {
                rows: 0,
                cols: 0,
                data: Vec::new(),
            };
            let mut received = 0;
            let mut frames = 0;

            loop {
                let (rows, cols, first, batch, data) = match self.rx.recv().await? {
                    Msg::Data(Payload::Chunk {
                        rows,
                        cols,
                        first,
                        batch,
                        data,
                    }) => (rows, cols, first, batch, data),
                    msg => return Err(unexpected("recv_chunk", COORDINATOR, msg)),
                };

                if frames == 0 {
                    chunk = Chunk {
                        rows,
                        cols,
                        data: Vec::with_capacity(data.len()),
                    };
                } else if (rows, cols) != (chunk.rows, chunk.cols) {
                    return Err(CollectiveErr::UnexpectedMessage {
                        op: "recv_chunk",
                        rank: COORDINATOR,
                        got: "data/chunk",
                    });
                }

                // batches arrive in row order
                if first != received {
                    return Err(CollectiveErr::SizeMismatch {
                        op: "recv_chunk",
                        got: first,
                        expected: received,
                    });
                }

                chunk.data.extend_from_slice(data);
                received += batch;
                frames += 1;

                if received == rows {
                    break;
                }
            }

            debug!(rank = rank, rows = chunk.rows, frames = frames; "received chunk");
            Ok(chunk)
        })
        .await
    }

    async fn gather_varying(
        &mut self,
        local: &[f64],
        counts: &[usize],
        offsets: &[usize],
    ) -> Result<Option<Vec<f64>>> {
        check_tables(self.size, self.rank, local, counts, offsets)?;

        let limit = self.timeout;
        let msg = Msg::Data(Payload::Results(local));

        guarded("gather_varying", limit, async {
            self.tx.send(&msg).await?;
            Ok::<_, CollectiveErr>(None)
        })
        .await
    }

    async fn barrier(&mut self) -> Result<()> {
        let limit = self.timeout;

        guarded("barrier", limit, async {
            self.tx.send(&Msg::Control(Command::BarrierEnter)).await?;

            match self.rx.recv().await? {
                Msg::Control(Command::BarrierRelease) => Ok(()),
                msg => Err(unexpected("barrier", COORDINATOR, msg)),
            }
        })
        .await
    }

    async fn abort(&mut self, detail: &str) -> Result<()> {
        let limit = self.timeout;
        let msg = Msg::Err(detail.into());

        guarded("abort", limit, async {
            self.tx.send(&msg).await?;
            Ok::<_, CollectiveErr>(())
        })
        .await
    }
}

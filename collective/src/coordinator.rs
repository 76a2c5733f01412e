use std::time::Duration;

use comms::{
    MAX_FRAME_LEN, OnoReceiver, OnoSender,
    msg::{CHUNK_HEADER_LEN, Command, Msg, Payload},
};
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    COORDINATOR, Chunk, CollectiveErr, Communicator, Result, guarded, member::check_tables,
};

/// The channel to a single member, identified by its rank.
struct Peer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rank: usize,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
}

/// The rank 0 end of the star, holds one channel per member.
pub struct Coordinator<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    peers: Vec<Peer<R, W>>,
    timeout: Option<Duration>,
    frame_limit: usize,
}

impl<R, W> Coordinator<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Coordinator`.
    ///
    /// # Arguments
    /// * `channels` - One channel per member, the i-th one belongs to rank `i + 1`.
    /// * `timeout` - The limit for every collective, `None` waits forever.
    ///
    /// # Returns
    /// A new `Coordinator` instance for `channels.len() + 1` processes.
    pub fn new(channels: Vec<(OnoReceiver<R>, OnoSender<W>)>, timeout: Option<Duration>) -> Self {
        let peers = channels
            .into_iter()
            .enumerate()
            .map(|(i, (rx, tx))| Peer { rank: i + 1, rx, tx })
            .collect();

        Self {
            peers,
            timeout,
            frame_limit: MAX_FRAME_LEN,
        }
    }

    /// Caps the size of every chunk frame this coordinator sends.
    ///
    /// Chunks bigger than `bytes` are sent as several batches of rows. Values above
    /// `comms::MAX_FRAME_LEN` are lowered to it.
    pub fn with_frame_limit(mut self, bytes: usize) -> Self {
        self.frame_limit = bytes.min(MAX_FRAME_LEN);
        self
    }

    /// The amount of rows of `cols` values that fit in a single chunk frame.
    fn rows_per_frame(&self, rows: usize, cols: usize) -> Result<usize> {
        let budget = self.frame_limit.saturating_sub(CHUNK_HEADER_LEN);
        let row_bytes = cols.saturating_mul(size_of::<f64>());

        match budget.checked_div(row_bytes) {
            // rows without values take no room at all
            None => Ok(rows.max(1)),
            Some(0) if rows > 0 => Err(CollectiveErr::RowTooLarge {
                bytes: row_bytes,
                limit: self.frame_limit,
            }),
            Some(per_frame) => Ok(per_frame.max(1)),
        }
    }

    fn peer_mut(&mut self, rank: usize) -> Result<&mut Peer<R, W>> {
        let size = self.peers.len() + 1;
        match rank.checked_sub(1).and_then(|i| self.peers.get_mut(i)) {
            Some(peer) => Ok(peer),
            None => Err(CollectiveErr::InvalidRank { rank, size }),
        }
    }
}

/// Maps a message that wasn't the expected one into the matching error.
pub(crate) fn unexpected(op: &'static str, rank: usize, msg: Msg<'_>) -> CollectiveErr {
    match msg {
        Msg::Err(detail) => CollectiveErr::Remote {
            rank,
            detail: detail.into_owned(),
        },
        other => CollectiveErr::UnexpectedMessage {
            op,
            rank,
            got: other.kind(),
        },
    }
}

impl<R, W> Communicator for Coordinator<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn rank(&self) -> usize {
        COORDINATOR
    }

    fn size(&self) -> usize {
        self.peers.len() + 1
    }

    async fn broadcast<T>(&mut self, value: Option<T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let value = value.ok_or(CollectiveErr::MissingRootValue)?;
        let msg = Msg::Control(Command::Broadcast(serde_json::to_value(&value)?));
        let limit = self.timeout;

        guarded("broadcast", limit, async {
            for peer in &mut self.peers {
                peer.tx.send(&msg).await?;
            }

            Ok::<_, CollectiveErr>(())
        })
        .await?;

        Ok(value)
    }

    async fn send_chunk(
        &mut self,
        dest: usize,
        rows: usize,
        cols: usize,
        data: &[f64],
    ) -> Result<()> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(CollectiveErr::SizeMismatch {
                op: "send_chunk",
                got: data.len(),
                expected: rows.saturating_mul(cols),
            });
        }

        let limit = self.timeout;
        let per_frame = self.rows_per_frame(rows, cols)?;
        let peer = self.peer_mut(dest)?;

        guarded("send_chunk", limit, async {
            let mut first = 0;
            let mut frames = 0;

            // an empty chunk still goes out as a single empty batch
            loop {
                let batch = per_frame.min(rows - first);
                let msg = Msg::Data(Payload::Chunk {
                    rows,
                    cols,
                    first,
                    batch,
                    data: &data[first * cols..(first + batch) * cols],
                });

                peer.tx.send(&msg).await?;
                first += batch;
                frames += 1;

                if first == rows {
                    break;
                }
            }

            debug!(rank = dest, rows = rows, frames = frames; "sent chunk");
            Ok::<_, CollectiveErr>(())
        })
        .await
    }

    async fn recv_chunk(&mut self) -> Result<Chunk> {
        Err(CollectiveErr::RoleMismatch {
            op: "recv_chunk",
            rank: COORDINATOR,
        })
    }

    async fn gather_varying(
        &mut self,
        local: &[f64],
        counts: &[usize],
        offsets: &[usize],
    ) -> Result<Option<Vec<f64>>> {
        let size = self.size();
        let total = check_tables(size, COORDINATOR, local, counts, offsets)?;

        let mut global = vec![0.0; total];
        global[offsets[0]..offsets[0] + counts[0]].copy_from_slice(local);

        let limit = self.timeout;
        guarded("gather_varying", limit, async {
            for peer in &mut self.peers {
                let rank = peer.rank;
                let values = match peer.rx.recv().await? {
                    Msg::Data(Payload::Results(values)) => values,
                    msg => return Err(unexpected("gather_varying", rank, msg)),
                };

                if values.len() != counts[rank] {
                    return Err(CollectiveErr::SizeMismatch {
                        op: "gather_varying",
                        got: values.len(),
                        expected: counts[rank],
                    });
                }

                let start = offsets[rank];
                global[start..start + values.len()].copy_from_slice(values);
                debug!(rank = rank, count = values.len(); "gathered results");
            }

            Ok::<_, CollectiveErr>(())
        })
        .await?;

        Ok(Some(global))
    }

    async fn barrier(&mut self) -> Result<()> {
        let limit = self.timeout;

        guarded("barrier", limit, async {
            for peer in &mut self.peers {
                match peer.rx.recv().await? {
                    Msg::Control(Command::BarrierEnter) => {}
                    msg => return Err(unexpected("barrier", peer.rank, msg)),
                }
            }

            let msg = Msg::Control(Command::BarrierRelease);
            for peer in &mut self.peers {
                peer.tx.send(&msg).await?;
            }

            Ok::<_, CollectiveErr>(())
        })
        .await
    }

    async fn abort(&mut self, detail: &str) -> Result<()> {
        let limit = self.timeout;
        let msg = Msg::Err(detail.into());

        guarded("abort", limit, async {
            for peer in &mut self.peers {
                if let Err(e) = peer.tx.send(&msg).await {
                    warn!("failed to notify rank {} of the abort: {e}", peer.rank);
                }
            }

            Ok::<_, CollectiveErr>(())
        })
        .await
    }
}

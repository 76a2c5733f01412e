use std::{num::NonZeroUsize, time::Duration};

use comms::msg::{Command, Msg};
use log::{info, warn};
use tokio::net::{
    TcpListener, TcpStream, ToSocketAddrs,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

use crate::{CollectiveErr, Coordinator, Member, Result, guarded};

const RETRY_DELAY: Duration = Duration::from_millis(500);

pub type TcpCoordinator = Coordinator<OwnedReadHalf, OwnedWriteHalf>;
pub type TcpMember = Member<OwnedReadHalf, OwnedWriteHalf>;

impl TcpCoordinator {
    /// Binds `addr` and waits until every member of the run has joined.
    ///
    /// # Arguments
    /// * `addr` - The address to listen at.
    /// * `size` - The total amount of processes, the coordinator included.
    /// * `timeout` - The limit for joining and for every later collective.
    ///
    /// # Returns
    /// A coordinator with one channel per member, or an error if binding failed or
    /// some member announced an invalid rank.
    pub async fn listen<A: ToSocketAddrs>(
        addr: A,
        size: NonZeroUsize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening at {}", listener.local_addr()?);
        Self::accept(listener, size, timeout).await
    }

    /// Waits on an already bound `listener` until `size - 1` members have joined.
    pub async fn accept(
        listener: TcpListener,
        size: NonZeroUsize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let size = size.get();
        let mut slots: Vec<Option<_>> = (1..size).map(|_| None).collect();
        let mut joined = 0;

        guarded("join", timeout, async {
            while joined < slots.len() {
                let (stream, peer_addr) = listener.accept().await?;
                let (rx, tx) = stream.into_split();
                let (mut rx, tx) = comms::channel(rx, tx);

                let (rank, their_size) = match rx.recv().await? {
                    Msg::Control(Command::Join { rank, size }) => (rank, size),
                    msg => {
                        return Err(CollectiveErr::Topology(format!(
                            "{peer_addr} sent {} instead of joining",
                            msg.kind()
                        )));
                    }
                };

                if their_size != size {
                    return Err(CollectiveErr::SizeMismatch {
                        op: "join",
                        got: their_size,
                        expected: size,
                    });
                }

                let slot = rank
                    .checked_sub(1)
                    .and_then(|i| slots.get_mut(i))
                    .ok_or(CollectiveErr::InvalidRank { rank, size })?;

                if slot.replace((rx, tx)).is_some() {
                    return Err(CollectiveErr::DuplicateRank { rank });
                }

                joined += 1;
                info!("rank {rank} joined from {peer_addr} ({}/{})", joined + 1, size);
            }

            Ok::<_, CollectiveErr>(())
        })
        .await?;

        let channels = slots.into_iter().flatten().collect();
        Ok(Coordinator::new(channels, timeout))
    }
}

impl TcpMember {
    /// Connects to the coordinator at `addr` and announces this process' rank.
    ///
    /// Connection attempts are retried until they succeed or `timeout` elapses.
    ///
    /// # Arguments
    /// * `addr` - The coordinator's address.
    /// * `rank` - This process' rank, in `1..size`.
    /// * `size` - The total amount of processes, the coordinator included.
    /// * `timeout` - The limit for connecting and for every later collective.
    ///
    /// # Returns
    /// A connected member or an error if the rank is invalid or connecting failed.
    pub async fn connect(
        addr: &str,
        rank: usize,
        size: NonZeroUsize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let size = size.get();
        if rank == crate::COORDINATOR || rank >= size {
            return Err(CollectiveErr::InvalidRank { rank, size });
        }

        let stream = guarded("connect", timeout, async {
            loop {
                match TcpStream::connect(addr).await {
                    Ok(stream) => break Ok::<_, CollectiveErr>(stream),
                    Err(e) => {
                        warn!("failed to connect to coordinator at {addr}: {e}, retrying...");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        })
        .await?;

        let (rx, tx) = stream.into_split();
        let (rx, mut tx) = comms::channel(rx, tx);
        tx.send(&Msg::Control(Command::Join { rank, size })).await?;
        info!("joined coordinator at {addr} as rank {rank} of {size}");

        Member::new(rank, size, rx, tx, timeout)
    }
}

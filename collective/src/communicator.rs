use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// A block of rows received from the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

/// The operations the run needs from the multi-process environment.
///
/// Rank 0 is the coordinator, the rest are plain members. Every collective must be
/// entered by all the ranks, a rank that never shows up stalls the others unless a
/// timeout was configured.
#[allow(unused)]
#[trait_variant::make(Communicator: Send)]
pub trait CommunicatorTemplate {
    /// This process' rank, in `0..size`.
    fn rank(&self) -> usize;

    /// The total amount of processes taking part in the run.
    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == crate::COORDINATOR
    }

    /// Sends the coordinator's value to every rank.
    ///
    /// The value travels as JSON, so `T` must survive a `serde_json` round trip. Non
    /// finite `f64`s inside it are turned into `null` and the members then fail to
    /// deserialize it.
    ///
    /// # Arguments
    /// * `value` - The value to share, only read on the coordinator.
    ///
    /// # Returns
    /// The coordinator's value, on every rank.
    async fn broadcast<T>(&mut self, value: Option<T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send;

    /// Sends a block of `rows` x `cols` values to the member `dest`.
    ///
    /// Blocks too big for a single frame are split into batches of rows, the member
    /// puts them back together. Only available on the coordinator.
    async fn send_chunk(&mut self, dest: usize, rows: usize, cols: usize, data: &[f64])
    -> Result<()>;

    /// Waits for the block of rows the coordinator sent to this rank.
    ///
    /// Only available on members.
    async fn recv_chunk(&mut self) -> Result<Chunk>;

    /// Collects every rank's `local` vector into a single vector on the coordinator.
    ///
    /// Rank `r` contributes exactly `counts[r]` values which land at `offsets[r]`. The
    /// non empty ranges must cover the output exactly once, no gaps and no overlaps.
    ///
    /// # Returns
    /// The assembled vector on the coordinator, `None` everywhere else.
    async fn gather_varying(
        &mut self,
        local: &[f64],
        counts: &[usize],
        offsets: &[usize],
    ) -> Result<Option<Vec<f64>>>;

    /// Returns once every rank has entered the barrier.
    async fn barrier(&mut self) -> Result<()>;

    /// Tells the other side of every channel that this rank is giving up on the run.
    async fn abort(&mut self, detail: &str) -> Result<()>;
}

//! Process topology for a fixed set of ranks arranged as a star around rank 0.
//!
//! Every collective (broadcast, variable length gather, barrier) has to be entered by
//! all the ranks for any of them to complete.

mod communicator;
mod coordinator;
mod error;
pub mod local;
mod member;
mod solo;
mod tcp;
mod topology;

use std::{future::Future, time::Duration};

pub use communicator::{Chunk, Communicator, CommunicatorTemplate};
pub use coordinator::Coordinator;
pub use error::{CollectiveErr, Result};
pub use member::Member;
pub use solo::Solo;
pub use tcp::{TcpCoordinator, TcpMember};
pub use topology::TopologySpec;

/// The rank that partitions the input and gathers the output.
pub const COORDINATOR: usize = 0;

/// Awaits `fut`, failing with `CollectiveErr::Timeout` if `limit` elapses first.
///
/// Without a limit the future is awaited for as long as it takes.
pub(crate) async fn guarded<T, F>(op: &'static str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| CollectiveErr::Timeout { op, after })?,
    }
}

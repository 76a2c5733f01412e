//! An in-process star built on top of `tokio::io::duplex` streams.

use std::{num::NonZeroUsize, time::Duration};

use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};

use crate::{Coordinator, Member};

const DUPLEX_CAPACITY: usize = 1 << 16;

pub type LocalCoordinator = Coordinator<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;
pub type LocalMember = Member<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Builds a fully connected star of `size` ranks living in the same process.
///
/// # Arguments
/// * `size` - The total amount of ranks, the coordinator included.
/// * `timeout` - The limit for every collective, `None` waits forever.
///
/// # Returns
/// The coordinator and the members ordered by rank, starting at rank 1.
pub fn star(size: NonZeroUsize, timeout: Option<Duration>) -> (LocalCoordinator, Vec<LocalMember>) {
    let size = size.get();
    let mut channels = Vec::with_capacity(size - 1);
    let mut members = Vec::with_capacity(size - 1);

    for rank in 1..size {
        let (near, far) = io::duplex(DUPLEX_CAPACITY);
        let (rx, tx) = io::split(near);
        channels.push(comms::channel(rx, tx));

        let (rx, tx) = io::split(far);
        let (rx, tx) = comms::channel(rx, tx);

        // SAFETY: `rank` is in `1..size`.
        members.push(Member::new(rank, size, rx, tx, timeout).unwrap());
    }

    (Coordinator::new(channels, timeout), members)
}

use std::{env, num::NonZeroUsize};

use crate::{COORDINATOR, CollectiveErr, Result};

pub const WORLD_SIZE_VAR: &str = "WORLD_SIZE";
pub const RANK_VAR: &str = "RANK";
pub const COORDINATOR_ADDR_VAR: &str = "COORDINATOR_ADDR";

/// Where this process sits in the run, as supplied by whatever launched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologySpec {
    pub rank: usize,
    pub size: NonZeroUsize,
    pub addr: String,
}

impl TopologySpec {
    /// Reads the topology from the process environment.
    ///
    /// # Returns
    /// `None` when none of the variables are set, meaning there is no multi-process
    /// environment. An error if only some of them are set or they are invalid.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but reading the variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = (
            lookup(WORLD_SIZE_VAR),
            lookup(RANK_VAR),
            lookup(COORDINATOR_ADDR_VAR),
        );

        let (size, rank, addr) = match vars {
            (None, None, None) => return Ok(None),
            (Some(size), Some(rank), Some(addr)) => (size, rank, addr),
            _ => {
                return Err(CollectiveErr::Topology(format!(
                    "{WORLD_SIZE_VAR}, {RANK_VAR} and {COORDINATOR_ADDR_VAR} must be set together"
                )));
            }
        };

        let size: NonZeroUsize = size.trim().parse().map_err(|e| {
            CollectiveErr::Topology(format!("invalid {WORLD_SIZE_VAR} {size:?}: {e}"))
        })?;

        let rank: usize = rank
            .trim()
            .parse()
            .map_err(|e| CollectiveErr::Topology(format!("invalid {RANK_VAR} {rank:?}: {e}")))?;

        if rank >= size.get() {
            return Err(CollectiveErr::InvalidRank {
                rank,
                size: size.get(),
            });
        }

        Ok(Some(Self { rank, size, addr }))
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }
}

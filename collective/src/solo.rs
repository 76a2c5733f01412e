use log::debug;
use serde::{Serialize, de::DeserializeOwned};

use crate::{COORDINATOR, Chunk, CollectiveErr, Communicator, Result, member::check_tables};

/// The single process topology, rank 0 of 1.
///
/// Used when no multi-process environment is available, every collective completes
/// locally and there is nobody to send chunks to.
#[derive(Debug, Default, Clone, Copy)]
pub struct Solo;

impl Communicator for Solo {
    fn rank(&self) -> usize {
        COORDINATOR
    }

    fn size(&self) -> usize {
        1
    }

    async fn broadcast<T>(&mut self, value: Option<T>) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        value.ok_or(CollectiveErr::MissingRootValue)
    }

    async fn send_chunk(
        &mut self,
        dest: usize,
        _rows: usize,
        _cols: usize,
        _data: &[f64],
    ) -> Result<()> {
        Err(CollectiveErr::InvalidRank { rank: dest, size: 1 })
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
        check_tables(1, COORDINATOR, local, counts, offsets)?;
        Ok(Some(local.to_vec()))
    }

    async fn barrier(&mut self) -> Result<()> {
        Ok(())
    }

    async fn abort(&mut self, detail: &str) -> Result<()> {
        debug!("single process run aborted: {detail}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collectives_complete_locally() {
        let mut solo = Solo;

        let value = solo.broadcast(Some(vec![1, 2, 3])).await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        let global = solo.gather_varying(&[4.0, 5.0], &[2], &[0]).await.unwrap();
        assert_eq!(global, Some(vec![4.0, 5.0]));

        solo.barrier().await.unwrap();
    }

    #[tokio::test]
    async fn gather_needs_the_output_to_start_at_zero() {
        let err = Solo
            .gather_varying(&[4.0, 5.0], &[2], &[1])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CollectiveErr::OffsetMismatch {
                rank: 0,
                got: 1,
                expected: 0
            }
        ));
    }

    #[tokio::test]
    async fn broadcast_needs_a_value() {
        let err = Solo.broadcast::<u32>(None).await.unwrap_err();
        assert!(matches!(err, CollectiveErr::MissingRootValue));
    }

    #[tokio::test]
    async fn there_is_nobody_to_send_to() {
        let err = Solo.send_chunk(1, 0, 0, &[]).await.unwrap_err();
        assert!(matches!(err, CollectiveErr::InvalidRank { rank: 1, size: 1 }));
    }
}

//! Moving the sample matrix out to the ranks and the scores back in.

use std::borrow::Cow;

use collective::Communicator;
use log::debug;
use ndarray::{Array2, s};

use crate::{Layout, Result, SensitivityErr};

/// Sends every member its block of `samples` and returns the coordinator's own block.
///
/// Empty blocks are sent too, every member waits for exactly one. Blocks bigger than a
/// frame are split into batches of rows by `comm`.
///
/// # Arguments
/// * `comm` - The coordinator's communicator.
/// * `samples` - The full sample matrix.
/// * `layout` - The split of the rows, one entry per rank.
pub async fn distribute<C>(
    comm: &mut C,
    samples: Array2<f64>,
    layout: &Layout,
) -> Result<Array2<f64>>
where
    C: Communicator,
{
    if samples.nrows() != layout.rows() || layout.workers() != comm.size() {
        return Err(SensitivityErr::InvalidInput(format!(
            "cannot split {} rows among {} ranks with a layout of {} rows and {} workers",
            samples.nrows(),
            comm.size(),
            layout.rows(),
            layout.workers()
        )));
    }

    let samples = samples.as_standard_layout().into_owned();
    let cols = samples.ncols();

    for rank in 1..layout.workers() {
        let block = samples.slice(s![layout.range(rank), ..]);
        let data = match block.as_slice() {
            Some(data) => Cow::Borrowed(data),
            None => Cow::Owned(block.iter().copied().collect()),
        };

        comm.send_chunk(rank, block.nrows(), cols, &data).await?;
        debug!(rank = rank, rows = block.nrows(); "sent chunk");
    }

    Ok(samples.slice(s![layout.range(0), ..]).to_owned())
}

/// Receives this member's block from the coordinator.
///
/// # Arguments
/// * `comm` - The member's communicator.
/// * `layout` - The split of the rows, as broadcast by the coordinator.
/// * `cols` - The amount of variables in the problem.
///
/// # Returns
/// The block, or an error if its shape doesn't match this rank's entry in `layout`.
pub async fn receive<C>(comm: &mut C, layout: &Layout, cols: usize) -> Result<Array2<f64>>
where
    C: Communicator,
{
    let rank = comm.rank();
    let chunk = comm.recv_chunk().await?;
    let got = (chunk.rows, chunk.cols);
    let expected = (layout.count(rank), cols);

    if got != expected {
        return Err(SensitivityErr::ChunkShape {
            rank,
            got,
            expected,
        });
    }

    Array2::from_shape_vec(expected, chunk.data).map_err(|_| SensitivityErr::ChunkShape {
        rank,
        got,
        expected,
    })
}

/// Gathers every rank's scores on the coordinator, in global row order.
///
/// # Returns
/// The full score vector on the coordinator, `None` on members.
pub async fn collect<C>(comm: &mut C, local: &[f64], layout: &Layout) -> Result<Option<Vec<f64>>>
where
    C: Communicator,
{
    let gathered = comm
        .gather_varying(local, layout.counts(), layout.offsets())
        .await?;

    Ok(gathered)
}

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{Result, SensitivityErr};

/// How the rows of a sample matrix are split among the ranks.
///
/// Rank `r` owns the rows `offsets[r]..offsets[r] + counts[r]`. The ranges are
/// contiguous, disjoint, in rank order and cover every row, with counts differing by
/// at most one and the larger counts going to the lower ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLayout", into = "RawLayout")]
pub struct Layout {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct RawLayout {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

/// Returns the range of `total` rows that belongs to `rank` out of `workers`.
///
/// The caller guarantees `rank < workers`.
fn chunk_range(total: usize, rank: usize, workers: usize) -> Range<usize> {
    let base = total / workers;
    let rem = total % workers;

    let start = rank * base + rank.min(rem);
    let extra = usize::from(rank < rem);

    start..start + base + extra
}

impl Layout {
    /// Splits `rows` among `workers` ranks.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows in the sample matrix.
    /// * `workers` - The amount of ranks taking part in the run.
    ///
    /// # Returns
    /// The layout, or an error if there are no workers to split the rows among.
    pub fn new(rows: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(SensitivityErr::InvalidInput(
                "cannot split the samples among zero workers".into(),
            ));
        }

        let (counts, offsets) = (0..workers)
            .map(|rank| {
                let range = chunk_range(rows, rank, workers);
                (range.len(), range.start)
            })
            .unzip();

        Ok(Self { counts, offsets })
    }

    /// The amount of ranks the rows are split among.
    pub fn workers(&self) -> usize {
        self.counts.len()
    }

    /// The total amount of rows.
    pub fn rows(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The amount of rows owned by `rank`, zero for ranks outside the layout.
    pub fn count(&self, rank: usize) -> usize {
        self.counts.get(rank).copied().unwrap_or_default()
    }

    /// The rows owned by `rank`, empty for ranks outside the layout.
    pub fn range(&self, rank: usize) -> Range<usize> {
        match (self.offsets.get(rank), self.counts.get(rank)) {
            (Some(&offset), Some(&count)) => offset..offset + count,
            _ => 0..0,
        }
    }

    /// Every rank's rows, in rank order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.workers()).map(|rank| self.range(rank))
    }
}

impl TryFrom<RawLayout> for Layout {
    type Error = SensitivityErr;

    fn try_from(raw: RawLayout) -> Result<Self> {
        let RawLayout { counts, offsets } = raw;

        if counts.is_empty() || counts.len() != offsets.len() {
            return Err(SensitivityErr::InvalidInput(format!(
                "a layout needs one count and one offset per worker, got {} counts and {} offsets",
                counts.len(),
                offsets.len()
            )));
        }

        let mut next = 0;
        for (rank, (&count, &offset)) in counts.iter().zip(&offsets).enumerate() {
            if offset != next {
                return Err(SensitivityErr::InvalidInput(format!(
                    "rank {rank} starts at row {offset}, expected {next}"
                )));
            }
            next += count;
        }

        Ok(Self { counts, offsets })
    }
}

impl From<Layout> for RawLayout {
    fn from(layout: Layout) -> Self {
        let Layout { counts, offsets } = layout;
        Self { counts, offsets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_rows_among_five_workers() {
        let layout = Layout::new(12, 5).unwrap();

        assert_eq!(layout.counts(), [3, 3, 2, 2, 2]);
        assert_eq!(layout.offsets(), [0, 3, 6, 8, 10]);
        assert_eq!(layout.range(1), 3..6);
        assert_eq!(layout.rows(), 12);
    }

    #[test]
    fn no_rows_means_every_chunk_is_empty() {
        let layout = Layout::new(0, 4).unwrap();

        assert_eq!(layout.counts(), [0, 0, 0, 0]);
        assert_eq!(layout.offsets(), [0, 0, 0, 0]);
    }

    #[test]
    fn a_single_worker_owns_everything() {
        let layout = Layout::new(7, 1).unwrap();

        assert_eq!(layout.counts(), [7]);
        assert_eq!(layout.offsets(), [0]);
    }

    #[test]
    fn more_workers_than_rows() {
        let layout = Layout::new(2, 4).unwrap();

        assert_eq!(layout.counts(), [1, 1, 0, 0]);
        assert_eq!(layout.offsets(), [0, 1, 2, 2]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            Layout::new(10, 0),
            Err(SensitivityErr::InvalidInput(_))
        ));
    }

    #[test]
    fn ranges_tile_the_rows_and_stay_balanced() {
        for rows in 0..64 {
            for workers in 1..12 {
                let layout = Layout::new(rows, workers).unwrap();
                let counts = layout.counts();

                assert_eq!(layout.workers(), workers);
                assert_eq!(layout.rows(), rows);

                let max = *counts.iter().max().unwrap();
                let min = *counts.iter().min().unwrap();
                assert!(max - min <= 1, "rows {rows} workers {workers}: {counts:?}");
                assert!(counts.windows(2).all(|w| w[0] >= w[1]));

                let mut next = 0;
                for range in layout.ranges() {
                    assert_eq!(range.start, next);
                    next = range.end;
                }
                assert_eq!(next, rows);
            }
        }
    }

    #[test]
    fn out_of_range_rank_owns_nothing() {
        let layout = Layout::new(5, 2).unwrap();

        assert_eq!(layout.count(2), 0);
        assert_eq!(layout.range(2), 0..0);
    }

    #[test]
    fn layout_survives_json() {
        let layout = Layout::new(12, 5).unwrap();

        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["counts"], serde_json::json!([3, 3, 2, 2, 2]));

        let back: Layout = serde_json::from_value(json).unwrap();
        assert_eq!(back, layout);
    }

    #[test]
    fn inconsistent_offsets_are_rejected() {
        let json = serde_json::json!({ "counts": [2, 2], "offsets": [0, 3] });
        assert!(serde_json::from_value::<Layout>(json).is_err());

        let json = serde_json::json!({ "counts": [2, 2], "offsets": [0] });
        assert!(serde_json::from_value::<Layout>(json).is_err());

        let json = serde_json::json!({ "counts": [], "offsets": [] });
        assert!(serde_json::from_value::<Layout>(json).is_err());
    }
}

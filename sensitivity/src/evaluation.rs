use std::time::{Duration, Instant};

use log::debug;
use ndarray::ArrayView2;

use crate::{BoundSide, Evaluator, Result, SensitivityErr};

/// What a rank's evaluation loop went through.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EvalStats {
    pub rows: usize,
    /// How many rows scored a non-finite value.
    pub non_finite: usize,
    pub elapsed: Duration,
}

/// Scores every row of `chunk` with `evaluator`.
///
/// For each row, `names[j]`'s `side` is set to the row's `j`th value before scoring.
/// The overrides are left in place once the loop is done.
///
/// # Arguments
/// * `evaluator` - The model to score.
/// * `names` - The input each column overrides.
/// * `side` - Which side of each input's range gets overridden.
/// * `chunk` - The rows to score.
///
/// # Returns
/// One score per row, in row order, or an error if the chunk has the wrong amount of
/// columns or names an input the evaluator doesn't have. Nothing is evaluated in
/// either case.
pub fn evaluate_chunk<E>(
    evaluator: &mut E,
    names: &[String],
    side: BoundSide,
    chunk: ArrayView2<'_, f64>,
) -> Result<(Vec<f64>, EvalStats)>
where
    E: Evaluator + ?Sized,
{
    if chunk.ncols() != names.len() {
        return Err(SensitivityErr::InvalidInput(format!(
            "the chunk has {} columns but there are {} variables",
            chunk.ncols(),
            names.len()
        )));
    }

    if let Some(unknown) = names.iter().find(|name| evaluator.bound_mut(name).is_none()) {
        return Err(SensitivityErr::UnknownInput(unknown.clone()));
    }

    let start = Instant::now();
    let mut results = Vec::with_capacity(chunk.nrows());
    let mut non_finite = 0;

    for row in chunk.rows() {
        for (name, &value) in names.iter().zip(row) {
            evaluator
                .bound_mut(name)
                .ok_or_else(|| SensitivityErr::UnknownInput(name.clone()))?
                .set(side, value);
        }

        let score = evaluator.evaluate();
        if !score.is_finite() {
            non_finite += 1;
        }
        results.push(score);
    }

    let stats = EvalStats {
        rows: results.len(),
        non_finite,
        elapsed: start.elapsed(),
    };

    debug!(rows = stats.rows, non_finite = stats.non_finite; "evaluated chunk");
    Ok((results, stats))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ndarray::{Array2, array};

    use super::*;
    use crate::Bound;

    /// Scores the sum of every lower bound, NaN if any is below `floor`.
    struct SumOfLowers {
        bounds: HashMap<String, Bound>,
        floor: f64,
        calls: usize,
    }

    impl SumOfLowers {
        fn new(names: &[&str], floor: f64) -> Self {
            let bounds = names
                .iter()
                .map(|name| (name.to_string(), Bound::new(0.0, 1000.0)))
                .collect();

            Self {
                bounds,
                floor,
                calls: 0,
            }
        }
    }

    impl Evaluator for SumOfLowers {
        fn bound_mut(&mut self, name: &str) -> Option<&mut Bound> {
            self.bounds.get_mut(name)
        }

        fn evaluate(&mut self) -> f64 {
            self.calls += 1;
            if self.bounds.values().any(|b| b.lower() < self.floor) {
                return f64::NAN;
            }
            self.bounds.values().map(Bound::lower).sum()
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_score_per_row_in_order() {
        let mut evaluator = SumOfLowers::new(&["a", "b"], f64::NEG_INFINITY);
        let chunk = array![[1.0, 2.0], [3.0, 4.0], [-5.0, 0.5]];

        let (results, stats) =
            evaluate_chunk(&mut evaluator, &names(&["a", "b"]), BoundSide::Lower, chunk.view())
                .unwrap();

        assert_eq!(results, [3.0, 7.0, -4.5]);
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.non_finite, 0);
        assert_eq!(evaluator.bound_mut("a").unwrap().lower(), -5.0);
    }

    #[test]
    fn non_finite_scores_pass_through() {
        let mut evaluator = SumOfLowers::new(&["a"], -1.0);
        let chunk = array![[0.0], [-2.0], [1.0]];

        let (results, stats) =
            evaluate_chunk(&mut evaluator, &names(&["a"]), BoundSide::Lower, chunk.view()).unwrap();

        assert_eq!(results[0], 0.0);
        assert!(results[1].is_nan());
        assert_eq!(results[2], 1.0);
        assert_eq!(stats.non_finite, 1);
    }

    #[test]
    fn rows_dont_depend_on_previous_rows() {
        let chunk = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let reversed = array![[5.0, 6.0], [3.0, 4.0], [1.0, 2.0]];
        let names = names(&["a", "b"]);

        let mut evaluator = SumOfLowers::new(&["a", "b"], f64::NEG_INFINITY);
        let (forward, _) =
            evaluate_chunk(&mut evaluator, &names, BoundSide::Lower, chunk.view()).unwrap();

        let mut evaluator = SumOfLowers::new(&["a", "b"], f64::NEG_INFINITY);
        let (mut backward, _) =
            evaluate_chunk(&mut evaluator, &names, BoundSide::Lower, reversed.view()).unwrap();
        backward.reverse();

        assert_eq!(forward, backward);
    }

    #[test]
    fn upper_side_leaves_lower_alone() {
        let mut evaluator = SumOfLowers::new(&["a"], f64::NEG_INFINITY);
        let chunk = array![[7.0]];

        let (results, _) =
            evaluate_chunk(&mut evaluator, &names(&["a"]), BoundSide::Upper, chunk.view()).unwrap();

        assert_eq!(results, [0.0]);
        assert_eq!(evaluator.bound_mut("a").unwrap().upper(), 7.0);
    }

    #[test]
    fn unknown_input_fails_before_evaluating() {
        let mut evaluator = SumOfLowers::new(&["a"], f64::NEG_INFINITY);
        let chunk = array![[1.0, 2.0]];

        let result =
            evaluate_chunk(&mut evaluator, &names(&["a", "zz"]), BoundSide::Lower, chunk.view());

        assert!(matches!(result, Err(SensitivityErr::UnknownInput(name)) if name == "zz"));
        assert_eq!(evaluator.calls, 0);
    }

    #[test]
    fn empty_chunk_evaluates_nothing() {
        let mut evaluator = SumOfLowers::new(&["a"], f64::NEG_INFINITY);
        let chunk = Array2::<f64>::zeros((0, 1));

        let (results, stats) =
            evaluate_chunk(&mut evaluator, &names(&["a"]), BoundSide::Lower, chunk.view()).unwrap();

        assert!(results.is_empty());
        assert_eq!(stats.rows, 0);
        assert_eq!(evaluator.calls, 0);
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        let mut evaluator = SumOfLowers::new(&["a"], f64::NEG_INFINITY);
        let chunk = array![[1.0, 2.0]];

        let result =
            evaluate_chunk(&mut evaluator, &names(&["a"]), BoundSide::Lower, chunk.view());
        assert!(matches!(result, Err(SensitivityErr::InvalidInput(_))));
    }
}

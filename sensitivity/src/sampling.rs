use ndarray::{Array2, ArrayViewMut1};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{ProblemDescriptor, sobol::Sobol};

/// Produces the sample matrix a sensitivity analysis evaluates.
pub trait Sampler {
    /// Generates the samples for `problem`.
    ///
    /// # Arguments
    /// * `problem` - The variables to sample and their ranges.
    /// * `base` - The amount of base samples.
    /// * `second_order` - Whether the matrix must allow second order indices.
    ///
    /// # Returns
    /// A matrix with one row per sample and one column per variable, each value inside
    /// its variable's range.
    fn sample(
        &mut self,
        problem: &ProblemDescriptor,
        base: usize,
        second_order: bool,
    ) -> Array2<f64>;
}

/// Where the base points of a Saltelli matrix come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Design {
    /// A Sobol sequence, the same on every run.
    #[default]
    Sobol,
    /// Uniform draws from a seedable generator.
    Random,
}

/// The amount of rows a Saltelli scheme produces out of `base` samples of `vars` variables.
pub fn saltelli_rows(base: usize, vars: usize, second_order: bool) -> usize {
    let per_base = if second_order { 2 * vars + 2 } else { vars + 2 };
    base * per_base
}

enum Source<R> {
    Sobol,
    Random(R),
}

/// The base points of a single `sample` call.
enum Points<'a, R> {
    Sobol(Sobol),
    Random(&'a mut R),
}

impl<R: Rng> Points<'_, R> {
    fn fill(&mut self, point: &mut [f64]) {
        match self {
            Self::Sobol(sobol) => sobol.fill(point),
            Self::Random(rng) => point.iter_mut().for_each(|x| *x = rng.random()),
        }
    }
}

/// Saltelli's extension of the Sobol sampling scheme.
///
/// Each base sample takes a point of twice the problem's dimension and splits it into
/// `A` and `B`. It then emits, in this order, `A`, `AB_1..AB_D`, `BA_1..BA_D` (only for
/// second order) and `B`. `AB_j` is `A` with its `j`th coordinate taken from `B`, `BA_j`
/// is the opposite. The points are scaled from the unit hypercube into the problem's
/// ranges.
///
/// With the Sobol design the first `base.next_power_of_two()` points of the sequence
/// are skipped, the very first one is the origin.
pub struct SaltelliSampler<R: Rng> {
    source: Source<R>,
}

impl<R: Rng> SaltelliSampler<R> {
    /// Creates a new `SaltelliSampler` that draws uniform points from `rng`.
    pub fn new(rng: R) -> Self {
        Self {
            source: Source::Random(rng),
        }
    }
}

impl SaltelliSampler<StdRng> {
    /// Creates a new `SaltelliSampler` over a Sobol sequence.
    pub fn sobol() -> Self {
        Self {
            source: Source::Sobol,
        }
    }

    /// Creates a new `SaltelliSampler` of uniform points, seeded from the os if no
    /// `seed` is given.
    pub fn random(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self::new(rng)
    }

    /// Creates the sampler `design` asks for, `seed` only matters to random designs.
    pub fn from_design(design: Design, seed: Option<u64>) -> Self {
        match design {
            Design::Sobol => Self::sobol(),
            Design::Random => Self::random(seed),
        }
    }
}

impl<R: Rng> Sampler for SaltelliSampler<R> {
    fn sample(
        &mut self,
        problem: &ProblemDescriptor,
        base: usize,
        second_order: bool,
    ) -> Array2<f64> {
        let vars = problem.variable_count();
        let per_base = saltelli_rows(1, vars, second_order);
        let mut samples = Array2::zeros((saltelli_rows(base, vars, second_order), vars));

        let mut points = match &mut self.source {
            Source::Sobol => {
                let mut sobol = Sobol::new(2 * vars);
                sobol.seek(base.next_power_of_two() as u64);
                Points::Sobol(sobol)
            }
            Source::Random(rng) => Points::Random(rng),
        };

        let mut point = vec![0.0; 2 * vars];

        for i in 0..base {
            points.fill(&mut point);
            let (a, b) = point.split_at(vars);

            let mut row = i * per_base;
            let mut emit = |values: &[f64], swap: Option<(usize, f64)>| {
                let mut dst = samples.row_mut(row);
                dst.iter_mut().zip(values).for_each(|(d, &v)| *d = v);
                if let Some((j, v)) = swap {
                    dst[j] = v;
                }
                row += 1;
            };

            emit(a, None);
            for j in 0..vars {
                emit(a, Some((j, b[j])));
            }
            if second_order {
                for j in 0..vars {
                    emit(b, Some((j, a[j])));
                }
            }
            emit(b, None);
        }

        for mut sample in samples.rows_mut() {
            scale(&mut sample, problem.bounds());
        }

        samples
    }
}

/// Maps a point of the unit hypercube into `bounds`.
fn scale(sample: &mut ArrayViewMut1<'_, f64>, bounds: &[[f64; 2]]) {
    for (x, &[low, high]) in sample.iter_mut().zip(bounds) {
        *x = low + *x * (high - low);
    }
}

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Introspect, Result, SensitivityErr};

/// The input variables of a sensitivity analysis and the range each one is sampled from.
///
/// Serializes as `{ "num_vars", "names", "bounds" }`, where `bounds[i]` is the
/// `[low, high]` range of `names[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProblem", into = "RawProblem")]
pub struct ProblemDescriptor {
    names: Vec<String>,
    bounds: Vec<[f64; 2]>,
}

#[derive(Serialize, Deserialize)]
struct RawProblem {
    num_vars: usize,
    names: Vec<String>,
    bounds: Vec<[f64; 2]>,
}

impl ProblemDescriptor {
    /// Creates a new `ProblemDescriptor`.
    ///
    /// # Arguments
    /// * `names` - The input variables, unique.
    /// * `bounds` - A finite `[low, high]` range with `low <= high` for each variable.
    ///
    /// # Returns
    /// The descriptor, or an error if the arguments don't describe a valid problem.
    pub fn new(names: Vec<String>, bounds: Vec<[f64; 2]>) -> Result<Self> {
        if names.len() != bounds.len() {
            return Err(SensitivityErr::InvalidInput(format!(
                "{} variables but {} bounds",
                names.len(),
                bounds.len()
            )));
        }

        let mut seen = HashSet::with_capacity(names.len());
        if let Some(dup) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(SensitivityErr::InvalidInput(format!(
                "variable {dup:?} appears more than once"
            )));
        }

        for (name, &[low, high]) in names.iter().zip(&bounds) {
            if !low.is_finite() || !high.is_finite() || low > high {
                return Err(SensitivityErr::InvalidInput(format!(
                    "variable {name:?} has an invalid range [{low}, {high}]"
                )));
            }
        }

        Ok(Self { names, bounds })
    }

    /// Builds the problem out of a model's inputs.
    ///
    /// Every input whose identifier contains `prefix` and whose lower bound is negative
    /// becomes a variable sampled from `bound`, in the model's order.
    pub fn from_model<M>(model: &M, prefix: &str, bound: [f64; 2]) -> Result<Self>
    where
        M: Introspect + ?Sized,
    {
        let names: Vec<_> = model
            .inputs()
            .filter(|(id, b)| id.contains(prefix) && b.lower() < 0.0)
            .map(|(id, _)| id.to_string())
            .collect();

        let bounds = vec![bound; names.len()];
        Self::new(names, bounds)
    }

    pub fn variable_count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn bounds(&self) -> &[[f64; 2]] {
        &self.bounds
    }
}

impl TryFrom<RawProblem> for ProblemDescriptor {
    type Error = SensitivityErr;

    fn try_from(raw: RawProblem) -> Result<Self> {
        if raw.num_vars != raw.names.len() {
            return Err(SensitivityErr::InvalidInput(format!(
                "num_vars is {} but there are {} names",
                raw.num_vars,
                raw.names.len()
            )));
        }

        Self::new(raw.names, raw.bounds)
    }
}

impl From<ProblemDescriptor> for RawProblem {
    fn from(problem: ProblemDescriptor) -> Self {
        Self {
            num_vars: problem.names.len(),
            names: problem.names,
            bounds: problem.bounds,
        }
    }
}

use serde::{Deserialize, Serialize};

/// The `[lower, upper]` range a model input is allowed to take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    #[serde(rename = "lower_bound")]
    lower: f64,
    #[serde(rename = "upper_bound")]
    upper: f64,
}

impl Bound {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Overrides one side of the range, the other one is left untouched.
    pub fn set(&mut self, side: BoundSide, value: f64) {
        match side {
            BoundSide::Lower => self.lower = value,
            BoundSide::Upper => self.upper = value,
        }
    }
}

/// Which side of an input's range the sampled values override.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundSide {
    #[default]
    Lower,
    Upper,
}

/// Counts describing a loaded model, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModelSummary {
    pub genes: usize,
    pub reactions: usize,
    pub metabolites: usize,
}

/// A model that can be scored after overriding some of its inputs.
///
/// Overrides persist across evaluations, every row sets every variable so rows never
/// see each other's values.
pub trait Evaluator {
    /// The range of the input named `name`, if there's one.
    fn bound_mut(&mut self, name: &str) -> Option<&mut Bound>;

    /// Scores the model with its current inputs.
    ///
    /// # Returns
    /// The score, or a non-finite value if the model can't be solved.
    fn evaluate(&mut self) -> f64;
}

/// Read-only access to a model's inputs.
pub trait Introspect {
    fn summary(&self) -> ModelSummary;

    /// Every input identifier with its current range, in the model's order.
    fn inputs(&self) -> impl Iterator<Item = (&str, &Bound)>;
}

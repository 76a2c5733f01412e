use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Bound, Evaluator, Introspect, ModelSummary, Result, SensitivityErr};

/// A single reaction of a flux model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    #[serde(flatten)]
    pub bound: Bound,
    /// The weight of this reaction's flux in the objective.
    #[serde(default)]
    pub objective_coefficient: f64,
}

#[derive(Deserialize)]
struct RawModel {
    #[serde(default)]
    genes: Vec<String>,
    #[serde(default)]
    metabolites: Vec<String>,
    reactions: Vec<Reaction>,
}

/// A flux model loaded from JSON.
///
/// Evaluating it maximizes the objective `sum(c_i * v_i)` with every flux `v_i`
/// constrained to its reaction's bounds.
#[derive(Debug, Clone)]
pub struct FluxModel {
    genes: Vec<String>,
    metabolites: Vec<String>,
    reactions: Vec<Reaction>,
    index: HashMap<String, usize>,
}

impl FluxModel {
    /// Creates a new `FluxModel`.
    ///
    /// # Returns
    /// The model, or an error if two reactions share an identifier.
    pub fn new(
        genes: Vec<String>,
        metabolites: Vec<String>,
        reactions: Vec<Reaction>,
    ) -> Result<Self> {
        let mut index = HashMap::with_capacity(reactions.len());

        for (i, reaction) in reactions.iter().enumerate() {
            if index.insert(reaction.id.clone(), i).is_some() {
                return Err(SensitivityErr::InvalidInput(format!(
                    "reaction {:?} appears more than once",
                    reaction.id
                )));
            }
        }

        Ok(Self {
            genes,
            metabolites,
            reactions,
            index,
        })
    }

    /// Parses a model out of its JSON representation.
    pub fn from_json(s: &str) -> Result<Self> {
        let raw: RawModel =
            serde_json::from_str(s).map_err(|e| SensitivityErr::InvalidInput(e.to_string()))?;

        Self::new(raw.genes, raw.metabolites, raw.reactions)
    }

    /// Reads the model stored at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model_err = |detail: String| SensitivityErr::Model {
            path: path.to_path_buf(),
            detail,
        };

        let s = fs::read_to_string(path).map_err(|e| model_err(e.to_string()))?;
        Self::from_json(&s).map_err(|e| model_err(e.to_string()))
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }
}

impl Introspect for FluxModel {
    fn summary(&self) -> ModelSummary {
        ModelSummary {
            genes: self.genes.len(),
            reactions: self.reactions.len(),
            metabolites: self.metabolites.len(),
        }
    }

    fn inputs(&self) -> impl Iterator<Item = (&str, &Bound)> {
        self.reactions.iter().map(|r| (r.id.as_str(), &r.bound))
    }
}

impl Evaluator for FluxModel {
    fn bound_mut(&mut self, name: &str) -> Option<&mut Bound> {
        let &i = self.index.get(name)?;
        Some(&mut self.reactions[i].bound)
    }

    fn evaluate(&mut self) -> f64 {
        let mut objective = 0.0;

        for reaction in &self.reactions {
            let (lower, upper) = (reaction.bound.lower(), reaction.bound.upper());

            // infeasible
            if !(lower <= upper) {
                return f64::NAN;
            }

            let c = reaction.objective_coefficient;
            let flux = match c.partial_cmp(&0.0) {
                Some(std::cmp::Ordering::Greater) => upper,
                Some(std::cmp::Ordering::Less) => lower,
                _ => continue,
            };

            // unbounded
            if !flux.is_finite() {
                return f64::NAN;
            }

            objective += c * flux;
        }

        objective
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{Artifacts, BoundSide, Design, Result, SensitivityErr};

/// Everything a run needs besides the process topology.
///
/// Only `model_path` is required, the rest default to a second order analysis of
/// `2^15` base samples over every uptake reaction of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub model_path: PathBuf,
    /// The amount of base samples.
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_second_order")]
    pub second_order: bool,
    /// Where the base points come from, a Sobol sequence unless told otherwise.
    #[serde(default)]
    pub design: Design,
    /// Seed for the random design, drawn from the os if missing.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Only inputs whose identifier contains this are analyzed.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// The `[low, high]` range every variable is sampled from.
    #[serde(default = "default_bounds")]
    pub bounds: [f64; 2],
    #[serde(default, rename = "override")]
    pub side: BoundSide,
    #[serde(default = "default_problem_path")]
    pub problem_path: PathBuf,
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
    /// Upper limit for each collective, unlimited if missing.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_samples() -> usize {
    1 << 15
}

fn default_second_order() -> bool {
    true
}

fn default_prefix() -> String {
    "EX_".into()
}

fn default_bounds() -> [f64; 2] {
    [-10.0, 0.0]
}

fn default_problem_path() -> PathBuf {
    "Problem.json".into()
}

fn default_results_path() -> PathBuf {
    "Y.f64".into()
}

impl RunConfig {
    /// Parses a config out of its JSON representation.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| SensitivityErr::InvalidInput(e.to_string()))?;

        let [low, high] = config.bounds;
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(SensitivityErr::InvalidInput(format!(
                "invalid sampling range [{low}, {high}]"
            )));
        }

        if config.timeout_secs == Some(0) {
            return Err(SensitivityErr::InvalidInput(
                "timeout_secs must be positive".into(),
            ));
        }

        Ok(config)
    }

    /// Reads the config stored at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_err = |detail: String| SensitivityErr::Config {
            path: path.to_path_buf(),
            detail,
        };

        let s = fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        Self::from_json(&s).map_err(|e| config_err(e.to_string()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn artifacts(&self) -> Artifacts {
        Artifacts {
            problem: self.problem_path.clone(),
            results: self.results_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_model_is_required() {
        let config = RunConfig::from_json(r#"{ "model_path": "iML1515.json" }"#).unwrap();

        assert_eq!(config.model_path, PathBuf::from("iML1515.json"));
        assert_eq!(config.samples, 32768);
        assert!(config.second_order);
        assert_eq!(config.design, Design::Sobol);
        assert_eq!(config.seed, None);
        assert_eq!(config.prefix, "EX_");
        assert_eq!(config.bounds, [-10.0, 0.0]);
        assert_eq!(config.side, BoundSide::Lower);
        assert_eq!(config.timeout(), None);
        assert_eq!(
            config.artifacts(),
            Artifacts {
                problem: "Problem.json".into(),
                results: "Y.f64".into(),
            }
        );
    }

    #[test]
    fn overrides_are_honored() {
        let config = RunConfig::from_json(
            r#"{
                "model_path": "m.json",
                "samples": 16,
                "second_order": false,
                "design": "random",
                "seed": 3,
                "override": "upper",
                "timeout_secs": 30
            }"#,
        )
        .unwrap();

        assert_eq!(config.samples, 16);
        assert!(!config.second_order);
        assert_eq!(config.design, Design::Random);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.side, BoundSide::Upper);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_model_is_rejected() {
        assert!(RunConfig::from_json("{}").is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(RunConfig::from_json(r#"{ "model_path": "m", "sample": 3 }"#).is_err());
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(RunConfig::from_json(r#"{ "model_path": "m", "bounds": [0, -10] }"#).is_err());
    }
}

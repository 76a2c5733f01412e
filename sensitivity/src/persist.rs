use std::path::{Path, PathBuf};

use log::info;
use tokio::fs;

use crate::{ProblemDescriptor, Result, SensitivityErr};

/// Where a finished run's outputs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// The problem descriptor, as pretty printed json.
    pub problem: PathBuf,
    /// The scores, as little endian `f64`s in global row order.
    pub results: PathBuf,
}

const F64_SIZE: usize = size_of::<f64>();

fn persistence_err(path: &Path) -> impl FnOnce(std::io::Error) -> SensitivityErr + '_ {
    move |source| SensitivityErr::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes `problem` to `path`.
pub async fn write_problem(path: &Path, problem: &ProblemDescriptor) -> Result<()> {
    let json = serde_json::to_vec_pretty(problem)
        .map_err(|e| SensitivityErr::InvalidInput(e.to_string()))?;

    fs::write(path, json).await.map_err(persistence_err(path))?;
    info!("wrote problem descriptor to {}", path.display());
    Ok(())
}

/// Writes `results` to `path`.
pub async fn write_results(path: &Path, results: &[f64]) -> Result<()> {
    let bytes: Vec<u8> = results.iter().flat_map(|x| x.to_le_bytes()).collect();

    fs::write(path, bytes).await.map_err(persistence_err(path))?;
    info!(values = results.len(); "wrote results to {}", path.display());
    Ok(())
}

/// Reads back the scores written by `write_results`.
pub async fn read_results(path: &Path) -> Result<Vec<f64>> {
    let bytes = fs::read(path).await.map_err(persistence_err(path))?;

    if bytes.len() % F64_SIZE != 0 {
        return Err(SensitivityErr::InvalidInput(format!(
            "{} holds {} bytes, not a whole amount of f64s",
            path.display(),
            bytes.len()
        )));
    }

    let results = bytes
        .chunks_exact(F64_SIZE)
        .map(|chunk| {
            let mut raw = [0; F64_SIZE];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();

    Ok(results)
}

/// Reads back the problem written by `write_problem`.
pub async fn read_problem(path: &Path) -> Result<ProblemDescriptor> {
    let json = fs::read(path).await.map_err(persistence_err(path))?;
    serde_json::from_slice(&json).map_err(|e| SensitivityErr::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        env::temp_dir().join(format!("sensitivity-{}-{name}", process::id()))
    }

    #[tokio::test]
    async fn results_keep_their_order_and_sentinels() {
        let path = scratch("results.f64");
        let results = [1.5, f64::NAN, -0.0, f64::INFINITY, 42.0];

        write_results(&path, &results).await.unwrap();
        let back = read_results(&path).await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back.len(), results.len());
        for (got, expected) in back.iter().zip(results) {
            assert_eq!(got.to_bits(), expected.to_bits());
        }
    }

    #[tokio::test]
    async fn problem_is_pretty_json() {
        let path = scratch("problem.json");
        let problem = ProblemDescriptor::new(vec!["EX_a".into()], vec![[-10.0, 0.0]]).unwrap();

        write_problem(&path, &problem).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back = read_problem(&path).await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(text.contains("\"num_vars\": 1"));
        assert_eq!(back, problem);
    }

    #[tokio::test]
    async fn truncated_results_are_rejected() {
        let path = scratch("truncated.f64");
        std::fs::write(&path, [0u8; 12]).unwrap();

        let result = read_results(&path).await;
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(SensitivityErr::InvalidInput(_))));
    }

    #[tokio::test]
    async fn unwritable_path_names_the_file() {
        let path = scratch("missing-dir").join("results.f64");

        let result = write_results(&path, &[1.0]).await;
        assert!(matches!(result, Err(SensitivityErr::Persistence { path: p, .. }) if p == path));
    }
}

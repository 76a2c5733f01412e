use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use collective::CollectiveErr;

/// The sensitivity module's result type.
pub type Result<T> = std::result::Result<T, SensitivityErr>;

/// Every way a run can fail.
///
/// Evaluator outputs are never errors, a row the evaluator can't solve yields a
/// non-finite value instead.
#[derive(Debug)]
pub enum SensitivityErr {
    /// A precondition that must hold before anything is distributed.
    InvalidInput(String),
    /// The problem names a variable the evaluator doesn't know about.
    UnknownInput(String),
    ChunkShape {
        rank: usize,
        got: (usize, usize),
        expected: (usize, usize),
    },
    Collective(CollectiveErr),
    Model {
        path: PathBuf,
        detail: String,
    },
    Config {
        path: PathBuf,
        detail: String,
    },
    Persistence {
        path: PathBuf,
        source: io::Error,
    },
    /// The blocking evaluation task didn't finish.
    Evaluation(String),
}

impl Display for SensitivityErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::UnknownInput(name) => write!(f, "the evaluator has no input named {name:?}"),
            Self::ChunkShape {
                rank,
                got,
                expected,
            } => write!(
                f,
                "rank {rank} received a {}x{} chunk, expected {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
            Self::Collective(e) => write!(f, "collective error: {e}"),
            Self::Model { path, detail } => {
                write!(f, "failed to load model {}: {detail}", path.display())
            }
            Self::Config { path, detail } => {
                write!(f, "failed to load config {}: {detail}", path.display())
            }
            Self::Persistence { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            Self::Evaluation(msg) => write!(f, "evaluation task failed: {msg}"),
        }
    }
}

impl Error for SensitivityErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Collective(e) => Some(e),
            Self::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<CollectiveErr> for SensitivityErr {
    fn from(value: CollectiveErr) -> Self {
        Self::Collective(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<SensitivityErr> for io::Error {
    fn from(value: SensitivityErr) -> Self {
        match value {
            SensitivityErr::Collective(e) => e.into(),
            SensitivityErr::Persistence { source, .. } => source,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

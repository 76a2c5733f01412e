use std::{
    error::Error,
    fmt::{self, Display},
    io,
    time::Duration,
};

/// The collective module's result type.
pub type Result<T> = std::result::Result<T, CollectiveErr>;

/// Failures of the process topology, all of them are fatal to the run.
#[derive(Debug)]
pub enum CollectiveErr {
    Io(io::Error),
    Json(serde_json::Error),
    Timeout {
        op: &'static str,
        after: Duration,
    },
    UnexpectedMessage {
        op: &'static str,
        rank: usize,
        got: &'static str,
    },
    Remote {
        rank: usize,
        detail: String,
    },
    RoleMismatch {
        op: &'static str,
        rank: usize,
    },
    InvalidRank {
        rank: usize,
        size: usize,
    },
    DuplicateRank {
        rank: usize,
    },
    SizeMismatch {
        op: &'static str,
        got: usize,
        expected: usize,
    },
    /// Rank `rank`'s values would not start where the previous range ends.
    OffsetMismatch {
        rank: usize,
        got: usize,
        expected: usize,
    },
    RowTooLarge {
        bytes: usize,
        limit: usize,
    },
    MissingRootValue,
    Topology(String),
}

impl Display for CollectiveErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "malformed broadcast value: {e}"),
            Self::Timeout { op, after } => {
                write!(f, "{op} did not complete within {after:?}")
            }
            Self::UnexpectedMessage { op, rank, got } => {
                write!(f, "unexpected message during {op} from rank {rank}: got {got}")
            }
            Self::Remote { rank, detail } => write!(f, "rank {rank} aborted the run: {detail}"),
            Self::RoleMismatch { op, rank } => {
                write!(f, "{op} is not available on rank {rank}")
            }
            Self::InvalidRank { rank, size } => {
                write!(f, "rank {rank} is out of range for {size} process(es)")
            }
            Self::DuplicateRank { rank } => write!(f, "rank {rank} joined more than once"),
            Self::SizeMismatch { op, got, expected } => {
                write!(f, "size mismatch during {op}: got {got}, expected {expected}")
            }
            Self::OffsetMismatch { rank, got, expected } => {
                write!(f, "rank {rank} starts at offset {got} instead of {expected}")
            }
            Self::RowTooLarge { bytes, limit } => {
                write!(f, "a row of {bytes} bytes doesn't fit in a frame of {limit} bytes")
            }
            Self::MissingRootValue => {
                f.write_str("the coordinator must supply the broadcast value")
            }
            Self::Topology(msg) => write!(f, "invalid topology: {msg}"),
        }
    }
}

impl Error for CollectiveErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CollectiveErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CollectiveErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<CollectiveErr> for io::Error {
    fn from(value: CollectiveErr) -> Self {
        match value {
            CollectiveErr::Io(e) => e,
            CollectiveErr::Timeout { .. } => io::Error::new(io::ErrorKind::TimedOut, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

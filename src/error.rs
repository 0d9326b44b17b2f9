use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, ProofreaderError>;

/// Failures of a volume or of the dataset built on top of it.
#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    OutOfBounds { index: usize, len: usize },
    EmptyVolume(String),
    NoObjects,
    InvalidVolume(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::OutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for dataset of length {len}")
            }
            DataError::EmptyVolume(name) => write!(f, "volume {name} is empty"),
            DataError::NoObjects => write!(f, "no object is tall enough to be cut"),
            DataError::InvalidVolume(msg) => write!(f, "invalid volume: {msg}"),
        }
    }
}

impl Error for DataError {}

/// Every failure a training run can end with.
#[derive(Debug)]
pub enum ProofreaderError {
    ConfigNotFound(String),
    UnsupportedKind { what: &'static str, got: String },
    InvalidConfig(String),
    CheckpointMismatch { got: usize, expected: usize },
    CollectiveAborted,
    RankFailed { rank: usize, msg: String },
    Io(io::Error),
    Json(serde_json::Error),
    Data(DataError),
    Ml(MlErr),
}

impl fmt::Display for ProofreaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofreaderError::ConfigNotFound(name) => write!(f, "config not found: {name}"),
            ProofreaderError::UnsupportedKind { what, got } => {
                write!(f, "unsupported {what}: {got}")
            }
            ProofreaderError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ProofreaderError::CheckpointMismatch { got, expected } => write!(
                f,
                "checkpoint holds {got} parameters, the model has {expected}"
            ),
            ProofreaderError::CollectiveAborted => write!(f, "collective aborted by another rank"),
            ProofreaderError::RankFailed { rank, msg } => write!(f, "rank {rank} failed: {msg}"),
            ProofreaderError::Io(e) => write!(f, "io error: {e}"),
            ProofreaderError::Json(e) => write!(f, "json error: {e}"),
            ProofreaderError::Data(e) => write!(f, "data error: {e}"),
            ProofreaderError::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ProofreaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProofreaderError::Io(e) => Some(e),
            ProofreaderError::Json(e) => Some(e),
            ProofreaderError::Data(e) => Some(e),
            ProofreaderError::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProofreaderError {
    fn from(e: io::Error) -> Self {
        ProofreaderError::Io(e)
    }
}

impl From<serde_json::Error> for ProofreaderError {
    fn from(e: serde_json::Error) -> Self {
        ProofreaderError::Json(e)
    }
}

impl From<DataError> for ProofreaderError {
    fn from(e: DataError) -> Self {
        ProofreaderError::Data(e)
    }
}

impl From<MlErr> for ProofreaderError {
    fn from(e: MlErr) -> Self {
        ProofreaderError::Ml(e)
    }
}

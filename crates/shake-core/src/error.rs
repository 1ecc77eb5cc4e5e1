use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShakeError {
    #[error("invalid chunk width {0}h: must be non-zero and divide 24 evenly")]
    InvalidChunkWidth(u32),

    #[error("invalid date range {start}..{end}: end is before start")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("refusing to overwrite existing artifact: {0}")]
    ArtifactExists(PathBuf),

    #[error("failed to encode day record: {0}")]
    Encode(#[from] fdsn_client::EncodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ShakeError>;

use std::path::PathBuf;

use thiserror::Error;

use crate::shared::time_stamp::TimeStamp;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed archive data: {0}")]
    Format(String),
    #[error("requested range is not available: {0}")]
    Range(String),
    #[error("a frame already exists at {0}")]
    DuplicateInsertion(TimeStamp),
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

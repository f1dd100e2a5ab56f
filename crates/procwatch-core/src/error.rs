use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown sort key: {0}")]
    UnknownSortKey(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

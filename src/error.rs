use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A pattern template referenced a fragment that is not defined.
    #[error("pattern fragment [:{name}:] not found in {pattern}")]
    UnknownPattern { name: String, pattern: String },

    #[error("invalid JsonML: {0}")]
    InvalidJsonMl(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use crate::field::ResolutionError;

/// Shared error type used across all particle-flow crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("field: {0}")]
    Resolution(#[from] ResolutionError),

    /// The cloud answered with something other than `200 OK`.
    #[error("remote {status}: {message}")]
    Remote {
        status: u16,
        message: String,
        body: serde_json::Value,
    },

    #[error("stream: {0}")]
    Stream(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

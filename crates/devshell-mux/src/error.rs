use thiserror::Error;

/// Errors surfaced by the multiplexer and its collaborators
#[derive(Debug, Error)]
pub enum MuxError {
    /// The request never produced a response (network failure, aborted fetch)
    #[error("request failed: {0}")]
    Request(String),

    /// The process host answered with a non-success status
    #[error("{status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// The terminal channel could not be opened or written to
    #[error("channel error: {0}")]
    Channel(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// The rendering surface could not be mounted
    #[error("surface error: {0}")]
    Surface(String),
}

pub type Result<T> = std::result::Result<T, MuxError>;

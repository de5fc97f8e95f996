//! Error types for the streaming pipeline

use thiserror::Error;

/// Failure raised before or while reading the response body.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network response was not ok: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("No body included in POST response object")]
    MissingBody,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Stream read failed: {0}")]
    Read(String),
}

/// Failure raised while turning frames into deltas.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed frame payload `{line}`: {source}")]
    Json {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Frame payload has no choices")]
    MissingChoices,

    #[error("Remote service reported an error: {0}")]
    Remote(String),
}

/// Top-level error for one request lifecycle.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Request aborted")]
    Cancelled,
}

impl StreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(error: reqwest::Error) -> Self {
        StreamError::Transport(TransportError::Request(error))
    }
}

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

use thiserror::Error;

/// Failure to decode a response body into the claiming processor's payload.
///
/// Keeps the raw body around so the failure can be logged with the data
/// that caused it.
#[derive(Error, Debug)]
#[error("Failed to decode {group} using {processor}: {source}")]
pub struct DecodeError {
    pub group: String,
    pub processor: String,
    pub body: Vec<u8>,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response was not a well-formed HTTP response ({} bytes)", .body.len())]
    BadResponseShape { body: Vec<u8> },

    #[error("Unexpected response code: {0}")]
    UnexpectedResponseCode(u16),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Resource path leaves the base address: {0}")]
    InvalidPath(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain task failed: {0}")]
    Chain(#[from] tokio::task::JoinError),
}

impl PollError {
    /// True for failures where no HTTP response reached the processors.
    pub fn is_transport(&self) -> bool {
        matches!(self, PollError::Transport(_) | PollError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, PollError>;

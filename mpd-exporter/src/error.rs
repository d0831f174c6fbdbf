//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Manifest parse error: {0}")]
    Parse(#[from] mpd::ParseError),

    #[error("Accounting error for segment {url}: {reason}")]
    Accounting { url: String, reason: String },

    #[error("Unexpected fault: {0}")]
    UnexpectedFault(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn accounting(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Accounting {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Short label used for logs and the per-cycle failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } | Self::HttpStatus { .. } => "transport",
            Self::Parse(_) => "parse",
            Self::Accounting { .. } => "accounting",
            Self::UnexpectedFault(_) => "fault",
            Self::Cancelled => "cancelled",
            Self::Configuration(_) => "configuration",
            Self::Server(_) | Self::Io(_) => "io",
        }
    }
}

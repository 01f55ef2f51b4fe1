//! Error types for ddbook

use thiserror::Error;

/// Errors that can occur while converting a sourcebook
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Base URL could not be parsed or has no sourcebook segment
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Chapter argument has no usable slug or filename
    #[error("Malformed chapter argument '{arg}': {reason}")]
    MalformedChapter { arg: String, reason: &'static str },

    /// Fetch collaborator failed (non-zero exit, connection error, bad status)
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Fetch collaborator exceeded its time bound
    #[error("Fetching {url} timed out after {seconds}s")]
    FetchTimeout { url: String, seconds: u64 },

    /// Fetch succeeded but produced no bytes
    #[error("Fetched page is empty: {url}")]
    EmptyPage { url: String },

    /// Page has no article content container
    #[error("Article content container not found")]
    ContentNotFound,

    /// Single image could not be downloaded
    #[error("Failed to download image {url}: {reason}")]
    ImageDownload { url: String, reason: String },

    /// Cache slot could not be read or written
    #[error("Cache error")]
    Cache(#[source] std::io::Error),

    /// Filesystem error while writing output
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// User-Agent is not a valid header value
    #[error("Invalid User-Agent: {0:?}")]
    InvalidUserAgent(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),
}

impl ConvertError {
    /// Create a fetch error from a reqwest error
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        ConvertError::FetchFailed {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    /// Create a malformed chapter error
    pub fn malformed(arg: &str, reason: &'static str) -> Self {
        ConvertError::MalformedChapter {
            arg: arg.to_string(),
            reason,
        }
    }
}

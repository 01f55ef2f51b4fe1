//! Page fetch collaborators
//!
//! A [`PageFetcher`] turns a URL into raw page bytes. The Fetch Cache
//! ([`crate::page_cache::FetchCache`]) decides when to call one.
//!
//! Built-in fetchers:
//! - [`CommandFetcher`] - runs an external fetch program as `<program> <url> <output-path>`
//! - [`HttpFetcher`] - plain HTTP GET, used when no external program is configured

mod command;
mod http;

pub use command::CommandFetcher;
pub use http::HttpFetcher;

use crate::error::ConvertError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderValue;
use std::time::Duration;

/// Default time bound for one fetch
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Connect timeout for HTTP clients
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validate a User-Agent value for an HTTP client
pub(crate) fn user_agent_header(user_agent: &str) -> Result<HeaderValue, ConvertError> {
    HeaderValue::from_str(user_agent)
        .map_err(|_| ConvertError::InvalidUserAgent(user_agent.to_string()))
}

/// Trait for page fetchers
///
/// Implementations perform exactly one attempt per call; retrying is left
/// to the caller re-running the whole conversion.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Fetch the raw bytes of `url`
    async fn fetch(&self, url: &str) -> Result<Bytes, ConvertError>;
}

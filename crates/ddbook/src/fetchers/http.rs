//! Direct HTTP fetcher
//!
//! Used when no external fetch program is configured.

use crate::error::ConvertError;
use crate::fetchers::{user_agent_header, PageFetcher, CONNECT_TIMEOUT, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP GET fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default User-Agent and timeout
    pub fn new() -> Result<Self, ConvertError> {
        Self::with_options(
            DEFAULT_USER_AGENT,
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        )
    }

    /// Create a fetcher with a custom User-Agent and time bound
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self, ConvertError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, user_agent_header(user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html, application/xhtml+xml, */*;q=0.8"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ConvertError::ClientBuildError)?;

        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, ConvertError> {
        debug!(url, "HTTP GET");

        let deadline = tokio::time::Instant::now() + self.timeout;
        let timed_out = || ConvertError::FetchTimeout {
            url: url.to_string(),
            seconds: self.timeout.as_secs(),
        };

        let response = tokio::time::timeout_at(deadline, self.client.get(url).send())
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| ConvertError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConvertError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        // Partial bodies are never returned
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        loop {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(Ok(chunk))) => body.extend_from_slice(&chunk),
                Ok(Some(Err(e))) => return Err(ConvertError::from_reqwest(url, e)),
                Ok(None) => break,
                Err(_) => {
                    warn!(url, received = body.len(), "Body timeout reached");
                    return Err(timed_out());
                }
            }
        }

        if body.is_empty() {
            return Err(ConvertError::EmptyPage {
                url: url.to_string(),
            });
        }

        Ok(Bytes::from(body))
    }
}

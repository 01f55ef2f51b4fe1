//! Fetch Cache
//!
//! Combines a [`CacheStore`] with a [`PageFetcher`]. A slot holding more
//! than [`MIN_CACHED_PAGE_BYTES`] is served without touching the network;
//! anything smaller is treated as a truncated or error page and refetched.

use crate::cache::CacheStore;
use crate::error::ConvertError;
use crate::fetchers::PageFetcher;
use crate::types::PageKey;
use tracing::{debug, error, info, warn};

/// Cached pages at or below this size are ignored
pub const MIN_CACHED_PAGE_BYTES: usize = 1000;

/// Page fetcher with an on-disk (or in-memory) cache in front of it
pub struct FetchCache {
    store: Box<dyn CacheStore>,
    fetcher: Box<dyn PageFetcher>,
    min_cached_bytes: usize,
}

impl FetchCache {
    pub fn new(store: Box<dyn CacheStore>, fetcher: Box<dyn PageFetcher>) -> Self {
        Self {
            store,
            fetcher,
            min_cached_bytes: MIN_CACHED_PAGE_BYTES,
        }
    }

    /// Override the plausibility threshold for cached pages
    pub fn with_min_cached_bytes(mut self, bytes: usize) -> Self {
        self.min_cached_bytes = bytes;
        self
    }

    /// Fetch a page, returning an empty string on any failure
    ///
    /// Failures are logged with the URL and key; callers treat an empty
    /// result as "skip this page".
    pub async fn fetch(&self, url: &str, key: &PageKey) -> String {
        match self.try_fetch(url, key).await {
            Ok(html) => html,
            Err(e) => {
                error!(url, key = %key, error = %e, "Fetch failed");
                String::new()
            }
        }
    }

    /// Fetch a page, surfacing the failure
    pub async fn try_fetch(&self, url: &str, key: &PageKey) -> Result<String, ConvertError> {
        match self.store.get(key) {
            Ok(Some(cached)) if cached.len() > self.min_cached_bytes => {
                info!(key = %key, "Using cached HTML");
                return Ok(String::from_utf8_lossy(&cached).into_owned());
            }
            Ok(Some(cached)) => {
                debug!(key = %key, size = cached.len(), "Cached page too small, refetching");
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache slot unreadable, refetching"),
        }

        info!(url, fetcher = self.fetcher.name(), "Fetching");
        let body = self.fetcher.fetch(url).await?;
        if body.is_empty() {
            return Err(ConvertError::EmptyPage {
                url: url.to_string(),
            });
        }

        // The page is still usable when the slot cannot be written
        if let Err(e) = self.store.put(key, &body) {
            warn!(key = %key, error = %e, "Failed to write cache slot");
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

//! Chapter Pipeline
//!
//! Drives fetch, conversion, document write and image download for each
//! chapter, one chapter at a time. A failing chapter is logged and skipped;
//! the run always continues with the next one.

use crate::cache::{CacheStore, FileCacheStore};
use crate::convert::try_convert_html;
use crate::discover::discover_chapters;
use crate::error::ConvertError;
use crate::fetchers::{CommandFetcher, HttpFetcher, PageFetcher, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::images::{ImageDownloader, IMAGES_DIR, IMAGE_USER_AGENT, MEDIA_HOST};
use crate::page_cache::{FetchCache, MIN_CACHED_PAGE_BYTES};
use crate::types::{ensure_distinct_filenames, Chapter, ChapterOutcome, PageKey, RunReport};
use crate::DEFAULT_USER_AGENT;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Builder for configuring a [`Pipeline`]
pub struct PipelineBuilder {
    fetcher: Option<Box<dyn PageFetcher>>,
    fetch_program: Option<PathBuf>,
    store: Option<Box<dyn CacheStore>>,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
    min_cached_bytes: usize,
    page_user_agent: String,
    image_user_agent: String,
    media_host: String,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            fetcher: None,
            fetch_program: None,
            store: None,
            cache_dir: None,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            min_cached_bytes: MIN_CACHED_PAGE_BYTES,
            page_user_agent: DEFAULT_USER_AGENT.to_string(),
            image_user_agent: IMAGE_USER_AGENT.to_string(),
            media_host: MEDIA_HOST.to_string(),
        }
    }

    /// Use an external program to fetch pages
    pub fn fetch_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.fetch_program = Some(program.into());
        self
    }

    /// Use a custom page fetcher (takes precedence over `fetch_program`)
    pub fn fetcher(mut self, fetcher: Box<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Keep cache slots in `dir` instead of the temporary directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Use a custom cache store (takes precedence over `cache_dir`)
    pub fn cache_store(mut self, store: Box<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Time bound for one page fetch or image download
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cached pages at or below this size are refetched
    pub fn min_cached_bytes(mut self, bytes: usize) -> Self {
        self.min_cached_bytes = bytes;
        self
    }

    /// Set User-Agent for both page and image requests
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        let ua = ua.into();
        self.page_user_agent = ua.clone();
        self.image_user_agent = ua;
        self
    }

    /// Host substring identifying images to download
    pub fn media_host(mut self, host: impl Into<String>) -> Self {
        self.media_host = host.into();
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline, ConvertError> {
        let fetcher: Box<dyn PageFetcher> = match (self.fetcher, self.fetch_program) {
            (Some(fetcher), _) => fetcher,
            (None, Some(program)) => {
                Box::new(CommandFetcher::new(program).with_timeout(self.timeout))
            }
            (None, None) => Box::new(HttpFetcher::with_options(
                &self.page_user_agent,
                self.timeout,
            )?),
        };

        let store: Box<dyn CacheStore> = match (self.store, self.cache_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Box::new(FileCacheStore::new(dir)),
            (None, None) => Box::new(FileCacheStore::in_temp_dir()),
        };

        Ok(Pipeline {
            cache: FetchCache::new(store, fetcher).with_min_cached_bytes(self.min_cached_bytes),
            downloader: ImageDownloader::with_options(&self.image_user_agent, self.timeout)?,
            media_host: self.media_host,
        })
    }
}

/// Configured sourcebook conversion pipeline
pub struct Pipeline {
    cache: FetchCache,
    downloader: ImageDownloader,
    media_host: String,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Return `explicit` unchanged, or discover chapters from the overview page
    ///
    /// Explicit chapters sharing an output filename are rejected before any
    /// fetch. Failing to fetch the overview page is the one fatal fetch error.
    pub async fn resolve_chapters(
        &self,
        base_url: &str,
        explicit: Vec<Chapter>,
    ) -> Result<Vec<Chapter>, ConvertError> {
        if !explicit.is_empty() {
            ensure_distinct_filenames(&explicit)?;
            return Ok(explicit);
        }

        let base_url = base_url.trim_end_matches('/');
        info!(base_url, "Discovering chapters");
        let overview = self
            .cache
            .try_fetch(base_url, &PageKey::for_overview(base_url))
            .await?;
        let chapters = discover_chapters(&overview, base_url)?;
        info!(count = chapters.len(), "Found chapters");
        Ok(chapters)
    }

    /// Fetch, convert and save one chapter, then download its images
    pub async fn process_chapter(
        &self,
        chapter: &Chapter,
        base_url: &str,
        output_dir: &Path,
        images_dir: &Path,
    ) -> ChapterOutcome {
        info!(slug = %chapter.slug, file = %chapter.filename, "Processing chapter");
        let skipped = |reason: &str| ChapterOutcome::Skipped {
            slug: chapter.slug.clone(),
            reason: reason.to_string(),
        };

        let url = format!("{}/{}", base_url.trim_end_matches('/'), chapter.slug);
        let html = self.cache.fetch(&url, &chapter.page_key()).await;
        if html.is_empty() {
            return skipped("fetch failed");
        }

        let doc = match try_convert_html(&html, &self.media_host) {
            Ok(doc) if !doc.is_empty() => doc,
            Ok(_) => {
                warn!(slug = %chapter.slug, url = %url, "Article content is empty");
                return skipped("empty article content");
            }
            Err(e) => {
                warn!(slug = %chapter.slug, url = %url, error = %e, "Could not convert chapter");
                return skipped(&e.to_string());
            }
        };

        let out_path = output_dir.join(&chapter.filename);
        if let Err(e) = tokio::fs::write(&out_path, &doc.markdown).await {
            error!(path = %out_path.display(), error = %e, "Failed to write document");
            return skipped("write failed");
        }
        let chars = doc.markdown.chars().count();
        info!(file = %chapter.filename, chars, "Saved document");

        let stats = self.downloader.download_all(&doc.images, images_dir).await;

        ChapterOutcome::Written {
            slug: chapter.slug.clone(),
            filename: chapter.filename.clone(),
            chars,
            images_downloaded: stats.downloaded,
            images_skipped: stats.skipped,
            images_failed: stats.failed,
        }
    }

    /// Convert every chapter into `output_dir`
    ///
    /// Creates `output_dir` and its `images` subdirectory. Duplicate output
    /// filenames and failing to create the directories are errors; chapter
    /// failures end up in the report.
    pub async fn run(
        &self,
        base_url: &str,
        output_dir: &Path,
        chapters: &[Chapter],
    ) -> Result<RunReport, ConvertError> {
        ensure_distinct_filenames(chapters)?;
        let base_url = base_url.trim_end_matches('/');
        let images_dir = output_dir.join(IMAGES_DIR);
        tokio::fs::create_dir_all(&images_dir).await?;

        let mut report = RunReport {
            base_url: base_url.to_string(),
            output_dir: output_dir.display().to_string(),
            chapters: Vec::with_capacity(chapters.len()),
        };

        for chapter in chapters {
            let outcome = self
                .process_chapter(chapter, base_url, output_dir, &images_dir)
                .await;
            report.chapters.push(outcome);
        }

        info!(
            processed = report.chapters.len(),
            written = report.written(),
            skipped = report.skipped(),
            "Done"
        );
        Ok(report)
    }
}

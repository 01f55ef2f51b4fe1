//! ddbook - convert web-hosted D&D Beyond sourcebooks to Markdown
//!
//! Given the base URL of a sourcebook, ddbook discovers (or is given) its
//! chapters, fetches each chapter page through an on-disk cache, extracts
//! the article content, rewrites media images to local paths, converts the
//! result to Markdown and downloads the referenced images.
//!
//! ## Components
//!
//! - [`FetchCache`] - cached page fetches backed by a [`PageFetcher`]
//! - [`extract`] - article container lookup and cleaning
//! - [`resolve_images`] - local image rewriting and download list
//! - [`convert_html`] - HTML to Markdown
//! - [`discover_chapters`] - chapter list from an overview page
//! - [`Pipeline`] - per-chapter orchestration
//!
//! ## Example
//!
//! ```no_run
//! use ddbook::{Chapter, Pipeline};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), ddbook::ConvertError> {
//! let base_url = "https://www.dndbeyond.com/sources/dnd/doip";
//! let pipeline = Pipeline::builder().fetch_program("scripts/fetch-ddb.sh").build()?;
//! let chapters = pipeline
//!     .resolve_chapters(base_url, vec!["gnomengarde:Gnomengarde.md".parse::<Chapter>()?])
//!     .await?;
//! let report = pipeline.run(base_url, Path::new("out"), &chapters).await?;
//! println!("{} chapters written", report.written());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod convert;
pub mod discover;
mod error;
pub mod extract;
pub mod fetchers;
pub mod images;
pub mod page_cache;
pub mod pipeline;
mod types;

pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use convert::{collapse_blank_lines, convert_html, html_to_markdown, try_convert_html};
pub use discover::{chapter_filename, discover_chapters, sourcebook_slug, INDEX_FILENAME};
pub use error::ConvertError;
pub use extract::{extract, ArticleContent};
pub use fetchers::{CommandFetcher, HttpFetcher, PageFetcher};
pub use images::{resolve_images, DownloadStats, ImageDownloader, MEDIA_HOST};
pub use page_cache::FetchCache;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use types::{
    ensure_distinct_filenames, Chapter, ChapterOutcome, ConvertedDocument, ImageKind, ImageRef,
    PageKey, RunReport,
};

/// Default User-Agent for page requests
pub const DEFAULT_USER_AGENT: &str = "ddbook/0.1";

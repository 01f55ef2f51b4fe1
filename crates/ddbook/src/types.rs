//! Core types for ddbook

use crate::discover::{chapter_filename, INDEX_FILENAME};
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Cache slot identifier
///
/// Keys only contain `[A-Za-z0-9._-]` so they can be used directly in file
/// names. `_` is the escape character: a literal `_` becomes `__` and any
/// other byte becomes `_xx` (lower-case hex), so distinct inputs never share
/// a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageKey(String);

impl PageKey {
    /// Create a key, escaping bytes that are not path-safe
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        // A key made only of dots would name a directory
        let escape_dots = raw.bytes().all(|b| b == b'.');

        let mut key = String::with_capacity(raw.len());
        for b in raw.bytes() {
            match b {
                b'_' => key.push_str("__"),
                b'.' if escape_dots => key.push_str("_2e"),
                b if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' => key.push(b as char),
                b => key.push_str(&format!("_{:02x}", b)),
            }
        }
        Self(key)
    }

    /// Key for a chapter page
    pub fn for_chapter(slug: &str) -> Self {
        Self::new(slug)
    }

    /// Key for a sourcebook overview page
    ///
    /// Uses the last `/`-separated component of the base URL.
    pub fn for_overview(base_url: &str) -> Self {
        let last = base_url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        Self::new(format!("overview-{}", last))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetchable unit of sourcebook content, mapped to one output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// URL path segment identifying the chapter
    pub slug: String,
    /// Output document name inside the output directory
    pub filename: String,
}

impl Chapter {
    /// Create a chapter with an explicit filename
    pub fn new(slug: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            filename: filename.into(),
        }
    }

    /// Create a chapter whose filename is derived from the slug
    pub fn from_slug(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        let filename = chapter_filename(&slug);
        Self { slug, filename }
    }

    /// Cache key for this chapter's page
    pub fn page_key(&self) -> PageKey {
        PageKey::for_chapter(&self.slug)
    }
}

impl FromStr for Chapter {
    type Err = ConvertError;

    /// Parse a `slug[:filename]` command line argument
    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let (slug, filename) = match arg.split_once(':') {
            Some((slug, filename)) => (slug, Some(filename)),
            None => (arg, None),
        };

        if slug.is_empty() {
            return Err(ConvertError::malformed(arg, "empty slug"));
        }
        if slug.contains('/') || slug.chars().any(char::is_whitespace) {
            return Err(ConvertError::malformed(
                arg,
                "slug must be a single URL path segment",
            ));
        }

        match filename {
            None => Ok(Chapter::from_slug(slug)),
            Some("") => Err(ConvertError::malformed(arg, "empty filename after ':'")),
            Some("." | "..") => Err(ConvertError::malformed(arg, "filename is not a file")),
            Some(name) if name.contains(['/', '\\']) => Err(ConvertError::malformed(
                arg,
                "filename must not contain path separators",
            )),
            Some(name) => Ok(Chapter::new(slug, name)),
        }
    }
}

/// Reject chapter lists in which two chapters would write the same document
pub fn ensure_distinct_filenames(chapters: &[Chapter]) -> Result<(), ConvertError> {
    let mut seen = HashSet::new();
    for chapter in chapters {
        if !seen.insert(chapter.filename.as_str()) {
            let arg = format!("{}:{}", chapter.slug, chapter.filename);
            let reason = if chapter.filename == INDEX_FILENAME {
                "only one chapter may be written to index.md"
            } else {
                "filename already used by another chapter"
            };
            return Err(ConvertError::malformed(&arg, reason));
        }
    }
    Ok(())
}

/// Where an image reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// `<img>` element, rewritten to a local path in the document
    Inline,
    /// Full-resolution lightbox link, download hint only
    Lightbox,
}

/// Image to download: remote URL and its local file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub filename: String,
    pub kind: ImageKind,
}

impl ImageRef {
    /// Build a reference from a URL, using its final path segment as file name
    ///
    /// Returns `None` when the URL ends with `/`.
    pub fn from_url(url: &str, kind: ImageKind) -> Option<Self> {
        let filename = url.rsplit('/').next().unwrap_or("");
        if filename.is_empty() || filename == "." || filename == ".." {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            filename: filename.to_string(),
            kind,
        })
    }
}

/// Result of converting one chapter page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub markdown: String,
    /// Inline images first, lightbox variants second
    pub images: Vec<ImageRef>,
}

impl ConvertedDocument {
    pub fn is_empty(&self) -> bool {
        self.markdown.is_empty()
    }
}

/// What happened to one chapter during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChapterOutcome {
    Written {
        slug: String,
        filename: String,
        chars: usize,
        images_downloaded: usize,
        images_skipped: usize,
        images_failed: usize,
    },
    Skipped {
        slug: String,
        reason: String,
    },
}

impl ChapterOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, ChapterOutcome::Written { .. })
    }
}

/// Summary of a whole conversion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub base_url: String,
    pub output_dir: String,
    pub chapters: Vec<ChapterOutcome>,
}

impl RunReport {
    /// Number of chapters whose document was written
    pub fn written(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_written()).count()
    }

    /// Number of chapters that were skipped
    pub fn skipped(&self) -> usize {
        self.chapters.len() - self.written()
    }
}

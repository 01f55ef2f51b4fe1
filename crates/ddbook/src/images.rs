//! Image Resolver and downloader
//!
//! [`resolve_images`] rewrites media-host image sources to local
//! `images/<file>` paths and lists what has to be downloaded.
//! [`ImageDownloader`] fetches that list into the images directory.

use crate::error::ConvertError;
use crate::extract::ArticleContent;
use crate::fetchers::{user_agent_header, CONNECT_TIMEOUT, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::types::{ImageKind, ImageRef};
use dom_query::Selection;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Host substring identifying sourcebook media
pub const MEDIA_HOST: &str = "media.dndbeyond.com";

/// Directory, relative to the output directory, holding downloaded images
pub const IMAGES_DIR: &str = "images";

/// User-Agent for image requests
pub const IMAGE_USER_AGENT: &str = "Mozilla/5.0";

/// Anchors opening the full-resolution image viewer
const LIGHTBOX_SELECTOR: &str = "a.ddb-lightbox-outer";

/// Rewrite media-host images to local paths and collect downloads
///
/// Inline `<img>` sources come first, in document order, followed by
/// lightbox link targets. Lightbox links are left untouched in the
/// document; they only contribute a higher-resolution download.
pub fn resolve_images(content: &mut ArticleContent, media_host: &str) -> Vec<ImageRef> {
    let container = content.container();
    let mut images = Vec::new();

    for node in container.select("img").nodes() {
        let img = Selection::from(*node);
        let Some(src) = img.attr("src") else {
            continue;
        };
        if !src.contains(media_host) {
            continue;
        }
        if let Some(image) = ImageRef::from_url(&src, ImageKind::Inline) {
            img.set_attr("src", &format!("{}/{}", IMAGES_DIR, image.filename));
            images.push(image);
        }
    }

    for node in container.select(LIGHTBOX_SELECTOR).nodes() {
        let anchor = Selection::from(*node);
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        if !href.contains(media_host) {
            continue;
        }
        if let Some(image) = ImageRef::from_url(&href, ImageKind::Lightbox) {
            images.push(image);
        }
    }

    images
}

/// Counters for one batch of downloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Downloads images, never replacing files from earlier runs
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: reqwest::Client,
    timeout: Duration,
}

impl ImageDownloader {
    pub fn new() -> Result<Self, ConvertError> {
        Self::with_options(
            IMAGE_USER_AGENT,
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        )
    }

    /// Create a downloader with a custom User-Agent and per-image time bound
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent_header(user_agent)?)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(ConvertError::ClientBuildError)?;
        Ok(Self { client, timeout })
    }

    /// Download every image of one chapter into `images_dir`
    ///
    /// An existing file is kept, with one exception: a lightbox variant
    /// replaces a thumbnail written earlier in the same call. Failures are
    /// logged per image and counted; they never abort the batch.
    pub async fn download_all(&self, images: &[ImageRef], images_dir: &Path) -> DownloadStats {
        let mut stats = DownloadStats::default();
        let mut written_this_pass: HashSet<&str> = HashSet::new();

        for image in images {
            let dest = images_dir.join(&image.filename);
            let upgrade = image.kind == ImageKind::Lightbox
                && written_this_pass.contains(image.filename.as_str());

            if dest.exists() && !upgrade {
                debug!(file = %image.filename, "Image already present");
                stats.skipped += 1;
                continue;
            }

            info!(file = %image.filename, kind = ?image.kind, "Downloading image");
            match self.download(&image.url, &dest).await {
                Ok(()) => {
                    stats.downloaded += 1;
                    written_this_pass.insert(image.filename.as_str());
                }
                Err(e) => {
                    warn!(url = %image.url, error = %e, "Image download failed");
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Download one URL to `dest`, replacing it atomically
    ///
    /// The whole request, body included, is bounded by the downloader's
    /// timeout.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), ConvertError> {
        let failed = |e: reqwest::Error| ConvertError::ImageDownload {
            url: url.to_string(),
            reason: if e.is_timeout() {
                format!("timed out after {}s", self.timeout.as_secs())
            } else {
                e.to_string()
            },
        };

        let response = self.client.get(url).send().await.map_err(failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConvertError::ImageDownload {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = response.bytes().await.map_err(failed)?;

        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)?;
        staged.write_all(&body)?;
        staged.persist(dest).map_err(|e| ConvertError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    fn content(body: &str) -> ArticleContent {
        extract(&format!(r#"<div class="p-article-content">{}</div>"#, body))
            .unwrap()
            .clean()
    }

    #[test]
    fn test_invalid_user_agent_is_rejected() {
        let result = ImageDownloader::with_options("bad\nagent", Duration::from_secs(1));
        assert!(matches!(result, Err(ConvertError::InvalidUserAgent(_))));
    }

    #[test]
    fn test_rewrites_media_images() {
        let mut article =
            content(r#"<p><img src="https://media.dndbeyond.com/x/y/pic.png" alt="Map"></p>"#);
        let images = resolve_images(&mut article, MEDIA_HOST);

        assert_eq!(
            images,
            vec![ImageRef {
                url: "https://media.dndbeyond.com/x/y/pic.png".to_string(),
                filename: "pic.png".to_string(),
                kind: ImageKind::Inline,
            }]
        );
        let html = article.html();
        assert!(html.contains(r#"src="images/pic.png""#));
        assert!(!html.contains("media.dndbeyond.com"));
    }

    #[test]
    fn test_ignores_other_hosts() {
        let mut article = content(r#"<img src="https://cdn.example.com/logo.png"><img alt="none">"#);
        let images = resolve_images(&mut article, MEDIA_HOST);

        assert!(images.is_empty());
        assert!(article.html().contains("https://cdn.example.com/logo.png"));
    }

    #[test]
    fn test_lightbox_links_follow_inline_images() {
        let mut article = content(
            r#"<a class="ddb-lightbox-outer" href="https://media.dndbeyond.com/full/map.jpg"><img src="https://media.dndbeyond.com/thumb/map.jpg"></a>
               <img src="https://media.dndbeyond.com/thumb/other.png">"#,
        );
        let images = resolve_images(&mut article, MEDIA_HOST);

        let summary: Vec<_> = images
            .iter()
            .map(|i| (i.filename.as_str(), i.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("map.jpg", ImageKind::Inline),
                ("other.png", ImageKind::Inline),
                ("map.jpg", ImageKind::Lightbox),
            ]
        );
        // The lightbox href is a download hint only
        assert!(article
            .html()
            .contains(r#"href="https://media.dndbeyond.com/full/map.jpg""#));
    }

    #[test]
    fn test_custom_media_host() {
        let mut article = content(r#"<img src="http://127.0.0.1:9999/img/a.png">"#);
        let images = resolve_images(&mut article, "127.0.0.1");
        assert_eq!(images.len(), 1);
        assert!(article.html().contains(r#"src="images/a.png""#));
    }
}

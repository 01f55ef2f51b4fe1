//! Document Converter
//!
//! Turns cleaned article HTML into Markdown with ATX headings and `-`
//! bullets, then normalizes blank-line runs.

use crate::error::ConvertError;
use crate::extract::{extract, ArticleContent};
use crate::images::resolve_images;
use crate::types::ConvertedDocument;
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Tags dropped with their content if they survived cleaning
const SKIP_TAGS: &[&str] = &["script", "style", "nav"];

/// Four or more consecutive newlines
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{4,}").expect("BLANK_RUN regex"));

/// Convert HTML to Markdown
pub fn html_to_markdown(html: &str) -> Result<String, std::io::Error> {
    let converter = HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .skip_tags(SKIP_TAGS.to_vec())
        .build();
    converter.convert(html)
}

/// Collapse runs of 4+ newlines to exactly 3, trim, end with one newline
///
/// Returns an empty string when nothing but whitespace remains.
pub fn collapse_blank_lines(markdown: &str) -> String {
    let collapsed = BLANK_RUN.replace_all(markdown, "\n\n\n");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{}\n", trimmed)
}

/// Convert already-extracted content, rewriting media images
pub fn convert_content(
    mut content: ArticleContent,
    media_host: &str,
) -> Result<ConvertedDocument, ConvertError> {
    let images = resolve_images(&mut content, media_host);
    let markdown = collapse_blank_lines(&html_to_markdown(&content.html())?);

    debug!(chars = markdown.len(), images = images.len(), "Converted article");
    Ok(ConvertedDocument { markdown, images })
}

/// Extract, clean and convert a full sourcebook page
pub fn try_convert_html(html: &str, media_host: &str) -> Result<ConvertedDocument, ConvertError> {
    let content = extract(html).ok_or(ConvertError::ContentNotFound)?;
    convert_content(content.clean(), media_host)
}

/// Extract, clean and convert a full sourcebook page
///
/// Never fails: a page without an article container yields an empty
/// document and an empty image list.
pub fn convert_html(html: &str, media_host: &str) -> ConvertedDocument {
    try_convert_html(html, media_host).unwrap_or_else(|e| {
        warn!(error = %e, "Conversion produced no document");
        ConvertedDocument::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::MEDIA_HOST;

    fn article(body: &str) -> String {
        format!(
            r#"<!DOCTYPE html><html><head><title>T</title></head><body><div class="p-article-content">{}</div></body></html>"#,
            body
        )
    }

    #[test]
    fn test_headings_are_atx() {
        let md = html_to_markdown("<h1>Title</h1><h2>Sub</h2><p>Text</p>").unwrap();
        assert!(md.contains("# Title"));
        assert!(md.contains("## Sub"));
        assert!(!md.contains("===="));
    }

    #[test]
    fn test_bullets_use_dash() {
        let md = html_to_markdown("<ul><li>Item 1</li><li>Item 2</li></ul>").unwrap();
        let bullets: Vec<_> = md.lines().filter(|l| l.starts_with('-')).collect();
        assert_eq!(bullets.len(), 2);
        assert!(bullets[0].ends_with("Item 1"));
        assert!(bullets[1].ends_with("Item 2"));
        assert!(!md.contains('*'));
    }

    #[test]
    fn test_skip_tags_are_stripped() {
        let md = html_to_markdown(
            "<p>Before</p><script>alert('bad');</script><style>p{}</style><nav>Menu</nav><p>After</p>",
        )
        .unwrap();
        assert!(md.contains("Before"));
        assert!(md.contains("After"));
        assert!(!md.contains("alert"));
        assert!(!md.contains("Menu"));
    }

    #[test]
    fn test_collapse_six_newlines_to_three() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb\n");
    }

    #[test]
    fn test_collapse_keeps_short_runs() {
        assert_eq!(collapse_blank_lines("a\n\nb\n\n\nc"), "a\n\nb\n\n\nc\n");
    }

    #[test]
    fn test_collapse_trims_and_terminates() {
        assert_eq!(collapse_blank_lines("\n\n  text  \n\n\n\n"), "text\n");
        assert_eq!(collapse_blank_lines(" \n\n "), "");
    }

    #[test]
    fn test_convert_without_container_is_empty() {
        let doc = convert_html("<html><body><p>Nothing here</p></body></html>", MEDIA_HOST);
        assert!(doc.markdown.is_empty());
        assert!(doc.images.is_empty());
    }

    #[test]
    fn test_try_convert_reports_missing_container() {
        let result = try_convert_html("<html><body></body></html>", MEDIA_HOST);
        assert!(matches!(result, Err(ConvertError::ContentNotFound)));
    }

    #[test]
    fn test_convert_full_article() {
        let html = article(
            r#"<h1 class="compendium-hr">Gnomengarde</h1>
               <p>The <a class="tooltip-hover" href="/monsters/gnome">gnomes</a> live here.</p>
               <div style="display:none">tracking</div>
               <figure><img src="https://media.dndbeyond.com/x/y/pic.png" alt="Map"></figure>
               <ul><li>One</li><li>Two</li></ul>"#,
        );
        let doc = convert_html(&html, MEDIA_HOST);

        assert!(doc.markdown.starts_with("# Gnomengarde"));
        assert!(doc.markdown.contains("The gnomes live here."));
        assert!(doc.markdown.contains("images/pic.png"));
        assert!(!doc.markdown.contains("media.dndbeyond.com"));
        assert!(!doc.markdown.contains("tracking"));
        assert!(!doc.markdown.contains("/monsters/gnome"));
        assert!(doc
            .markdown
            .lines()
            .any(|l| l.starts_with('-') && l.ends_with("One")));
        assert!(doc.markdown.ends_with('\n'));
        assert!(!doc.markdown.ends_with("\n\n"));
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.images[0].url, "https://media.dndbeyond.com/x/y/pic.png");
        assert_eq!(doc.images[0].filename, "pic.png");
    }

    #[test]
    fn test_convert_empty_container() {
        let doc = convert_html(&article(r#"<div style="display:none">only hidden</div>"#), MEDIA_HOST);
        assert!(doc.is_empty());
    }
}

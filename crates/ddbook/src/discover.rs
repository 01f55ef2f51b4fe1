//! Chapter Discoverer
//!
//! Finds the chapters of a sourcebook from the links on its overview page.
//! Links use either `/sources/<book>/<chapter>` or
//! `/sources/dnd/<book>/<chapter>`.

use crate::error::ConvertError;
use crate::types::Chapter;
use dom_query::Selection;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

/// File name of the first chapter
pub const INDEX_FILENAME: &str = "index.md";

/// Extension of every generated document
pub const DOCUMENT_EXTENSION: &str = "md";

/// Front-matter chapters, placed first in this order when present
pub const FRONT_MATTER_SLUGS: &[&str] = &["running-the-adventure", "introduction", "credits"];

/// Trailing path segment of the sourcebook URL
///
/// `https://www.dndbeyond.com/sources/dnd/doip/` yields `doip`.
pub fn sourcebook_slug(base_url: &str) -> Result<String, ConvertError> {
    let parsed = Url::parse(base_url)
        .map_err(|e| ConvertError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;

    parsed
        .path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConvertError::InvalidBaseUrl(format!("{}: no path", base_url)))
}

/// Pattern matching chapter links of one sourcebook under both URL schemes
fn chapter_link_pattern(book: &str) -> Result<Regex, ConvertError> {
    let pattern = format!(r"/sources/(?:dnd/)?{}/([a-z0-9-]+)", regex::escape(book));
    Regex::new(&pattern).map_err(|e| ConvertError::InvalidBaseUrl(e.to_string()))
}

/// Discover the chapters linked from an overview page
///
/// Slugs are deduplicated, front-matter slugs come first, the rest follow
/// in lexicographic order. The first chapter is named [`INDEX_FILENAME`],
/// the others get [`chapter_filename`].
pub fn discover_chapters(overview_html: &str, base_url: &str) -> Result<Vec<Chapter>, ConvertError> {
    let book = sourcebook_slug(base_url)?;
    let pattern = chapter_link_pattern(&book)?;

    let doc = dom_query::Document::from(overview_html);
    let mut slugs = BTreeSet::new();
    for node in doc.select("a[href]").nodes() {
        let Some(href) = Selection::from(*node).attr("href") else {
            continue;
        };
        if let Some(captures) = pattern.captures(&href) {
            slugs.insert(captures[1].to_string());
        }
    }
    debug!(book = %book, found = slugs.len(), "Collected chapter slugs");

    Ok(order_chapters(slugs))
}

/// Order slugs and assign file names
pub fn order_chapters(slugs: BTreeSet<String>) -> Vec<Chapter> {
    let front = FRONT_MATTER_SLUGS
        .iter()
        .filter(|s| slugs.contains(**s))
        .map(|s| s.to_string());
    let rest = slugs
        .iter()
        .filter(|s| !FRONT_MATTER_SLUGS.contains(&s.as_str()))
        .cloned();

    front
        .chain(rest)
        .enumerate()
        .map(|(i, slug)| {
            if i == 0 {
                Chapter::new(slug, INDEX_FILENAME)
            } else {
                Chapter::from_slug(slug)
            }
        })
        .collect()
}

/// Document file name derived from a slug
///
/// `running-the-adventure` becomes `Running The Adventure.md`.
pub fn chapter_filename(slug: &str) -> String {
    format!("{}.{}", title_case(&slug.replace('-', " ")), DOCUMENT_EXTENSION)
}

/// Upper-case letters that follow a non-letter, lower-case the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.dndbeyond.com/sources/dnd/doip";

    fn overview(hrefs: &[&str]) -> String {
        let links: String = hrefs
            .iter()
            .map(|h| format!(r#"<li><a href="{}">link</a></li>"#, h))
            .collect();
        format!("<html><body><ul>{}</ul></body></html>", links)
    }

    fn slugs(chapters: &[Chapter]) -> Vec<&str> {
        chapters.iter().map(|c| c.slug.as_str()).collect()
    }

    #[test]
    fn test_sourcebook_slug() {
        assert_eq!(sourcebook_slug(BASE).unwrap(), "doip");
        assert_eq!(
            sourcebook_slug("https://www.dndbeyond.com/sources/doip/").unwrap(),
            "doip"
        );
        assert!(sourcebook_slug("https://www.dndbeyond.com/").is_err());
        assert!(sourcebook_slug("not a url").is_err());
    }

    #[test]
    fn test_introduction_becomes_index() {
        let html = overview(&["/sources/dnd/doip/gnomengarde", "/sources/dnd/doip/introduction"]);
        let chapters = discover_chapters(&html, BASE).unwrap();
        assert_eq!(
            chapters,
            vec![
                Chapter::new("introduction", "index.md"),
                Chapter::new("gnomengarde", "Gnomengarde.md"),
            ]
        );
    }

    #[test]
    fn test_both_url_schemes_and_duplicates() {
        let html = overview(&[
            "/sources/doip/dragons-barrow",
            "https://www.dndbeyond.com/sources/dnd/doip/dragons-barrow#Top",
            "/sources/dnd/doip/dragons-barrow",
            "/sources/dnd/doip/axeholm",
        ]);
        let chapters = discover_chapters(&html, BASE).unwrap();
        assert_eq!(slugs(&chapters), vec!["axeholm", "dragons-barrow"]);
        assert_eq!(chapters[1].filename, "Dragons Barrow.md");
    }

    #[test]
    fn test_front_matter_order() {
        let html = overview(&[
            "/sources/dnd/doip/woodland-manse",
            "/sources/dnd/doip/credits",
            "/sources/dnd/doip/axeholm",
            "/sources/dnd/doip/running-the-adventure",
            "/sources/dnd/doip/introduction",
        ]);
        let chapters = discover_chapters(&html, BASE).unwrap();
        assert_eq!(
            slugs(&chapters),
            vec![
                "running-the-adventure",
                "introduction",
                "credits",
                "axeholm",
                "woodland-manse"
            ]
        );
        assert_eq!(chapters[0].filename, "index.md");
        assert_eq!(chapters[1].filename, "Introduction.md");
        assert_eq!(chapters[2].filename, "Credits.md");
    }

    #[test]
    fn test_ignores_other_books_and_uppercase() {
        let html = overview(&[
            "/sources/dnd/phb-2024/spells",
            "/sources/dnd/doipx/chapter",
            "/sources/dnd/doip",
            "/sources/dnd/doip/Upper",
            "/monsters/goblin",
        ]);
        let chapters = discover_chapters(&html, BASE).unwrap();
        assert!(chapters.is_empty());
    }

    #[test]
    fn test_book_slug_is_escaped() {
        let base = "https://www.dndbeyond.com/sources/dnd/a.b";
        let html = overview(&["/sources/dnd/axb/wrong", "/sources/dnd/a.b/right"]);
        let chapters = discover_chapters(&html, base).unwrap();
        assert_eq!(slugs(&chapters), vec!["right"]);
    }

    #[test]
    fn test_chapter_filename() {
        assert_eq!(chapter_filename("gnomengarde"), "Gnomengarde.md");
        assert_eq!(
            chapter_filename("running-the-adventure"),
            "Running The Adventure.md"
        );
        assert_eq!(
            chapter_filename("chapter-1-goblin-arrows"),
            "Chapter 1 Goblin Arrows.md"
        );
    }

    #[test]
    fn test_title_case_matches_python_semantics() {
        assert_eq!(title_case("x2b and c3po"), "X2B And C3Po");
        assert_eq!(title_case("ALREADY upper"), "Already Upper");
    }
}

//! Content Extractor
//!
//! Locates the article container in a sourcebook page and strips the
//! elements that carry no content.

use dom_query::{Document, Selection};
use tracing::debug;

/// Selector for the article content container
pub const CONTENT_SELECTOR: &str = "div.p-article-content";

/// Elements hidden with an inline style
const HIDDEN_SELECTOR: &str = r#"[style*="display:none"], [style*="display: none"]"#;

/// Anchors that only show a rules tooltip on hover
const TOOLTIP_SELECTOR: &str = "a.tooltip-hover";

/// Decorative anchors hidden from assistive technology
const ARIA_HIDDEN_SELECTOR: &str = r#"a[aria-hidden="true"]"#;

/// Article content detached from the page it came from
///
/// Owns its own document tree, so cleaning and image rewriting never touch
/// the original page.
pub struct ArticleContent {
    doc: Document,
}

/// Find the content container in `html`
///
/// Returns `None` when the page has no container.
pub fn extract(html: &str) -> Option<ArticleContent> {
    let page = Document::from(html);
    let container = page.select(CONTENT_SELECTOR).first();
    if !container.exists() {
        debug!(selector = CONTENT_SELECTOR, "Article content container missing");
        return None;
    }

    Some(ArticleContent {
        doc: Document::from(container.html().to_string()),
    })
}

impl ArticleContent {
    /// Strip non-content elements
    ///
    /// Passes run in a fixed order, each on the tree left by the previous one:
    /// 1. elements hidden by inline style are removed
    /// 2. tooltip anchors are replaced by their text
    /// 3. ARIA-hidden anchors are removed
    pub fn clean(self) -> Self {
        let container = self.container();

        container.select(HIDDEN_SELECTOR).remove();

        for node in container.select(TOOLTIP_SELECTOR).nodes() {
            let anchor = Selection::from(*node);
            let text = anchor.text();
            if text.is_empty() {
                anchor.remove();
            } else {
                anchor.replace_with_html(escape_text(&text));
            }
        }

        container.select(ARIA_HIDDEN_SELECTOR).remove();

        self
    }

    /// The container element
    pub fn container(&self) -> Selection<'_> {
        self.doc.select(CONTENT_SELECTOR).first()
    }

    /// Serialized container, including its own tag
    pub fn html(&self) -> String {
        self.container().html().to_string()
    }
}

/// Escape text so it parses back as a single text node
fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

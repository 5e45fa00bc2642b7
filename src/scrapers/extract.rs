//! Markup helpers shared by the per-source extractors.
//!
//! The body fallback chain lives here. Upstream markup is inconsistent, so the
//! body is taken from the first of these that applies:
//!
//! 1. a `div` directly inside the content container: its first text
//! 2. the first `p` that contains `span`s: the first text of each outermost
//!    span, joined with a single space (the crawler this replaces used no
//!    separator, which fused words)
//! 3. the first `p`: its first text
//!
//! If none applies the body is empty.

use crate::error::StructuralError;
use crate::models::{RawNode, Source};
use crate::utils::clean_text;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());

/// First non-blank text node under `element`, cleaned.
pub fn first_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(clean_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Apply the body fallback chain to a content container.
pub fn body_text(content: ElementRef<'_>) -> String {
    let nested = content
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "div");
    if let Some(nested) = nested {
        return first_text(nested);
    }

    let paragraphs: Vec<ElementRef<'_>> = content.select(&PARAGRAPH).collect();
    for paragraph in &paragraphs {
        let spans: Vec<ElementRef<'_>> = paragraph
            .select(&SPAN)
            .filter(|span| is_outermost_span(*span, *paragraph))
            .collect();
        if !spans.is_empty() {
            return spans
                .into_iter()
                .map(first_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    paragraphs.first().map(|p| first_text(*p)).unwrap_or_default()
}

/// A span with no other `span` between it and `paragraph`.
fn is_outermost_span(span: ElementRef<'_>, paragraph: ElementRef<'_>) -> bool {
    !span
        .ancestors()
        .take_while(|node| *node != *paragraph)
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "span")
}

/// Resolve an href against the source base. Blank hrefs resolve to nothing.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// Locate the listing container in `html` and split it into entry nodes.
pub fn split_listing(
    html: &str,
    source: Source,
    container: &Selector,
    container_name: &'static str,
    entry: &Selector,
) -> Result<Vec<RawNode>, StructuralError> {
    let document = Html::parse_document(html);
    let listing = document
        .select(container)
        .next()
        .ok_or(StructuralError::MissingListing {
            selector: container_name,
        })?;

    Ok(listing
        .select(entry)
        .map(|e| RawNode {
            source,
            html: e.html(),
        })
        .collect())
}

//! Local politics coverage ([newsmaker.md](https://newsmaker.md/ro/politica/)).
//!
//! Entries are `article` elements inside `div.evo-post-wrap`. Links are
//! usually absolute already; relative ones resolve against the configured base.

use super::Extractor;
use super::extract::{body_text, first_text, resolve_link, split_listing};
use crate::error::StructuralError;
use crate::models::{Article, RawNode, Source};
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

const LISTING_SELECTOR: &str = "div.evo-post-wrap";

static LISTING: Lazy<Selector> = Lazy::new(|| Selector::parse(LISTING_SELECTOR).unwrap());
static ENTRY: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".evo-entry-title a[href]").unwrap());
static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("div.evo-entry-content").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExtractor;

impl Extractor for LocalExtractor {
    fn source(&self) -> Source {
        Source::Local
    }

    fn listing(&self, html: &str) -> Result<Vec<RawNode>, StructuralError> {
        split_listing(html, self.source(), &LISTING, LISTING_SELECTOR, &ENTRY)
    }

    fn extract(&self, node: &RawNode, base: &Url) -> Result<Article, StructuralError> {
        let fragment = Html::parse_fragment(&node.html);
        let anchor = fragment.select(&TITLE_LINK).next();

        let link = anchor
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_link(base, href))
            .ok_or(StructuralError::MissingLink)?;
        let title = anchor.map(first_text).unwrap_or_default();
        let body = fragment
            .select(&CONTENT)
            .next()
            .map(body_text)
            .unwrap_or_default();

        Ok(Article {
            title,
            body,
            link,
            source: self.source(),
            fetched_at: Utc::now(),
            topics: Vec::new(),
        })
    }
}

//! Government press releases ([gov.md](https://gov.md/ro/comunicate-presa)).
//!
//! Entries are `div.views-row` blocks inside `div.unformatted-list`. Article
//! links are site-relative and get resolved against `https://gov.md`.

use super::Extractor;
use super::extract::{body_text, first_text, resolve_link, split_listing};
use crate::error::StructuralError;
use crate::models::{Article, RawNode, Source};
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

const LISTING_SELECTOR: &str = "div.unformatted-list";

static LISTING: Lazy<Selector> = Lazy::new(|| Selector::parse(LISTING_SELECTOR).unwrap());
static ENTRY: Lazy<Selector> = Lazy::new(|| Selector::parse("div.views-row").unwrap());
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.views-field-title span.field-content a[href]").unwrap()
});
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.views-field-body div.field-content").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct GovExtractor;

impl Extractor for GovExtractor {
    fn source(&self) -> Source {
        Source::Gov
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

        Ok(Article {
            title: anchor.map(first_text).unwrap_or_default(),
            body: fragment
                .select(&CONTENT)
                .next()
                .map(body_text)
                .unwrap_or_default(),
            link,
            source: self.source(),
            fetched_at: Utc::now(),
            topics: Vec::new(),
        })
    }
}

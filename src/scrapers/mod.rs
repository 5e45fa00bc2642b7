//! News source scrapers.
//!
//! Each source is read in two phases:
//!
//! 1. **Listing**: fetch the source's listing page and split it into one
//!    [`RawNode`] per entry ([`SourceFetcher`], [`Extractor::listing`])
//! 2. **Extraction**: turn each node into an [`Article`] ([`Extractor::extract`])
//!
//! # Supported Sources
//!
//! | Source | Module | Listing | Notes |
//! |--------|--------|---------|-------|
//! | gov.md | [`gov`] | `div.unformatted-list > div.views-row` | Press releases, relative links |
//! | newsmaker.md | [`local`] | `div.evo-post-wrap article` | Politics section, absolute links |
//!
//! A source whose page cannot be fetched, or whose listing container is
//! missing, contributes zero articles. Neither case aborts the run.

pub mod extract;
pub mod gov;
pub mod local;

use crate::config::SourceConfig;
use crate::error::{FetchError, StructuralError};
use crate::models::{Article, RawNode, Source};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use url::Url;

/// Per-source page structure knowledge.
pub trait Extractor: Sync {
    fn source(&self) -> Source;

    /// Split a listing page into its entries, in page order.
    ///
    /// Fails only when the listing container itself is absent.
    fn listing(&self, html: &str) -> Result<Vec<RawNode>, StructuralError>;

    /// Build an article from one entry. Missing optional parts become empty
    /// strings; a missing link is an error since links must be absolute.
    fn extract(&self, node: &RawNode, base: &Url) -> Result<Article, StructuralError>;
}

impl Source {
    /// The extractor variant for this source's markup.
    pub fn extractor(&self) -> &'static dyn Extractor {
        match self {
            Source::Gov => &gov::GovExtractor,
            Source::Local => &local::LocalExtractor,
        }
    }
}

/// Retrieves the raw entries of one source.
///
/// Implementations never fail: problems are logged and yield an empty list.
pub trait SourceFetcher {
    async fn fetch(&self, source: &SourceConfig) -> Vec<RawNode>;
}

/// Fetches listing pages over HTTP with a fixed header set and timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(headers: &BTreeMap<String, String>, timeout: Duration) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| FetchError::Header {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| FetchError::Header {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            default_headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// GET a listing page; anything but 200 is a failure.
    pub async fn fetch_listing(&self, url: &str) -> Result<String, FetchError> {
        let network = |source: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(network)
    }
}

impl SourceFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(source = %source.kind, url = %source.url))]
    async fn fetch(&self, source: &SourceConfig) -> Vec<RawNode> {
        let t0 = Instant::now();
        let html = match self.fetch_listing(&source.url).await {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, "Listing fetch failed; source contributes no articles");
                return Vec::new();
            }
        };
        debug!(bytes = html.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched listing");

        match source.kind.extractor().listing(&html) {
            Ok(nodes) => {
                info!(count = nodes.len(), "Indexed listing entries");
                nodes
            }
            Err(e) => {
                error!(error = %e, "Listing layout not recognized; source contributes no articles");
                Vec::new()
            }
        }
    }
}

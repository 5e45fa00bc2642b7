//! One crawl cycle: fetch → extract → classify → aggregate → dispatch.
//!
//! Sources are fetched and extracted one after another in config order.
//! Classification is the only fan-out. The batch reaches the sink only if the
//! run was not cancelled before aggregation finished.

use crate::aggregator::aggregate;
use crate::classifier::Classifier;
use crate::config::{PipelineConfig, SourceConfig};
use crate::error::PipelineError;
use crate::models::{Article, Batch, RawNode, Source};
use crate::orchestrator::classify_all;
use crate::outputs::{Sink, dispatch};
use crate::scrapers::{Extractor, SourceFetcher};
use chrono::Utc;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use url::Url;

const DISPATCH_BASE_DELAY: Duration = Duration::from_secs(1);

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Articles extracted per source, before deduplication.
    pub per_source: Vec<(Source, usize)>,
    /// Articles in the dispatched batch.
    pub dispatched: usize,
    /// Dispatched articles with at least one topic.
    pub tagged: usize,
    pub sink: &'static str,
}

pub struct Pipeline<F, C, S> {
    config: PipelineConfig,
    fetcher: F,
    classifier: C,
    sink: S,
}

impl<F, C, S> Pipeline<F, C, S>
where
    F: SourceFetcher,
    C: Classifier,
    S: Sink,
{
    pub fn new(config: PipelineConfig, fetcher: F, classifier: C, sink: S) -> Self {
        Self {
            config,
            fetcher,
            classifier,
            sink,
        }
    }

    /// Run to completion, aborting without dispatch if `shutdown` resolves
    /// before the batch is assembled.
    pub async fn run_until<Fut>(&self, shutdown: Fut) -> Result<RunReport, PipelineError>
    where
        Fut: Future<Output = ()>,
    {
        let batch = tokio::select! {
            batch = self.assemble() => batch,
            _ = shutdown => {
                warn!("Shutdown requested; abandoning in-flight work, nothing dispatched");
                return Err(PipelineError::Cancelled);
            }
        };
        self.deliver(batch).await
    }

    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let batch = self.assemble().await;
        self.deliver(batch).await
    }

    /// Fetch, extract, classify and aggregate every configured source.
    #[instrument(level = "info", skip_all, fields(sources = self.config.sources.len()))]
    pub async fn assemble(&self) -> Batch {
        let t0 = Instant::now();
        let mut per_source: Vec<Vec<Article>> = Vec::with_capacity(self.config.sources.len());

        for source in &self.config.sources {
            let nodes = self.fetcher.fetch(source).await;
            let articles = extract_source(source, &nodes);
            info!(source = %source.kind, nodes = nodes.len(), articles = articles.len(), "Extracted source");
            per_source.push(articles);
        }

        let counts: Vec<usize> = per_source.iter().map(Vec::len).collect();
        let all: Vec<Article> = per_source.into_iter().flatten().collect();
        info!(count = all.len(), "Total articles to classify");

        let classified = classify_all(
            &self.classifier,
            all,
            &self.config.taxonomy(),
            self.config.concurrency,
            self.config.classify_timeout(),
        )
        .await;

        let mut classified = classified.into_iter();
        let regrouped: Vec<Vec<Article>> = counts
            .iter()
            .map(|&n| classified.by_ref().take(n).collect())
            .collect();

        let batch = aggregate(regrouped, Utc::now());
        info!(
            count = batch.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Batch assembled"
        );
        batch
    }

    async fn deliver(&self, batch: Batch) -> Result<RunReport, PipelineError> {
        if batch.is_empty() {
            warn!("No articles survived extraction; dispatching an empty batch");
        }
        let mut per_source: Vec<(Source, usize)> = Vec::new();
        for source in &self.config.sources {
            if !per_source.iter().any(|(s, _)| *s == source.kind) {
                per_source.push((source.kind, batch.from_source(source.kind).count()));
            }
        }

        dispatch(
            &self.sink,
            &batch,
            self.config.dispatch_retries,
            DISPATCH_BASE_DELAY,
        )
        .await?;

        Ok(RunReport {
            per_source,
            dispatched: batch.len(),
            tagged: batch.articles.iter().filter(|a| !a.topics.is_empty()).count(),
            sink: self.sink.name(),
        })
    }
}

/// Extract every node of one source; nodes that cannot become an article are skipped.
fn extract_source(source: &SourceConfig, nodes: &[RawNode]) -> Vec<Article> {
    let base = match Url::parse(&source.base_url) {
        Ok(base) => base,
        Err(e) => {
            error!(source = %source.kind, base_url = %source.base_url, error = %e, "Invalid base URL; skipping source");
            return Vec::new();
        }
    };
    let extractor = source.kind.extractor();

    nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| match extractor.extract(node, &base) {
            Ok(article) => Some(article),
            Err(e) => {
                warn!(source = %source.kind, index, error = %e, "Skipping listing entry");
                None
            }
        })
        .collect()
}

//! # MD News Crawler
//!
//! Crawls Moldovan news listings (gov.md press releases and the newsmaker.md
//! politics section), tags every article with topics from a fixed taxonomy
//! using an LLM, and delivers the batch to an ingestion API or a RabbitMQ
//! queue.
//!
//! ## Usage
//!
//! ```sh
//! API_ADDRESS=https://ingest.example.org/posts API_SECRET=... md_news_crawler
//! ```
//!
//! ## Architecture
//!
//! Each invocation runs one cycle:
//! 1. **Fetching**: download each source's listing page (sequentially)
//! 2. **Extraction**: normalize every listing entry into an `Article`
//! 3. **Classification**: ask the LLM for topics (parallel, 12 at a time by default)
//! 4. **Aggregation**: merge sources and drop duplicate links
//! 5. **Dispatch**: deliver the batch to the configured sink
//!
//! A failing source or classification call only shrinks or untags the batch.
//! A failed dispatch, or Ctrl-C before the batch is assembled, fails the run.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod api;
mod classifier;
mod cli;
mod config;
mod error;
mod models;
mod orchestrator;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use api::{AwfulAsk, RetryAsk};
use classifier::CompletionClassifier;
use cli::Cli;
use config::PipelineConfig;
use outputs::ConfiguredSink;
use pipeline::Pipeline;
use scrapers::HttpFetcher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("md_news_crawler starting up");

    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env");
    }
    let args = Cli::parse();
    debug!(?args.config, ?args.sink, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = PipelineConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration rejected");
        return Err(e.into());
    }
    info!(
        sources = config.sources.len(),
        topics = config.taxonomy().len(),
        concurrency = config.concurrency,
        sink = ?config.sink.mode,
        schema = ?config.schema,
        "Configuration ready"
    );

    // ---- Stages ----
    let fetcher = HttpFetcher::new(&config.headers, config.fetch_timeout())?;
    let ask = AwfulAsk::load(args.aj_config.as_deref(), &args.template).await?;
    let classifier = CompletionClassifier::new(RetryAsk::new(
        ask,
        config.classify_retries,
        Duration::from_secs(1),
    ));
    let sink = ConfiguredSink::from_config(&config)?;
    let pipeline = Pipeline::new(config, fetcher, classifier, sink);

    // ---- Run ----
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal support: never cancel.
            std::future::pending::<()>().await;
        }
    };

    let elapsed = || start_time.elapsed();
    match pipeline.run_until(shutdown).await {
        Ok(report) => {
            info!(
                dispatched = report.dispatched,
                tagged = report.tagged,
                per_source = ?report.per_source,
                sink = report.sink,
                secs = elapsed().as_secs(),
                millis = elapsed().subsec_millis(),
                "Run succeeded"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                error = %e,
                secs = elapsed().as_secs(),
                millis = elapsed().subsec_millis(),
                "Run failed"
            );
            Err(e.into())
        }
    }
}

//! Command-line interface definitions.
//!
//! Every flag overrides the matching field of the YAML config (or the
//! built-in defaults when no file is given). Sink credentials usually come
//! from the environment or a `.env` file.

use crate::config::{OutputSchema, PipelineConfig, PublishGranularity, SinkMode};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkArg {
    Queue,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaArg {
    Posts,
    BySource,
}

/// Command-line arguments for one crawl run.
///
/// # Examples
///
/// ```sh
/// # POST to the ingestion API configured in .env
/// md_news_crawler
///
/// # Publish one message per article to RabbitMQ
/// md_news_crawler --sink queue --amqp-url amqp://localhost:5672/%2f --per-article
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML pipeline config
    #[arg(short, long, env = "CRAWLER_CONFIG")]
    pub config: Option<String>,

    /// Path to the completion client config.yaml (defaults to the awful_aj config dir)
    #[arg(long, env = "AJ_CONFIG")]
    pub aj_config: Option<String>,

    /// Chat template used for topic classification
    #[arg(long, default_value = "topic_classifier")]
    pub template: String,

    /// Where to deliver the batch
    #[arg(long, value_enum)]
    pub sink: Option<SinkArg>,

    /// Ingestion endpoint for the http sink
    #[arg(long, env = "API_ADDRESS")]
    pub api_address: Option<String>,

    /// Shared secret sent with every http dispatch
    #[arg(long, env = "API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// AMQP URL for the queue sink
    #[arg(long, env = "AMQP_URL")]
    pub amqp_url: Option<String>,

    /// Queue name for the queue sink
    #[arg(long)]
    pub queue: Option<String>,

    /// Publish one queue message per article instead of one per run
    #[arg(long)]
    pub per_article: bool,

    /// Output payload shape
    #[arg(long, value_enum)]
    pub schema: Option<SchemaArg>,

    /// Maximum simultaneous classification calls
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Extra dispatch attempts on transient sink failures
    #[arg(long)]
    pub dispatch_retries: Option<usize>,
}

impl Cli {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(sink) = self.sink {
            config.sink.mode = match sink {
                SinkArg::Queue => SinkMode::Queue,
                SinkArg::Http => SinkMode::Http,
            };
        }
        if let Some(endpoint) = &self.api_address {
            config.sink.http.endpoint = Some(endpoint.clone());
        }
        if let Some(secret) = &self.api_secret {
            config.sink.http.secret = Some(secret.clone());
        }
        if let Some(url) = &self.amqp_url {
            config.sink.queue.amqp_url = url.clone();
        }
        if let Some(queue) = &self.queue {
            config.sink.queue.queue = queue.clone();
        }
        if self.per_article {
            config.sink.queue.publish = PublishGranularity::Article;
        }
        if let Some(schema) = self.schema {
            config.schema = match schema {
                SchemaArg::Posts => OutputSchema::Posts,
                SchemaArg::BySource => OutputSchema::BySource,
            };
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(n) = self.dispatch_retries {
            config.dispatch_retries = n;
        }
    }
}

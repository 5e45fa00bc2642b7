//! Pipeline configuration.
//!
//! Built-in defaults reproduce the production crawl (gov.md press releases and
//! the newsmaker.md politics listing, Romanian taxonomy, 12 workers). An
//! optional YAML file overlays them and CLI flags override both (see
//! [`crate::cli::Cli::apply`]).
//!
//! ```yaml
//! concurrency: 8
//! taxonomy: [Alegeri, Economie]
//! schema: by_source
//! sink:
//!   mode: http
//!   http:
//!     endpoint: https://ingest.example.org/posts
//!     secret: example
//! ```

use crate::error::ConfigError;
use crate::models::{Source, TopicTaxonomy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sources in crawl order. This order is also the batch order.
    pub sources: Vec<SourceConfig>,
    /// Headers sent with every listing request.
    pub headers: BTreeMap<String, String>,
    pub taxonomy: Vec<String>,
    /// Maximum simultaneous classification calls.
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub classify_timeout_secs: u64,
    /// Extra completion attempts inside one classification timeout.
    pub classify_retries: usize,
    /// Extra dispatch attempts. Zero means a failed dispatch fails the run.
    pub dispatch_retries: usize,
    pub schema: OutputSchema,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    pub kind: Source,
    /// Listing page to fetch.
    pub url: String,
    /// Base relative article links are resolved against.
    pub base_url: String,
}

/// JSON shape of the dispatched batch. The two are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSchema {
    /// `{"schema_version": 1, "created_at": ..., "posts": [...]}`
    #[default]
    Posts,
    /// `{"schema_version": 1, "created_at": ..., "gov": [...], "local": [...]}`
    BySource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkMode {
    Queue,
    #[default]
    Http,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    pub mode: SinkMode,
    pub http: HttpSinkConfig,
    pub queue: QueueSinkConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSinkConfig {
    pub endpoint: Option<String>,
    pub secret_header: String,
    pub secret: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            secret_header: "X-Password".to_string(),
            secret: None,
            timeout_secs: 30,
        }
    }
}

/// How many messages one run publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishGranularity {
    /// One message holding the whole batch.
    #[default]
    Run,
    /// One message per article.
    Article,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueSinkConfig {
    pub amqp_url: String,
    pub queue: String,
    pub publish: PublishGranularity,
    /// Bound on connecting, declaring and publishing.
    pub timeout_secs: u64,
}

impl Default for QueueSinkConfig {
    fn default() -> Self {
        Self {
            amqp_url: "amqp://127.0.0.1:5672/%2f".to_string(),
            queue: "crawl".to_string(),
            publish: PublishGranularity::Run,
            timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let headers = BTreeMap::from([
            (
                "User-Agent".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:60.0) Gecko/20100101 Firefox/60.0"
                    .to_string(),
            ),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
        ]);

        Self {
            sources: vec![
                SourceConfig {
                    kind: Source::Gov,
                    url: "https://gov.md/ro/comunicate-presa".to_string(),
                    base_url: "https://gov.md".to_string(),
                },
                SourceConfig {
                    kind: Source::Local,
                    url: "https://newsmaker.md/ro/politica/".to_string(),
                    base_url: "https://newsmaker.md".to_string(),
                },
            ],
            headers,
            taxonomy: ["Alegeri", "Economie", "Societate", "Demonstratii", "Politica"]
                .into_iter()
                .map(String::from)
                .collect(),
            concurrency: 12,
            fetch_timeout_secs: 20,
            classify_timeout_secs: 30,
            classify_retries: 1,
            dispatch_retries: 0,
            schema: OutputSchema::Posts,
            sink: SinkConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load defaults, overlaid with the YAML file at `path` if one is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(path, sources = config.sources.len(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Check cross-field constraints after all overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        for (field, secs) in [
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("classify_timeout_secs", self.classify_timeout_secs),
            ("sink.http.timeout_secs", self.sink.http.timeout_secs),
            ("sink.queue.timeout_secs", self.sink.queue.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be at least 1")));
            }
        }
        if self.taxonomy().is_empty() {
            return Err(ConfigError::Invalid("taxonomy must name at least one topic".into()));
        }
        for source in &self.sources {
            for (field, value) in [("url", &source.url), ("base_url", &source.base_url)] {
                Url::parse(value).map_err(|e| {
                    ConfigError::Invalid(format!("source {} {field} `{value}`: {e}", source.kind))
                })?;
            }
        }
        if self.sink.mode == SinkMode::Http {
            let endpoint = self.sink.http.endpoint.as_deref().ok_or_else(|| {
                ConfigError::Invalid("http sink requires an endpoint (API_ADDRESS)".into())
            })?;
            Url::parse(endpoint)
                .map_err(|e| ConfigError::Invalid(format!("http endpoint `{endpoint}`: {e}")))?;
            if self.sink.http.secret.is_none() {
                return Err(ConfigError::Invalid(
                    "http sink requires a shared secret (API_SECRET)".into(),
                ));
            }
        }
        if self.sink.mode == SinkMode::Queue && self.sink.queue.queue.trim().is_empty() {
            return Err(ConfigError::Invalid("queue name must not be empty".into()));
        }
        Ok(())
    }

    pub fn taxonomy(&self) -> TopicTaxonomy {
        TopicTaxonomy::new(self.taxonomy.iter().cloned())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classify_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_ready() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.sink.http.endpoint = Some("http://127.0.0.1:9000/posts".to_string());
        config.sink.http.secret = Some("secret".to_string());
        config
    }

    #[test]
    fn test_defaults_match_production_crawl() {
        let config = PipelineConfig::default();
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, Source::Gov);
        assert_eq!(config.sink.queue.queue, "crawl");
        assert_eq!(config.sink.http.secret_header, "X-Password");
        assert_eq!(config.taxonomy().len(), 5);
        assert!(config.headers.contains_key("User-Agent"));
    }

    #[test]
    fn test_yaml_overlay_keeps_unset_defaults() {
        let raw = r#"
concurrency: 4
taxonomy: [Economy, Politics]
schema: by_source
sink:
  mode: queue
  queue:
    queue: news
    publish: article
"#;
        let config = PipelineConfig::from_yaml(raw).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.schema, OutputSchema::BySource);
        assert_eq!(config.sink.mode, SinkMode::Queue);
        assert_eq!(config.sink.queue.queue, "news");
        assert_eq!(config.sink.queue.publish, PublishGranularity::Article);
        assert_eq!(config.sink.queue.amqp_url, "amqp://127.0.0.1:5672/%2f");
        assert_eq!(config.sources.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_mode_requires_endpoint_and_secret() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_err());

        config.sink.http.endpoint = Some("http://127.0.0.1:9000/posts".to_string());
        assert!(config.validate().is_err());

        config.sink.http.secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = http_ready();
        config.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = http_ready();
        config.classify_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("classify_timeout_secs"));

        let mut config = http_ready();
        config.fetch_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = http_ready();
        config.sink.queue.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_source_url_rejected() {
        let mut config = http_ready();
        config.sources[1].base_url = "/ro/politica".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_config_file_is_read_error() {
        let err = PipelineConfig::load(Some("/nonexistent/crawler.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}

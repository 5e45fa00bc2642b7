//! Batch delivery to the downstream sink.
//!
//! # Submodules
//!
//! - [`json`]: serializes a `Batch` in the configured output schema
//! - [`http`]: POSTs the batch to an ingestion endpoint
//! - [`queue`]: publishes the batch to an AMQP queue
//!
//! Sinks never retry on their own. [`dispatch`] adds a bounded number of
//! extra attempts on top when `dispatch_retries` is set.

pub mod http;
pub mod json;
pub mod queue;

use crate::config::{PipelineConfig, SinkMode};
use crate::error::{ConfigError, DispatchError};
use crate::models::Batch;
use crate::utils::backoff_delay;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

pub use http::HttpSink;
pub use queue::QueueSink;

/// A destination for a finished batch.
pub trait Sink {
    fn name(&self) -> &'static str;

    async fn deliver(&self, batch: &Batch) -> Result<(), DispatchError>;
}

/// The sink chosen by `sink.mode`.
#[derive(Debug, Clone)]
pub enum ConfiguredSink {
    Http(HttpSink),
    Queue(QueueSink),
}

impl ConfiguredSink {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(match config.sink.mode {
            SinkMode::Http => Self::Http(HttpSink::new(&config.sink.http, config.schema)?),
            SinkMode::Queue => Self::Queue(QueueSink::new(&config.sink.queue, config.schema)),
        })
    }
}

impl Sink for ConfiguredSink {
    fn name(&self) -> &'static str {
        match self {
            Self::Http(sink) => sink.name(),
            Self::Queue(sink) => sink.name(),
        }
    }

    async fn deliver(&self, batch: &Batch) -> Result<(), DispatchError> {
        match self {
            Self::Http(sink) => sink.deliver(batch).await,
            Self::Queue(sink) => sink.deliver(batch).await,
        }
    }
}

/// Whether another attempt could succeed.
fn is_transient(e: &DispatchError) -> bool {
    match e {
        DispatchError::Unreachable(_) => true,
        DispatchError::Rejected { status, .. } => *status >= 500 || *status == 429,
        DispatchError::Serialize(_)
        | DispatchError::Unsupported(_)
        | DispatchError::Partial { .. } => false,
    }
}

/// Deliver `batch`, retrying transient failures up to `retries` extra times.
#[instrument(level = "info", skip_all, fields(sink = sink.name(), count = batch.len(), retries = retries))]
pub async fn dispatch<S: Sink>(
    sink: &S,
    batch: &Batch,
    retries: usize,
    base_delay: Duration,
) -> Result<(), DispatchError> {
    let mut attempt = 0usize;
    loop {
        match sink.deliver(batch).await {
            Ok(()) => {
                info!(attempt = attempt + 1, "Batch dispatched");
                return Ok(());
            }
            Err(e) => {
                attempt += 1;
                if attempt > retries || !is_transient(&e) {
                    error!(attempt, error = %e, "Dispatch failed; batch discarded");
                    return Err(e);
                }
                let delay = backoff_delay(base_delay, attempt);
                warn!(attempt, max = retries, ?delay, error = %e, "Dispatch attempt failed; backing off");
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Replays a scripted list of outcomes and records delivered batches.
    pub struct ScriptedSink {
        pub outcomes: Mutex<Vec<Result<(), DispatchError>>>,
        pub delivered: Mutex<Vec<Batch>>,
        pub calls: Mutex<usize>,
    }

    impl ScriptedSink {
        pub fn new(outcomes: Vec<Result<(), DispatchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                delivered: Mutex::new(Vec::new()),
                calls: Mutex::new(0),
            }
        }

        pub fn accepting() -> Self {
            Self::new(Vec::new())
        }

        pub fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Sink for ScriptedSink {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn deliver(&self, batch: &Batch) -> Result<(), DispatchError> {
            *self.calls.lock().unwrap() += 1;
            let mut outcomes = self.outcomes.lock().unwrap();
            let outcome = if outcomes.is_empty() {
                Ok(())
            } else {
                outcomes.remove(0)
            };
            if outcome.is_ok() {
                self.delivered.lock().unwrap().push(batch.clone());
            }
            outcome
        }
    }

    fn rejected(status: u16) -> Result<(), DispatchError> {
        Err(DispatchError::Rejected {
            status,
            body: String::new(),
        })
    }

    fn batch() -> Batch {
        Batch {
            created_at: Utc::now(),
            articles: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_no_retries_fails_on_first_error() {
        let sink = ScriptedSink::new(vec![rejected(500), Ok(())]);
        let err = dispatch(&sink, &batch(), 0, Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { status: 500, .. }));
        assert_eq!(sink.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let sink = ScriptedSink::new(vec![
            rejected(503),
            Err(DispatchError::Unreachable("refused".into())),
            Ok(()),
        ]);
        dispatch(&sink, &batch(), 2, Duration::from_millis(1)).await.unwrap();
        assert_eq!(sink.calls(), 3);
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let sink = ScriptedSink::new(vec![rejected(401), Ok(())]);
        assert!(dispatch(&sink, &batch(), 3, Duration::from_millis(1)).await.is_err());
        assert_eq!(sink.calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_publish_is_not_retried() {
        let sink = ScriptedSink::new(vec![
            Err(DispatchError::Partial {
                published: 1,
                total: 2,
                reason: "channel closed".into(),
            }),
            Ok(()),
        ]);
        let err = dispatch(&sink, &batch(), 3, Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Partial { published: 1, total: 2, .. }));
        assert_eq!(sink.calls(), 1);
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_configured_sink_follows_mode() {
        let mut config = PipelineConfig::default();
        config.sink.mode = SinkMode::Queue;
        assert_eq!(ConfiguredSink::from_config(&config).unwrap().name(), "queue");

        config.sink.mode = SinkMode::Http;
        assert!(ConfiguredSink::from_config(&config).is_err());
        config.sink.http.endpoint = Some("http://127.0.0.1:9000/posts".into());
        config.sink.http.secret = Some("secret".into());
        assert_eq!(ConfiguredSink::from_config(&config).unwrap().name(), "http");
    }
}

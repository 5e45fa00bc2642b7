//! AMQP message queue sink.
//!
//! Declares a named, non-durable queue and publishes to it through the
//! default exchange without waiting for broker acknowledgments. Depending on
//! [`PublishGranularity`] a run publishes one message with the whole batch or
//! one message per article.
//!
//! Connecting, declaring and publishing share one timeout. Once any message
//! has left, a failure is reported as [`DispatchError::Partial`] so the
//! batch is never republished on top of itself.
//!
//! # Feature Flag
//!
//! Publishing needs the `amqp` feature (on by default). Without it the sink
//! still builds but every delivery fails with [`DispatchError::Unsupported`].

use super::Sink;
use super::json::{article_bytes, batch_bytes};
use crate::config::{OutputSchema, PublishGranularity, QueueSinkConfig};
use crate::error::DispatchError;
use crate::models::Batch;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct QueueSink {
    amqp_url: String,
    queue: String,
    publish: PublishGranularity,
    schema: OutputSchema,
    timeout: Duration,
}

impl QueueSink {
    pub fn new(config: &QueueSinkConfig, schema: OutputSchema) -> Self {
        Self {
            amqp_url: config.amqp_url.clone(),
            queue: config.queue.clone(),
            publish: config.publish,
            schema,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// The message bodies one delivery of `batch` publishes.
    pub fn messages(&self, batch: &Batch) -> Result<Vec<Vec<u8>>, DispatchError> {
        let messages = match self.publish {
            PublishGranularity::Run => vec![batch_bytes(batch, self.schema)?],
            PublishGranularity::Article => batch
                .articles
                .iter()
                .map(article_bytes)
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(messages)
    }
}

#[cfg(feature = "amqp")]
impl QueueSink {
    /// Connect, declare the queue and publish `messages` in order, counting
    /// each one that leaves in `published`.
    async fn publish(
        &self,
        messages: &[Vec<u8>],
        published: &mut usize,
    ) -> Result<lapin::Connection, DispatchError> {
        use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
        use lapin::types::FieldTable;
        use lapin::{BasicProperties, Connection, ConnectionProperties};

        let unreachable = |e: lapin::Error| DispatchError::Unreachable(e.to_string());

        let connection = Connection::connect(&self.amqp_url, ConnectionProperties::default())
            .await
            .map_err(unreachable)?;
        let channel = connection.create_channel().await.map_err(unreachable)?;
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(unreachable)?;

        for payload in messages {
            channel
                .basic_publish(
                    "",
                    &self.queue,
                    BasicPublishOptions::default(),
                    payload,
                    BasicProperties::default(),
                )
                .await
                .map_err(unreachable)?;
            *published += 1;
        }
        Ok(connection)
    }
}

/// A failure after `published` messages already left is no longer retryable.
#[cfg(feature = "amqp")]
fn publish_failure(e: DispatchError, published: usize, total: usize) -> DispatchError {
    if published == 0 {
        return e;
    }
    DispatchError::Partial {
        published,
        total,
        reason: e.to_string(),
    }
}

#[cfg(feature = "amqp")]
impl Sink for QueueSink {
    fn name(&self) -> &'static str {
        "queue"
    }

    #[tracing::instrument(level = "info", skip_all, fields(queue = %self.queue, count = batch.len()))]
    async fn deliver(&self, batch: &Batch) -> Result<(), DispatchError> {
        use tokio::time::timeout;
        use tracing::{info, warn};

        let messages = self.messages(batch)?;
        let mut published = 0usize;

        let outcome = timeout(self.timeout, self.publish(&messages, &mut published)).await;
        let connection = match outcome {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Unreachable(format!(
                "AMQP broker did not answer within {:?}",
                self.timeout
            ))),
        }
        .map_err(|e| publish_failure(e, published, messages.len()))?;
        info!(messages = published, "Published batch to queue");

        match timeout(self.timeout, connection.close(200, "OK")).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to close AMQP connection cleanly"),
            Err(_) => warn!("Timed out closing AMQP connection"),
        }
        Ok(())
    }
}

#[cfg(not(feature = "amqp"))]
impl Sink for QueueSink {
    fn name(&self) -> &'static str {
        "queue"
    }

    async fn deliver(&self, _batch: &Batch) -> Result<(), DispatchError> {
        Err(DispatchError::Unsupported(
            "queue sink requires the `amqp` feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::models::fixtures::article;
    use chrono::Utc;
    use serde_json::Value;

    fn batch() -> Batch {
        Batch {
            created_at: Utc::now(),
            articles: vec![
                article(Source::Gov, "https://gov.md/1"),
                article(Source::Local, "https://newsmaker.md/1"),
            ],
        }
    }

    fn sink(publish: PublishGranularity, amqp_url: &str) -> QueueSink {
        QueueSink::new(
            &QueueSinkConfig {
                amqp_url: amqp_url.to_string(),
                queue: "crawl".to_string(),
                publish,
                timeout_secs: 1,
            },
            OutputSchema::BySource,
        )
    }

    #[test]
    fn test_run_granularity_is_one_message() {
        let messages = sink(PublishGranularity::Run, "amqp://127.0.0.1:5672/%2f")
            .messages(&batch())
            .unwrap();
        assert_eq!(messages.len(), 1);
        let value: Value = serde_json::from_slice(&messages[0]).unwrap();
        assert_eq!(value["gov"].as_array().unwrap().len(), 1);
        assert_eq!(value["local"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_article_granularity_is_one_message_each() {
        let messages = sink(PublishGranularity::Article, "amqp://127.0.0.1:5672/%2f")
            .messages(&batch())
            .unwrap();
        assert_eq!(messages.len(), 2);
        let second: Value = serde_json::from_slice(&messages[1]).unwrap();
        assert_eq!(second["link"], "https://newsmaker.md/1");
    }

    #[cfg(feature = "amqp")]
    #[tokio::test]
    async fn test_unreachable_broker_is_dispatch_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = sink(PublishGranularity::Run, &format!("amqp://{addr}/%2f"))
            .deliver(&batch())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unreachable(_)));
    }

    #[cfg(feature = "amqp")]
    #[tokio::test]
    async fn test_silent_broker_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let started = std::time::Instant::now();
        let err = sink(PublishGranularity::Article, &format!("amqp://{addr}/%2f"))
            .deliver(&batch())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unreachable(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[cfg(feature = "amqp")]
    #[test]
    fn test_failure_after_first_message_is_partial() {
        let err = publish_failure(DispatchError::Unreachable("channel closed".into()), 1, 2);
        assert!(matches!(err, DispatchError::Partial { published: 1, total: 2, .. }));

        let err = publish_failure(DispatchError::Unreachable("refused".into()), 0, 2);
        assert!(matches!(err, DispatchError::Unreachable(_)));
    }

    #[cfg(not(feature = "amqp"))]
    #[tokio::test]
    async fn test_queue_unsupported_without_feature() {
        let err = sink(PublishGranularity::Run, "amqp://127.0.0.1:5672/%2f")
            .deliver(&batch())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unsupported(_)));
    }
}

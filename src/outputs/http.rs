//! HTTP ingestion endpoint sink.
//!
//! POSTs the batch as JSON with the shared-secret header. Any non-2xx answer
//! is reported back as [`DispatchError::Rejected`] with the sink's status and
//! a preview of its response body.

use super::Sink;
use super::json::batch_value;
use crate::config::{HttpSinkConfig, OutputSchema};
use crate::error::{ConfigError, DispatchError};
use crate::models::Batch;
use crate::utils::truncate_for_log;
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
    secret_header: HeaderName,
    secret: HeaderValue,
    schema: OutputSchema,
}

impl HttpSink {
    pub fn new(config: &HttpSinkConfig, schema: OutputSchema) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ConfigError::Invalid("http sink requires an endpoint".into()))?;
        let secret = config
            .secret
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("http sink requires a shared secret".into()))?;

        let secret_header = HeaderName::from_bytes(config.secret_header.as_bytes())
            .map_err(|e| ConfigError::Invalid(format!("secret header name: {e}")))?;
        let mut secret = HeaderValue::from_str(secret)
            .map_err(|e| ConfigError::Invalid(format!("secret header value: {e}")))?;
        secret.set_sensitive(true);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            secret_header,
            secret,
            schema,
        })
    }
}

impl Sink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(level = "info", skip_all, fields(endpoint = %self.endpoint, count = batch.len()))]
    async fn deliver(&self, batch: &Batch) -> Result<(), DispatchError> {
        let t0 = Instant::now();
        let payload = batch_value(batch, self.schema)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(self.secret_header.clone(), self.secret.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Batch accepted by ingestion endpoint"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %truncate_for_log(&body, 300), "Ingestion endpoint rejected batch");
        Err(DispatchError::Rejected {
            status: status.as_u16(),
            body: truncate_for_log(&body, 300),
        })
    }
}

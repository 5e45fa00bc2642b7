//! Completion service access with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for one prompt/response exchange
//! - [`AwfulAsk`]: the `awful_aj` OpenAI-compatible client behind [`AskAsync`]
//! - [`RetryAsk`]: decorator that adds bounded retries to any [`AskAsync`]
//!
//! Callers are expected to bound the whole exchange with a timeout; retries
//! happen inside that budget.

use crate::utils::backoff_delay;
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async completion calls.
pub trait AskAsync {
    /// Send a prompt and receive the model's free-text answer.
    async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The first call is not a retry, so `max_retries = 0` means a single attempt.
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64;
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt,
                            elapsed_ms_total,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = backoff_delay(self.base_delay, attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The `awful_aj` completion client.
///
/// The chat template supplies the system prompt and model settings; the text
/// passed to [`AskAsync::ask`] becomes the user message.
#[derive(Debug)]
pub struct AwfulAsk {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl AwfulAsk {
    /// Load the client config (default: `config.yaml` in the `awful_aj`
    /// config dir) and the named chat template.
    #[instrument(level = "info")]
    pub async fn load(config_path: Option<&str>, template_name: &str) -> Result<Self, Box<dyn Error>> {
        let config_path = match config_path {
            Some(path) => path.to_string(),
            None => config_dir()?
                .join("config.yaml")
                .to_str()
                .ok_or("Not a valid config filename")?
                .to_string(),
        };
        let config = config::load_config(&config_path)
            .map_err(|e| format!("failed to load completion config {config_path}: {e}"))?;
        info!(%config_path, "Loaded completion configuration");

        let template = template::load_template(template_name).await?;
        info!(template_name, "Loaded template");

        Ok(Self { config, template })
    }
}

impl AskAsync for AwfulAsk {
    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;

        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
        }
        res
    }
}

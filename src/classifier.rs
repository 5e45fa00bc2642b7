//! Topic classification strategies.
//!
//! [`CompletionClassifier`] asks a completion service which taxonomy topics fit
//! a text and then detects every topic whose literal name appears in the
//! answer. Matching is case-sensitive and ignores position, so
//! "Politica și Economie" detects both `Politica` and `Economie`.

use crate::api::AskAsync;
use crate::error::ClassificationError;
use crate::models::{Topic, TopicTaxonomy};
use crate::utils::truncate_for_log;
use tracing::{debug, instrument};

/// Decides which taxonomy topics describe a text.
pub trait Classifier {
    /// Returned topics must belong to `taxonomy`.
    async fn classify(
        &self,
        text: &str,
        taxonomy: &TopicTaxonomy,
    ) -> Result<Vec<Topic>, ClassificationError>;
}

/// Classifier backed by a free-text completion call.
#[derive(Debug)]
pub struct CompletionClassifier<A> {
    api: A,
}

impl<A: AskAsync> CompletionClassifier<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

impl<A: AskAsync> Classifier for CompletionClassifier<A> {
    #[instrument(level = "debug", skip_all, fields(text_len = text.len()))]
    async fn classify(
        &self,
        text: &str,
        taxonomy: &TopicTaxonomy,
    ) -> Result<Vec<Topic>, ClassificationError> {
        let prompt = build_prompt(text, taxonomy);
        let response = self
            .api
            .ask(&prompt)
            .await
            .map_err(|e| ClassificationError::Completion(e.to_string()))?;
        let topics = match_topics(&response, taxonomy);
        debug!(
            response_preview = %truncate_for_log(&response, 200),
            matched = topics.len(),
            "Classified text"
        );
        Ok(topics)
    }
}

pub fn build_prompt(text: &str, taxonomy: &TopicTaxonomy) -> String {
    format!("Which topics from these {taxonomy} best correspond to the following text: {text}")
}

/// Every taxonomy topic whose name occurs verbatim in `response`, in taxonomy order.
pub fn match_topics(response: &str, taxonomy: &TopicTaxonomy) -> Vec<Topic> {
    taxonomy
        .iter()
        .filter(|topic| response.contains(topic.as_str()))
        .cloned()
        .collect()
}

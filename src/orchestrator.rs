//! Bounded-parallel classification of a run's articles.
//!
//! Every article gets its own classification future; at most `concurrency`
//! of them are in flight at once. A call that fails or outlives its timeout
//! leaves that article with no topics and never holds up the rest. The
//! output always has one entry per input, in input order.

use crate::classifier::Classifier;
use crate::error::ClassificationError;
use crate::models::{Article, TopicTaxonomy};
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

#[instrument(level = "info", skip_all, fields(count = articles.len(), concurrency = concurrency))]
pub async fn classify_all<C: Classifier>(
    classifier: &C,
    articles: Vec<Article>,
    taxonomy: &TopicTaxonomy,
    concurrency: usize,
    call_timeout: Duration,
) -> Vec<Article> {
    let t0 = Instant::now();
    let total = articles.len();

    let mut results: Vec<(usize, Article)> = stream::iter(articles.into_iter().enumerate())
        .map(|(index, mut article)| async move {
            let text = article.classification_text();
            let outcome = match timeout(call_timeout, classifier.classify(&text, taxonomy)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ClassificationError::Timeout(call_timeout)),
            };

            match outcome {
                Ok(topics) => {
                    article.topics = taxonomy.restrict(&topics);
                    debug!(index, link = %article.link, topics = ?article.topics, "Classified article");
                }
                Err(e) => {
                    warn!(index, link = %article.link, error = %e, "Classification failed; keeping article untagged");
                }
            }
            (index, article)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    let articles: Vec<Article> = results.into_iter().map(|(_, article)| article).collect();

    let tagged = articles.iter().filter(|a| !a.topics.is_empty()).count();
    info!(
        total,
        tagged,
        untagged = total - tagged,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Completed parallel classification"
    );
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::{FailingClassifier, FixedClassifier, StalledClassifier};
    use crate::models::fixtures::article;
    use crate::models::{Source, Topic};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn taxonomy() -> TopicTaxonomy {
        TopicTaxonomy::new(["Elections", "Economy", "Society", "Protests", "Politics"])
    }

    fn articles(n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| article(Source::Gov, &format!("https://gov.md/ro/content/{i}")))
            .collect()
    }

    /// Records the peak number of simultaneous calls.
    struct CountingClassifier {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Classifier for CountingClassifier {
        async fn classify(
            &self,
            text: &str,
            _taxonomy: &TopicTaxonomy,
        ) -> Result<Vec<Topic>, ClassificationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // Later links finish first to shuffle completion order.
            let n: u64 = text
                .split('/')
                .last()
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(30 - n.min(29))).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![Topic::new("Society")])
        }
    }

    #[tokio::test]
    async fn test_fixed_topics_are_attached() {
        let classifier = FixedClassifier(vec![Topic::new("Economy")]);
        let out = classify_all(&classifier, articles(3), &taxonomy(), 12, Duration::from_secs(1)).await;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|a| a.topics == vec![Topic::new("Economy")]));
    }

    #[tokio::test]
    async fn test_every_call_timing_out_keeps_all_articles() {
        let out = classify_all(
            &StalledClassifier,
            articles(25),
            &taxonomy(),
            12,
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(out.len(), 25);
        assert!(out.iter().all(|a| a.topics.is_empty()));
    }

    #[tokio::test]
    async fn test_failures_keep_articles_untagged() {
        let out = classify_all(&FailingClassifier, articles(4), &taxonomy(), 2, Duration::from_secs(1)).await;
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|a| a.topics.is_empty()));
    }

    #[tokio::test]
    async fn test_topics_outside_taxonomy_are_dropped() {
        let classifier = FixedClassifier(vec![Topic::new("Weather"), Topic::new("Politics")]);
        let out = classify_all(&classifier, articles(1), &taxonomy(), 1, Duration::from_secs(1)).await;
        assert_eq!(out[0].topics, vec![Topic::new("Politics")]);
        assert!(out[0].topics.iter().all(|t| taxonomy().contains(t)));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_and_input_order() {
        let classifier = CountingClassifier {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let input = articles(10);
        let links: Vec<String> = input.iter().map(|a| a.link.clone()).collect();

        let out = classify_all(&classifier, input, &taxonomy(), 3, Duration::from_secs(5)).await;

        assert!(classifier.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(out.iter().map(|a| a.link.clone()).collect::<Vec<_>>(), links);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let out = classify_all(&FailingClassifier, Vec::new(), &taxonomy(), 12, Duration::from_secs(1)).await;
        assert!(out.is_empty());
    }
}

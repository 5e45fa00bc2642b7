//! Data models shared by every pipeline stage.
//!
//! - [`Article`]: one normalized listing entry, tagged with topics after classification
//! - [`Topic`] / [`TopicTaxonomy`]: the closed label set used for tagging
//! - [`Batch`]: the deduplicated output of one run
//! - [`RawNode`]: an opaque listing fragment handed from a fetcher to its extractor
//!
//! The serialized field names form the canonical output schema. Topics are
//! emitted as bare names, in taxonomy order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version stamped onto every dispatched payload.
pub const SCHEMA_VERSION: u32 = 1;

/// The news sources the crawler knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Government press-release listing (gov.md).
    Gov,
    /// Local outlet politics listing (newsmaker.md).
    Local,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Gov => "gov",
            Source::Local => "local",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single topic label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    #[cfg(test)]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ordered, duplicate-free set of valid topics.
///
/// Empty and repeated names are dropped on construction, so iteration order
/// is the first-seen order of the configured list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicTaxonomy {
    topics: Vec<Topic>,
}

impl TopicTaxonomy {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut topics: Vec<Topic> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() || topics.iter().any(|t| t.as_str() == name) {
                continue;
            }
            topics.push(Topic(name));
        }
        Self { topics }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }

    /// Keep only the given topics that belong to the taxonomy, in taxonomy order.
    pub fn restrict<'a>(&self, found: impl IntoIterator<Item = &'a Topic>) -> Vec<Topic> {
        let found: Vec<&Topic> = found.into_iter().collect();
        self.topics
            .iter()
            .filter(|t| found.contains(t))
            .cloned()
            .collect()
    }
}

impl fmt::Display for TopicTaxonomy {
    /// Renders as `[A, B, C]` for prompt embedding.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.topics.iter().map(Topic::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// One listing entry as the raw HTML of its subtree.
///
/// Only the extractor of the source that produced it knows how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub source: Source,
    pub html: String,
}

/// A normalized news article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    pub title: String,
    pub body: String,
    /// Always absolute.
    pub link: String,
    pub source: Source,
    pub fetched_at: DateTime<Utc>,
    /// Empty until classified.
    pub topics: Vec<Topic>,
}

impl Article {
    /// Text submitted to the classifier.
    pub fn classification_text(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// The aggregated output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Batch {
    pub created_at: DateTime<Utc>,
    pub articles: Vec<Article>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn from_source(&self, source: Source) -> impl Iterator<Item = &Article> {
        self.articles.iter().filter(move |a| a.source == source)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn article(source: Source, link: &str) -> Article {
        Article {
            title: format!("title for {link}"),
            body: "body".to_string(),
            link: link.to_string(),
            source,
            fetched_at: Utc::now(),
            topics: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_drops_duplicates_and_blanks() {
        let taxonomy = TopicTaxonomy::new(["Economy", " ", "Politics", "Economy", " Society "]);
        let names: Vec<&str> = taxonomy.iter().map(Topic::as_str).collect();
        assert_eq!(names, vec!["Economy", "Politics", "Society"]);
    }

    #[test]
    fn test_taxonomy_display() {
        let taxonomy = TopicTaxonomy::new(["Alegeri", "Economie"]);
        assert_eq!(taxonomy.to_string(), "[Alegeri, Economie]");
    }

    #[test]
    fn test_restrict_keeps_taxonomy_order_and_membership() {
        let taxonomy = TopicTaxonomy::new(["Elections", "Economy", "Society"]);
        let found = vec![Topic::new("Society"), Topic::new("Weather"), Topic::new("Elections")];
        let kept = taxonomy.restrict(&found);
        assert_eq!(kept, vec![Topic::new("Elections"), Topic::new("Society")]);
    }

    #[test]
    fn test_article_serialization_uses_bare_topic_names() {
        let mut article = fixtures::article(Source::Gov, "https://gov.md/ro/content/1");
        article.topics = vec![Topic::new("Economie")];
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["source"], "gov");
        assert_eq!(json["topics"], serde_json::json!(["Economie"]));
        assert_eq!(json["link"], "https://gov.md/ro/content/1");
    }

    #[test]
    fn test_classification_text_joins_title_and_body() {
        let mut article = fixtures::article(Source::Local, "https://newsmaker.md/a");
        article.title = "X".to_string();
        article.body = "Y".to_string();
        assert_eq!(article.classification_text(), "X Y");
    }

    #[test]
    fn test_batch_from_source() {
        let batch = Batch {
            created_at: Utc::now(),
            articles: vec![
                fixtures::article(Source::Gov, "https://gov.md/1"),
                fixtures::article(Source::Local, "https://newsmaker.md/1"),
                fixtures::article(Source::Gov, "https://gov.md/2"),
            ],
        };
        assert_eq!(batch.from_source(Source::Gov).count(), 2);
        assert_eq!(batch.from_source(Source::Local).count(), 1);
    }
}

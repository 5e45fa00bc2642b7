//! Merge per-source article lists into one [`Batch`].
//!
//! Articles keep source order, then listing order. An article whose link was
//! already seen earlier in that order is dropped.

use crate::models::{Article, Batch};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use tracing::info;

pub fn aggregate<I>(per_source: I, created_at: DateTime<Utc>) -> Batch
where
    I: IntoIterator<Item = Vec<Article>>,
{
    let merged: Vec<Article> = per_source.into_iter().flatten().collect();
    let before = merged.len();
    let articles = dedupe(merged);

    info!(
        count = articles.len(),
        duplicates = before - articles.len(),
        "Aggregated batch"
    );
    Batch {
        created_at,
        articles,
    }
}

/// Drop later articles that share a link with an earlier one.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    articles
        .into_iter()
        .unique_by(|a| a.link.clone())
        .collect()
}

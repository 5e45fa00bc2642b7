//! JSON serialization of a [`Batch`] for the configured output schema.
//!
//! # Shapes
//!
//! ```text
//! posts:      {"schema_version": 1, "created_at": ..., "posts": [article, ...]}
//! by_source:  {"schema_version": 1, "created_at": ..., "gov": [...], "local": [...]}
//! ```
//!
//! Both keep batch order inside each array.

use crate::config::OutputSchema;
use crate::models::{Article, Batch, SCHEMA_VERSION, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct PostsPayload<'a> {
    schema_version: u32,
    created_at: DateTime<Utc>,
    posts: &'a [Article],
}

#[derive(Serialize)]
struct BySourcePayload<'a> {
    schema_version: u32,
    created_at: DateTime<Utc>,
    gov: Vec<&'a Article>,
    local: Vec<&'a Article>,
}

pub fn batch_value(batch: &Batch, schema: OutputSchema) -> Result<Value, serde_json::Error> {
    match schema {
        OutputSchema::Posts => serde_json::to_value(PostsPayload {
            schema_version: SCHEMA_VERSION,
            created_at: batch.created_at,
            posts: &batch.articles,
        }),
        OutputSchema::BySource => serde_json::to_value(BySourcePayload {
            schema_version: SCHEMA_VERSION,
            created_at: batch.created_at,
            gov: batch.from_source(Source::Gov).collect(),
            local: batch.from_source(Source::Local).collect(),
        }),
    }
}

pub fn batch_bytes(batch: &Batch, schema: OutputSchema) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&batch_value(batch, schema)?)
}

pub fn article_bytes(article: &Article) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(article)
}

//! Error types for each pipeline stage.
//!
//! Only [`DispatchError`], [`ConfigError`] and cancellation end a run. Fetch,
//! structural and classification errors are recovered where they happen and
//! only ever show up in logs.

use thiserror::Error;

/// A listing page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid fetch header {name}: {reason}")]
    Header { name: String, reason: String },
}

/// The page was fetched but does not have the expected listing layout.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("listing container `{selector}` not found")]
    MissingListing { selector: &'static str },
    #[error("entry has no resolvable link")]
    MissingLink,
}

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("completion call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("completion call failed: {0}")]
    Completion(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sink unreachable: {0}")]
    Unreachable(String),
    #[error("sink rejected payload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("sink not available in this build: {0}")]
    Unsupported(&'static str),
    /// Some messages already left; resending would duplicate them.
    #[error("publish stopped after {published} of {total} messages: {reason}")]
    Partial {
        published: usize,
        total: usize,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Terminal outcome of a failed run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("run cancelled before dispatch")]
    Cancelled,
}

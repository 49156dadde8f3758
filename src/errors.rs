use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Link, Topic};

/// Error type for taxonomy access, sampling budgets, and persistence failures.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// A topic produced by traversal has no node or no stable id in the taxonomy.
    #[error("topic '{topic}' not found in taxonomy: {details}")]
    TopicNotFound { topic: Topic, details: String },
    /// The requested quota exceeds what the taxonomy (or the pools) can supply.
    #[error("quota unreachable (requested {requested}, available {available}): {details}")]
    QuotaUnreachable {
        requested: usize,
        available: usize,
        details: String,
    },
    /// The taxonomy dump could not be read or parsed.
    #[error("taxonomy source '{}' failed: {reason}", path.display())]
    Taxonomy { path: PathBuf, reason: String },
    /// A persisted checkpoint is corrupt or incompatible with the current run.
    #[error("checkpoint failure: {0}")]
    Checkpoint(String),
    /// A link could not be fetched by the document pipeline.
    #[error("failed to fetch '{link}': {reason}")]
    Fetch { link: Link, reason: String },
    /// Filesystem failure while reading or writing run artifacts.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Invalid sampler configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

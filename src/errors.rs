use std::io;

use thiserror::Error;

use crate::types::{ItemId, SourceId, UserId, VariantName};

/// Error type for source loading, negative sampling, and variant assembly.
///
/// Malformed raw records are not errors; they are counted and skipped
/// (see [`crate::data::MalformedRecord`]).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing interaction source: {0}")]
    MissingSource(String),
    #[error("interaction source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },
    #[error(
        "cannot draw {requested} negatives for user {user_id} (target item {item_id}): only {eligible} eligible candidates"
    )]
    SamplingExhausted {
        user_id: UserId,
        item_id: ItemId,
        eligible: usize,
        requested: usize,
    },
    #[error("variant '{variant}' has an empty train pool after filtering")]
    EmptyVariantPool { variant: VariantName },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

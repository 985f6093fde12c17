//! Interaction source interfaces and built-in readers.
//!
//! Ownership model:
//! - `InteractionSource` is the pipeline-facing interface; `load` is called
//!   exactly once per run and returns an owned `SourceData`.
//! - Readers never fail on individual bad records. They count them into
//!   `SourceData::malformed` and keep going; only an unreadable source
//!   (missing path, I/O failure) is an error.

use std::path::Path;

use crate::config::{SourceFormat, SourceSpec};
use crate::data::{Interaction, SourceData, SourceRole};
use crate::errors::PipelineError;
use crate::types::SourceId;

/// Built-in file-backed source implementations.
pub mod sources;

pub use sources::adjacency::AdjacencyListSource;
pub use sources::feedback::FeedbackTableSource;
pub use sources::simulation_log::SimulationLogSource;

/// Pipeline-facing interaction source.
///
/// For a fixed on-disk state, `load` must return the same interactions in the
/// same order so seeded runs stay reproducible.
pub trait InteractionSource: Send + Sync {
    /// Stable source identifier referenced by variant policies and reports.
    fn id(&self) -> &str;
    /// Role of this source in the evaluation protocol.
    fn role(&self) -> SourceRole;
    /// Read every interaction, skipping and counting malformed records.
    fn load(&self) -> Result<SourceData, PipelineError>;
}

/// Source backed by an in-memory interaction list.
pub struct InMemorySource {
    id: SourceId,
    role: SourceRole,
    interactions: Vec<Interaction>,
}

impl InMemorySource {
    /// Create an in-memory source from prebuilt interactions.
    pub fn new(id: impl Into<SourceId>, role: SourceRole, interactions: Vec<Interaction>) -> Self {
        Self {
            id: id.into(),
            role,
            interactions,
        }
    }

    /// Build from an adjacency map literal, stamping the role's default time.
    pub fn from_adjacency<I, J>(id: impl Into<SourceId>, role: SourceRole, rows: I) -> Self
    where
        I: IntoIterator<Item = (u64, J)>,
        J: IntoIterator<Item = u64>,
    {
        let time = role.default_time();
        let interactions = rows
            .into_iter()
            .flat_map(|(user, items)| {
                items
                    .into_iter()
                    .map(move |item| Interaction::new(user, item, time))
            })
            .collect();
        Self::new(id, role, interactions)
    }
}

impl InteractionSource for InMemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn load(&self) -> Result<SourceData, PipelineError> {
        Ok(SourceData::new(
            self.id.clone(),
            self.role,
            self.interactions.clone(),
        ))
    }
}

/// Build the reader matching a configured source.
pub fn source_from_spec(spec: &SourceSpec) -> Box<dyn InteractionSource> {
    match spec.format {
        SourceFormat::Adjacency => Box::new(AdjacencyListSource::new(
            spec.id.clone(),
            spec.role,
            spec.path.clone(),
        )),
        SourceFormat::SimulationLog => Box::new(SimulationLogSource::new(
            spec.id.clone(),
            spec.role,
            spec.path.clone(),
        )),
        SourceFormat::Feedback => Box::new(FeedbackTableSource::new(
            spec.id.clone(),
            spec.role,
            spec.path.clone(),
        )),
    }
}

/// Load every source in order.
pub fn load_all(sources: &[Box<dyn InteractionSource>]) -> Result<Vec<SourceData>, PipelineError> {
    if sources.is_empty() {
        return Err(PipelineError::MissingSource(
            "at least one interaction source is required".to_string(),
        ));
    }
    sources.iter().map(|source| source.load()).collect()
}

pub(crate) fn ensure_exists(source_id: &str, path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        return Ok(());
    }
    Err(PipelineError::SourceUnavailable {
        source_id: source_id.to_string(),
        reason: format!("path '{}' does not exist", path.display()),
    })
}

#![doc = include_str!("../README.md")]

/// Command-line front end.
pub mod app;
/// Pipeline, sampling and source configuration.
pub mod config;
/// Centralized defaults, role times and output layout.
pub mod constants;
/// Interaction records and dataset tables.
pub mod data;
mod hash;
/// Per-user seen-sets merged across sources.
pub mod history;
/// Per-source contribution shares.
pub mod metrics;
/// Tab-separated output and atomic variant publication.
pub mod output;
/// End-to-end orchestration.
pub mod pipeline;
/// Leakage-free negative sampling.
pub mod sampler;
/// Interaction source trait and built-in readers.
pub mod source;
/// User scoping applied before indexing.
pub mod subset;
/// Shared type aliases.
pub mod types;
/// Global item universe.
pub mod universe;
/// Train-pool policies and the variant assembler.
pub mod variant;

mod errors;

pub use config::{
    ExhaustionPolicy, NegativeSamplingConfig, PipelineConfig, SourceFormat, SourceSpec, UserScope,
};
pub use data::{
    DatasetVariant, EvalRow, Interaction, MalformedRecord, NegativeSampleSet, SourceData,
    SourceRole,
};
pub use errors::PipelineError;
pub use history::{MergeReport, SeenSet};
pub use pipeline::{Pipeline, PipelineReport, PreparedDatasets, prepare};
pub use sampler::{NegativeSampler, RowOutcome, SamplingReport};
pub use source::{
    AdjacencyListSource, FeedbackTableSource, InMemorySource, InteractionSource,
    SimulationLogSource,
};
pub use types::{ItemId, Rating, SourceId, Timestamp, UserId, VariantName};
pub use universe::ItemUniverse;
pub use variant::{RuleFilter, SourceRule, VariantAssembler, VariantPolicy, VariantStats};

//! End-to-end orchestration: load, scope, index, sample, assemble, publish.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::info;

use crate::config::{NegativeSamplingConfig, PipelineConfig, UserScope};
use crate::constants::variants::DEFAULT_RATING_THRESHOLD;
use crate::data::{DatasetVariant, Interaction, SourceData, SourceRole};
use crate::errors::PipelineError;
use crate::history::{MergeReport, SeenSet};
use crate::output::write_variant;
use crate::sampler::{NegativeSampler, SamplingReport};
use crate::source::{InteractionSource, load_all, source_from_spec};
use crate::subset::{ScopeReport, apply_scope};
use crate::types::SourceId;
use crate::universe::ItemUniverse;
use crate::variant::{VariantAssembler, VariantPolicy, VariantStats};

/// Everything a run measured, in pipeline order.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineReport {
    pub scope: ScopeReport,
    pub merge: MergeReport,
    pub universe_items: usize,
    /// Base seed used for sampling; replaying it reproduces the negatives.
    pub base_seed: u64,
    pub dev: SamplingReport,
    pub test: SamplingReport,
    pub variants: Vec<VariantStats>,
    /// Directories written by [`Pipeline::run`]; empty for [`prepare`].
    pub published: Vec<PathBuf>,
}

/// Assembled variants, not yet written.
#[derive(Clone, Debug)]
pub struct PreparedDatasets {
    pub variants: Vec<DatasetVariant>,
    pub report: PipelineReport,
}

fn role_sources(sources: &[SourceData], role: SourceRole) -> Vec<SourceId> {
    sources
        .iter()
        .filter(|source| source.role == role)
        .map(|source| source.id.clone())
        .collect()
}

fn require_roles(sources: &[SourceData]) -> Result<(), PipelineError> {
    let mut ids = HashSet::new();
    for source in sources {
        if !ids.insert(source.id.as_str()) {
            return Err(PipelineError::Configuration(format!(
                "source id '{}' is used more than once",
                source.id
            )));
        }
    }
    for (role, label) in [
        (SourceRole::Train, "train"),
        (SourceRole::Dev, "dev"),
        (SourceRole::Test, "test"),
    ] {
        if !sources.iter().any(|source| source.role == role) {
            return Err(PipelineError::MissingSource(format!(
                "no {label} source configured"
            )));
        }
    }
    Ok(())
}

fn require_unique_names(policies: &[VariantPolicy]) -> Result<(), PipelineError> {
    let mut names = HashSet::new();
    for policy in policies {
        if !names.insert(policy.name.as_str()) {
            return Err(PipelineError::Configuration(format!(
                "variant '{}' is defined more than once",
                policy.name
            )));
        }
    }
    Ok(())
}

fn targets(sources: &[SourceData], role: SourceRole) -> Vec<Interaction> {
    sources
        .iter()
        .filter(|source| source.role == role)
        .flat_map(|source| source.interactions.iter().copied())
        .collect()
}

/// Run every in-memory stage over already-loaded sources.
///
/// Every source feeds the seen-set and item universe, whether or not any
/// policy admits it into a train pool. An empty `policies` slice selects
/// the standard variants over the train and simulated sources (human-only
/// when no simulated source is loaded).
pub fn prepare(
    sources: Vec<SourceData>,
    sampling: NegativeSamplingConfig,
    scope: &UserScope,
    policies: &[VariantPolicy],
) -> Result<PreparedDatasets, PipelineError> {
    require_roles(&sources)?;
    let policies = if policies.is_empty() {
        VariantPolicy::standard_set(
            &role_sources(&sources, SourceRole::Train),
            &role_sources(&sources, SourceRole::Simulated),
            DEFAULT_RATING_THRESHOLD,
        )
    } else {
        policies.to_vec()
    };
    require_unique_names(&policies)?;

    let (sources, scope_report) = apply_scope(sources, scope)?;
    let (seen, merge) = SeenSet::from_sources(&sources);
    let universe = ItemUniverse::from_sources(&sources);

    let sampler = NegativeSampler::new(&seen, &universe, sampling)?;
    let (dev_rows, dev) = sampler.sample_rows("dev", &targets(&sources, SourceRole::Dev))?;
    let (test_rows, test) = sampler.sample_rows("test", &targets(&sources, SourceRole::Test))?;

    let assembler = VariantAssembler::new(&sources, &dev_rows, &test_rows);
    let mut variants = Vec::with_capacity(policies.len());
    let mut stats = Vec::with_capacity(policies.len());
    for policy in &policies {
        let (variant, variant_stats) = assembler.assemble(policy)?;
        variants.push(variant);
        stats.push(variant_stats);
    }

    Ok(PreparedDatasets {
        variants,
        report: PipelineReport {
            scope: scope_report,
            merge,
            universe_items: universe.len(),
            base_seed: sampler.base_seed(),
            dev,
            test,
            variants: stats,
            published: Vec::new(),
        },
    })
}

/// Configured pipeline over on-disk sources.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load every configured source.
    pub fn load(&self) -> Result<Vec<SourceData>, PipelineError> {
        let readers: Vec<Box<dyn InteractionSource>> =
            self.config.sources.iter().map(source_from_spec).collect();
        load_all(&readers)
    }

    /// Load, prepare and publish every variant.
    ///
    /// Nothing is written unless every variant assembled; each variant
    /// directory is then published atomically.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let sources = self.load()?;
        let prepared = prepare(
            sources,
            self.config.sampling.clone(),
            &self.config.scope,
            &self.config.variants,
        )?;
        let mut report = prepared.report;
        for variant in &prepared.variants {
            report
                .published
                .push(write_variant(&self.config.output_root, variant)?);
        }
        info!(
            variants = report.published.len(),
            dev_rows = report.dev.rows,
            test_rows = report.test.rows,
            base_seed = report.base_seed,
            root = %self.config.output_root.display(),
            "[evalset:pipeline] run complete"
        );
        Ok(report)
    }
}

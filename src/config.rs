use std::path::PathBuf;

use crate::constants::sampler::{
    DEFAULT_BATCH_FACTOR, DEFAULT_MAX_ROUNDS, DEFAULT_NEGATIVES_PER_ROW,
};
use crate::constants::variants::DEFAULT_SUBSET_SEED;
use crate::data::SourceRole;
use crate::errors::PipelineError;
use crate::types::SourceId;
use crate::variant::VariantPolicy;

/// What to do with a row whose eligible candidate pool is smaller than K.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Abort the run with `PipelineError::SamplingExhausted`.
    #[default]
    Fail,
    /// Emit every eligible candidate (fewer than K) for that row.
    ReduceK,
    /// Drop the row from the evaluation table.
    SkipRow,
}

/// Negative sampling behavior.
#[derive(Clone, Debug)]
pub struct NegativeSamplingConfig {
    /// Negatives per dev/test row (K).
    pub negatives_per_row: usize,
    /// Candidates drawn per rejection round, as a multiple of K.
    pub batch_factor: usize,
    /// Rejection rounds allowed per row before the row is declared exhausted.
    pub max_rounds: usize,
    /// Base seed; `None` draws a fresh base seed per run.
    pub seed: Option<u64>,
    /// Behavior when fewer than K candidates are eligible.
    pub on_exhausted: ExhaustionPolicy,
    /// Sample rows on the rayon pool.
    pub parallel: bool,
}

impl Default for NegativeSamplingConfig {
    fn default() -> Self {
        Self {
            negatives_per_row: DEFAULT_NEGATIVES_PER_ROW,
            batch_factor: DEFAULT_BATCH_FACTOR,
            max_rounds: DEFAULT_MAX_ROUNDS,
            seed: None,
            on_exhausted: ExhaustionPolicy::Fail,
            parallel: true,
        }
    }
}

impl NegativeSamplingConfig {
    /// Override K.
    pub fn with_negatives_per_row(mut self, negatives_per_row: usize) -> Self {
        self.negatives_per_row = negatives_per_row;
        self
    }

    /// Fix the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the exhaustion policy.
    pub fn with_exhaustion_policy(mut self, on_exhausted: ExhaustionPolicy) -> Self {
        self.on_exhausted = on_exhausted;
        self
    }

    /// Override the rejection batch size multiplier.
    pub fn with_batch_factor(mut self, batch_factor: usize) -> Self {
        self.batch_factor = batch_factor;
        self
    }

    /// Override the per-row round cap.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Enable or disable parallel row sampling.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject settings that cannot produce a valid sample.
    pub fn validated(self) -> Result<Self, PipelineError> {
        if self.negatives_per_row == 0 {
            return Err(PipelineError::Configuration(
                "negatives_per_row must be greater than zero".to_string(),
            ));
        }
        if self.batch_factor == 0 {
            return Err(PipelineError::Configuration(
                "batch_factor must be greater than zero".to_string(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(PipelineError::Configuration(
                "max_rounds must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Which users survive into index construction and output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UserScope {
    /// Keep every user.
    #[default]
    All,
    /// Keep users present in at least one simulated source.
    SimulatedOnly,
    /// Keep users with enough train interactions, optionally capped by a seeded draw.
    Active {
        min_interactions: usize,
        max_users: Option<usize>,
        seed: u64,
    },
}

impl UserScope {
    /// Active-user scope with the default subset seed.
    pub fn active(min_interactions: usize, max_users: Option<usize>) -> Self {
        UserScope::Active {
            min_interactions,
            max_users,
            seed: DEFAULT_SUBSET_SEED,
        }
    }
}

/// On-disk shape of a configured source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// `user_id item_id item_id ...` per line.
    Adjacency,
    /// Directory of `<user_id>.json` page logs.
    SimulationLog,
    /// Tab-separated table with a header row.
    Feedback,
}

/// One configured interaction source.
#[derive(Clone, Debug)]
pub struct SourceSpec {
    pub id: SourceId,
    pub role: SourceRole,
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl SourceSpec {
    pub fn new(
        id: impl Into<SourceId>,
        role: SourceRole,
        path: impl Into<PathBuf>,
        format: SourceFormat,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            path: path.into(),
            format,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Every source to load; all of them feed the seen-set and item universe.
    pub sources: Vec<SourceSpec>,
    /// Directory receiving one subdirectory per variant.
    pub output_root: PathBuf,
    /// Negative sampling settings shared by every variant.
    pub sampling: NegativeSamplingConfig,
    /// User scoping applied before indexing.
    pub scope: UserScope,
    /// Variants to assemble and publish.
    pub variants: Vec<VariantPolicy>,
}

impl PipelineConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            sources: Vec::new(),
            output_root: output_root.into(),
            sampling: NegativeSamplingConfig::default(),
            scope: UserScope::All,
            variants: Vec::new(),
        }
    }

    pub fn with_source(mut self, spec: SourceSpec) -> Self {
        self.sources.push(spec);
        self
    }

    pub fn with_sampling(mut self, sampling: NegativeSamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_scope(mut self, scope: UserScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_variant(mut self, policy: VariantPolicy) -> Self {
        self.variants.push(policy);
        self
    }
}

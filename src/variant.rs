//! Declarative train-pool policies and the assembler that applies them.
//!
//! One assembler serves every variant; a variant differs only by its
//! [`VariantPolicy`]. Dev/test rows pass through untouched and are never
//! deduplicated against the train pool.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::constants::variants::{ALL_VARIANT, ENHANCED_VARIANT, ORIGINAL_VARIANT};
use crate::data::{DatasetVariant, EvalRow, Interaction, SourceData};
use crate::errors::PipelineError;
use crate::metrics::{PoolComposition, pool_composition};
use crate::types::{ItemId, Rating, SourceId, UserId, VariantName};

/// Per-interaction admission filter for one source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleFilter {
    /// Admit everything.
    All,
    /// Admit rated interactions with `rating >= threshold`; unrated ones are rejected.
    MinRating(Rating),
}

impl RuleFilter {
    pub fn admits(&self, interaction: &Interaction) -> bool {
        match self {
            RuleFilter::All => true,
            RuleFilter::MinRating(threshold) => interaction
                .rating
                .is_some_and(|rating| rating >= *threshold),
        }
    }
}

/// Inclusion of one source in a train pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRule {
    pub source_id: SourceId,
    pub filter: RuleFilter,
}

/// Named train-pool policy.
///
/// Rules are processed in order; on a duplicate `(user_id, item_id)` the copy
/// from the earlier rule wins, so list the source whose timestamps and
/// ratings should survive first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantPolicy {
    pub name: VariantName,
    pub rules: Vec<SourceRule>,
}

impl VariantPolicy {
    pub fn new(name: impl Into<VariantName>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Include every interaction of `source_id`.
    pub fn include(mut self, source_id: impl Into<SourceId>) -> Self {
        self.rules.push(SourceRule {
            source_id: source_id.into(),
            filter: RuleFilter::All,
        });
        self
    }

    /// Include interactions of `source_id` rated at least `threshold`.
    pub fn include_rated(mut self, source_id: impl Into<SourceId>, threshold: Rating) -> Self {
        self.rules.push(SourceRule {
            source_id: source_id.into(),
            filter: RuleFilter::MinRating(threshold),
        });
        self
    }

    /// Whether `interaction` from `source_id` enters the train pool.
    pub fn admits(&self, source_id: &str, interaction: &Interaction) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.source_id == source_id && rule.filter.admits(interaction))
    }

    /// Human-only, human + rated simulated, human + all simulated.
    ///
    /// Without simulated sources the two mixed variants would equal the
    /// human-only one, so only the human-only policy is returned.
    pub fn standard_set(
        human: &[SourceId],
        simulated: &[SourceId],
        rating_threshold: Rating,
    ) -> Vec<VariantPolicy> {
        let with_humans = |name: &str| {
            human
                .iter()
                .fold(VariantPolicy::new(name), |policy, id| policy.include(id.clone()))
        };
        let original = with_humans(ORIGINAL_VARIANT);
        if simulated.is_empty() {
            warn!(
                "[evalset:variant] no simulated sources; only {} is assembled",
                ORIGINAL_VARIANT
            );
            return vec![original];
        }
        let enhanced = simulated
            .iter()
            .fold(with_humans(ENHANCED_VARIANT), |policy, id| {
                policy.include_rated(id.clone(), rating_threshold)
            });
        let all = simulated
            .iter()
            .fold(with_humans(ALL_VARIANT), |policy, id| policy.include(id.clone()));
        vec![original, enhanced, all]
    }
}

/// Counts gathered while assembling one variant.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantStats {
    pub variant: VariantName,
    pub train_rows: usize,
    pub dev_rows: usize,
    pub test_rows: usize,
    /// Rejected by a rule filter.
    pub filtered_out: usize,
    /// Dropped because the `(user_id, item_id)` pair was already pooled.
    pub duplicates_dropped: usize,
    pub composition: Option<PoolComposition>,
}

/// Applies variant policies to a shared set of loaded sources.
pub struct VariantAssembler<'a> {
    sources: &'a [SourceData],
    dev: &'a [EvalRow],
    test: &'a [EvalRow],
}

impl<'a> VariantAssembler<'a> {
    pub fn new(sources: &'a [SourceData], dev: &'a [EvalRow], test: &'a [EvalRow]) -> Self {
        Self { sources, dev, test }
    }

    fn validate(&self, policy: &VariantPolicy) -> Result<(), PipelineError> {
        if policy.name.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "variant name must not be empty".to_string(),
            ));
        }
        let mut named = HashSet::new();
        for rule in &policy.rules {
            if !named.insert(rule.source_id.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "variant '{}' lists source '{}' more than once",
                    policy.name, rule.source_id
                )));
            }
            let Some(source) = self.sources.iter().find(|s| s.id == rule.source_id) else {
                return Err(PipelineError::Configuration(format!(
                    "variant '{}' references unknown source '{}'",
                    policy.name, rule.source_id
                )));
            };
            if !source.role.feeds_train_pool() {
                return Err(PipelineError::Configuration(format!(
                    "variant '{}' cannot draw train rows from {:?} source '{}'",
                    policy.name, source.role, source.id
                )));
            }
        }
        Ok(())
    }

    /// Build train/dev/test tables for `policy`.
    pub fn assemble(
        &self,
        policy: &VariantPolicy,
    ) -> Result<(DatasetVariant, VariantStats), PipelineError> {
        self.validate(policy)?;
        let mut pool: IndexMap<(UserId, ItemId), Interaction> = IndexMap::new();
        let mut kept_by_source: IndexMap<SourceId, usize> = IndexMap::new();
        let mut filtered_out = 0usize;
        let mut duplicates_dropped = 0usize;

        for rule in &policy.rules {
            let kept = kept_by_source.entry(rule.source_id.clone()).or_insert(0);
            for source in self.sources.iter().filter(|s| s.id == rule.source_id) {
                for interaction in &source.interactions {
                    if pool.contains_key(&interaction.key()) {
                        duplicates_dropped += 1;
                        continue;
                    }
                    if !rule.filter.admits(interaction) {
                        filtered_out += 1;
                        continue;
                    }
                    pool.insert(interaction.key(), *interaction);
                    *kept += 1;
                }
            }
        }

        if pool.is_empty() {
            return Err(PipelineError::EmptyVariantPool {
                variant: policy.name.clone(),
            });
        }

        let train: Vec<Interaction> = pool.into_values().collect();
        let stats = VariantStats {
            variant: policy.name.clone(),
            train_rows: train.len(),
            dev_rows: self.dev.len(),
            test_rows: self.test.len(),
            filtered_out,
            duplicates_dropped,
            composition: pool_composition(&kept_by_source),
        };
        info!(
            variant = %stats.variant,
            train = stats.train_rows,
            dev = stats.dev_rows,
            test = stats.test_rows,
            filtered_out,
            duplicates_dropped,
            "[evalset:variant] train pool assembled"
        );
        Ok((
            DatasetVariant {
                name: policy.name.clone(),
                train,
                dev: self.dev.to_vec(),
                test: self.test.to_vec(),
            },
            stats,
        ))
    }
}

//! Negative sampling for dev/test rows.
//!
//! For a target `(user, item)` the sampler draws K distinct items from
//! `universe \ (seen(user) ∪ {item})`. Rows are independent given the
//! read-only seen-set and universe, so they are sampled on the rayon pool and
//! collected back in input order.

use ahash::AHashSet;
use rand::Rng;
use rand::seq::IndexedRandom;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{ExhaustionPolicy, NegativeSamplingConfig};
use crate::constants::sampler::SPARSE_POOL_DIVISOR;
use crate::data::{EvalRow, Interaction, NegativeSampleSet};
use crate::errors::PipelineError;
use crate::hash::{row_seed, stream_seed};
use crate::history::SeenSet;
use crate::types::ItemId;
use crate::universe::ItemUniverse;

#[derive(Debug, Clone)]
/// Small deterministic RNG used for reproducible per-row draws.
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64_internal().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Result of sampling one row under the configured exhaustion policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// Exactly K negatives.
    Full(NegativeSampleSet),
    /// Fewer than K eligible candidates; all of them were taken.
    Reduced(NegativeSampleSet),
    /// Fewer than K eligible candidates; the row was dropped.
    Skipped,
}

/// Counts for one sampled table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SamplingReport {
    pub rows: usize,
    pub full: usize,
    pub reduced: usize,
    pub skipped: usize,
}

/// Draws negatives against a fixed seen-set and item universe.
pub struct NegativeSampler<'a> {
    seen: &'a SeenSet,
    universe: &'a ItemUniverse,
    config: NegativeSamplingConfig,
    base_seed: u64,
}

impl<'a> NegativeSampler<'a> {
    /// Create a sampler; an unseeded config draws a fresh base seed.
    pub fn new(
        seen: &'a SeenSet,
        universe: &'a ItemUniverse,
        config: NegativeSamplingConfig,
    ) -> Result<Self, PipelineError> {
        let config = config.validated()?;
        let base_seed = config.seed.unwrap_or_else(|| rand::rng().random());
        Ok(Self {
            seen,
            universe,
            config,
            base_seed,
        })
    }

    /// Base seed in use (the configured one, or the per-run draw).
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn config(&self) -> &NegativeSamplingConfig {
        &self.config
    }

    /// Draw exactly K negatives for `target`, ignoring the exhaustion policy.
    ///
    /// `stream` and `row_index` only feed seed derivation; they match the
    /// arguments of [`NegativeSampler::sample_rows`], so
    /// `sample("dev", t, i)` equals row `i` of `sample_rows("dev", ..)`.
    pub fn sample(
        &self,
        stream: &str,
        target: &Interaction,
        row_index: usize,
    ) -> Result<NegativeSampleSet, PipelineError> {
        let k = self.config.negatives_per_row;
        let eligible = self
            .universe
            .eligible_count(self.seen, target.user_id, target.item_id);
        if eligible < k {
            return Err(self.exhausted(target, eligible));
        }
        let seed = row_seed(
            stream_seed(self.base_seed, stream),
            row_index,
            target.user_id,
            target.item_id,
        );
        self.draw(target, seed, k, eligible).map(NegativeSampleSet)
    }

    /// Sample one row, applying the configured exhaustion policy.
    pub fn sample_with_policy(
        &self,
        target: &Interaction,
        seed: u64,
    ) -> Result<RowOutcome, PipelineError> {
        let k = self.config.negatives_per_row;
        let eligible = self
            .universe
            .eligible_count(self.seen, target.user_id, target.item_id);
        if eligible >= k {
            return self
                .draw(target, seed, k, eligible)
                .map(|items| RowOutcome::Full(NegativeSampleSet(items)));
        }
        match self.config.on_exhausted {
            ExhaustionPolicy::Fail => Err(self.exhausted(target, eligible)),
            ExhaustionPolicy::ReduceK => {
                debug!(
                    user_id = target.user_id,
                    item_id = target.item_id,
                    eligible,
                    requested = k,
                    "[evalset:sampler] reducing K for row"
                );
                self.draw(target, seed, eligible, eligible)
                    .map(|items| RowOutcome::Reduced(NegativeSampleSet(items)))
            }
            ExhaustionPolicy::SkipRow => {
                debug!(
                    user_id = target.user_id,
                    item_id = target.item_id,
                    eligible,
                    requested = k,
                    "[evalset:sampler] skipping row"
                );
                Ok(RowOutcome::Skipped)
            }
        }
    }

    /// Sample every target of one table.
    ///
    /// `stream` separates seed spaces of tables sharing row indices (e.g. `"dev"`
    /// and `"test"`). Output preserves input order; skipped rows are omitted.
    pub fn sample_rows(
        &self,
        stream: &str,
        targets: &[Interaction],
    ) -> Result<(Vec<EvalRow>, SamplingReport), PipelineError> {
        let base = stream_seed(self.base_seed, stream);
        let resolve = |(idx, target): (usize, &Interaction)| {
            let seed = row_seed(base, idx, target.user_id, target.item_id);
            self.sample_with_policy(target, seed)
                .map(|outcome| (*target, outcome))
        };
        let outcomes: Vec<(Interaction, RowOutcome)> = if self.config.parallel {
            targets
                .par_iter()
                .enumerate()
                .map(&resolve)
                .collect::<Result<Vec<_>, PipelineError>>()?
        } else {
            targets
                .iter()
                .enumerate()
                .map(&resolve)
                .collect::<Result<Vec<_>, PipelineError>>()?
        };

        let mut report = SamplingReport {
            rows: targets.len(),
            ..SamplingReport::default()
        };
        let mut rows = Vec::with_capacity(outcomes.len());
        for (target, outcome) in outcomes {
            let negatives = match outcome {
                RowOutcome::Full(negatives) => {
                    report.full += 1;
                    negatives
                }
                RowOutcome::Reduced(negatives) => {
                    report.reduced += 1;
                    negatives
                }
                RowOutcome::Skipped => {
                    report.skipped += 1;
                    continue;
                }
            };
            rows.push(EvalRow { target, negatives });
        }
        info!(
            stream,
            rows = report.rows,
            full = report.full,
            reduced = report.reduced,
            skipped = report.skipped,
            k = self.config.negatives_per_row,
            "[evalset:sampler] negatives drawn"
        );
        Ok((rows, report))
    }

    fn exhausted(&self, target: &Interaction, eligible: usize) -> PipelineError {
        PipelineError::SamplingExhausted {
            user_id: target.user_id,
            item_id: target.item_id,
            eligible,
            requested: self.config.negatives_per_row,
        }
    }

    /// Draw `k` negatives given `eligible >= k` candidates.
    fn draw(
        &self,
        target: &Interaction,
        seed: u64,
        k: usize,
        eligible: usize,
    ) -> Result<Vec<ItemId>, PipelineError> {
        let mut rng = DeterministicRng::new(seed);
        let population = self.universe.as_slice();
        let user_seen = self.seen.items(target.user_id);
        let excluded = |item: ItemId| {
            item == target.item_id || user_seen.is_some_and(|items| items.contains(&item))
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        if eligible == k || eligible * SPARSE_POOL_DIVISOR < population.len() {
            let pool: Vec<ItemId> = population
                .iter()
                .copied()
                .filter(|item| !excluded(*item))
                .collect();
            return Ok(pool.choose_multiple(&mut rng, k).copied().collect());
        }

        let batch = k
            .saturating_mul(self.config.batch_factor)
            .max(k)
            .min(population.len());
        let mut accepted = Vec::with_capacity(k);
        let mut taken: AHashSet<ItemId> = AHashSet::with_capacity(k);
        for _ in 0..self.config.max_rounds {
            for &candidate in population.choose_multiple(&mut rng, batch) {
                if excluded(candidate) || !taken.insert(candidate) {
                    continue;
                }
                accepted.push(candidate);
                if accepted.len() == k {
                    return Ok(accepted);
                }
            }
        }
        Err(PipelineError::SamplingExhausted {
            user_id: target.user_id,
            item_id: target.item_id,
            eligible,
            requested: k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fixture() -> (SeenSet, ItemUniverse) {
        let mut seen = SeenSet::new();
        for item in [10, 11, 30] {
            seen.insert(1, item);
        }
        let universe: ItemUniverse = [10, 11, 20, 30, 40].into_iter().collect();
        (seen, universe)
    }

    fn large_fixture() -> (SeenSet, ItemUniverse) {
        let mut seen = SeenSet::new();
        for user in 0..20u64 {
            for item in (user * 7)..(user * 7 + 40) {
                seen.insert(user, item % 500);
            }
        }
        let universe: ItemUniverse = (0..500u64).collect();
        (seen, universe)
    }

    #[test]
    fn only_eligible_candidates_are_returned() {
        let (seen, universe) = fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(2)
            .with_seed(3);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let negatives = sampler.sample("dev", &Interaction::new(1, 10, 2), 0).unwrap();
        let got: HashSet<u64> = negatives.items().iter().copied().collect();
        assert_eq!(got, HashSet::from([20, 40]));
        assert_eq!(negatives.len(), 2);
    }

    #[test]
    fn short_pool_fails_instead_of_looping() {
        let (seen, universe) = fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(3)
            .with_seed(3);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let err = sampler.sample("dev", &Interaction::new(1, 10, 2), 0).unwrap_err();
        match err {
            PipelineError::SamplingExhausted {
                eligible,
                requested,
                ..
            } => {
                assert_eq!(eligible, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejection_path_upholds_invariants() {
        let (seen, universe) = large_fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(99)
            .with_seed(11);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        for user in 0..20u64 {
            let target = Interaction::new(user, user * 7, 2);
            let negatives = sampler.sample("dev", &target, user as usize).unwrap();
            let unique: HashSet<u64> = negatives.items().iter().copied().collect();
            assert_eq!(negatives.len(), 99);
            assert_eq!(unique.len(), 99);
            assert!(!unique.contains(&target.item_id));
            assert!(unique.iter().all(|item| !seen.contains(user, *item)));
        }
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let (seen, universe) = large_fixture();
        let config = NegativeSamplingConfig::default().with_seed(5);
        let first = NegativeSampler::new(&seen, &universe, config.clone()).unwrap();
        let second = NegativeSampler::new(&seen, &universe, config).unwrap();
        let target = Interaction::new(4, 28, 3);
        assert_eq!(
            first.sample("dev", &target, 9).unwrap(),
            second.sample("dev", &target, 9).unwrap()
        );
    }

    #[test]
    fn parallel_and_sequential_runs_agree_and_keep_order() {
        let (seen, universe) = large_fixture();
        let targets: Vec<Interaction> = (0..20u64)
            .map(|user| Interaction::new(user, user * 7 + 1, 2))
            .collect();
        let config = NegativeSamplingConfig::default().with_seed(21);
        let parallel = NegativeSampler::new(&seen, &universe, config.clone()).unwrap();
        let sequential =
            NegativeSampler::new(&seen, &universe, config.with_parallel(false)).unwrap();
        let (par_rows, report) = parallel.sample_rows("dev", &targets).unwrap();
        let (seq_rows, _) = sequential.sample_rows("dev", &targets).unwrap();
        assert_eq!(par_rows, seq_rows);
        assert_eq!(report.full, 20);
        let order: Vec<Interaction> = par_rows.iter().map(|row| row.target).collect();
        assert_eq!(order, targets);
    }

    #[test]
    fn streams_draw_independently() {
        let (seen, universe) = large_fixture();
        let targets = vec![Interaction::new(2, 14, 2)];
        let config = NegativeSamplingConfig::default().with_seed(1);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let (dev, _) = sampler.sample_rows("dev", &targets).unwrap();
        let (test, _) = sampler.sample_rows("test", &targets).unwrap();
        assert_ne!(dev[0].negatives, test[0].negatives);
    }

    #[test]
    fn single_row_sampling_matches_table_sampling() {
        let (seen, universe) = large_fixture();
        let targets: Vec<Interaction> = (0..5u64)
            .map(|user| Interaction::new(user, user * 7 + 2, 3))
            .collect();
        let config = NegativeSamplingConfig::default().with_seed(17);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let (rows, _) = sampler.sample_rows("test", &targets).unwrap();
        for (idx, target) in targets.iter().enumerate() {
            assert_eq!(
                sampler.sample("test", target, idx).unwrap(),
                rows[idx].negatives
            );
        }
    }

    fn quarter_seen_fixture(seen_items: u64) -> (SeenSet, ItemUniverse) {
        let mut seen = SeenSet::new();
        for item in 0..seen_items {
            seen.insert(1, item);
        }
        let universe: ItemUniverse = (0..400u64).collect();
        (seen, universe)
    }

    #[test]
    fn round_cap_yields_full_set_or_exhaustion() {
        let (seen, universe) = quarter_seen_fixture(100);
        let target = Interaction::new(1, 0, 2);
        assert_eq!(universe.eligible_count(&seen, 1, 0), 300);
        for seed in 0..16 {
            let config = NegativeSamplingConfig::default()
                .with_negatives_per_row(150)
                .with_max_rounds(1)
                .with_seed(seed);
            let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
            match sampler.sample("dev", &target, 0) {
                Ok(negatives) => {
                    let unique: HashSet<u64> = negatives.items().iter().copied().collect();
                    assert_eq!(negatives.len(), 150);
                    assert_eq!(unique.len(), 150);
                    assert!(unique.iter().all(|item| *item >= 100));
                }
                Err(PipelineError::SamplingExhausted {
                    eligible,
                    requested,
                    ..
                }) => {
                    assert_eq!(eligible, 300);
                    assert_eq!(requested, 150);
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn exhausted_round_budget_fails_despite_enough_candidates() {
        let (seen, universe) = quarter_seen_fixture(100);
        // One round of exactly K candidates cannot avoid all 100 seen items.
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(150)
            .with_batch_factor(1)
            .with_max_rounds(1)
            .with_seed(4);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let err = sampler
            .sample("dev", &Interaction::new(1, 0, 2), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SamplingExhausted {
                eligible: 300,
                requested: 150,
                ..
            }
        ));
    }

    #[test]
    fn rejection_finishes_at_quarter_density_under_default_cap() {
        let (seen, universe) = quarter_seen_fixture(300);
        let target = Interaction::new(1, 0, 2);
        assert_eq!(universe.eligible_count(&seen, 1, 0), 100);
        for seed in 0..16 {
            let config = NegativeSamplingConfig::default()
                .with_negatives_per_row(90)
                .with_seed(seed);
            let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
            let negatives = sampler.sample("dev", &target, 0).unwrap();
            let unique: HashSet<u64> = negatives.items().iter().copied().collect();
            assert_eq!(unique.len(), 90);
            assert!(unique.iter().all(|item| *item >= 300));
        }
    }

    #[test]
    fn reduce_policy_returns_every_eligible_item() {
        let (seen, universe) = fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(4)
            .with_seed(8)
            .with_exhaustion_policy(ExhaustionPolicy::ReduceK);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let (rows, report) = sampler
            .sample_rows("test", &[Interaction::new(1, 10, 3)])
            .unwrap();
        assert_eq!(report.reduced, 1);
        let got: HashSet<u64> = rows[0].negatives.items().iter().copied().collect();
        assert_eq!(got, HashSet::from([20, 40]));
    }

    #[test]
    fn skip_policy_drops_short_rows_only() {
        let (seen, universe) = fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(3)
            .with_seed(8)
            .with_exhaustion_policy(ExhaustionPolicy::SkipRow);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let targets = [Interaction::new(1, 10, 3), Interaction::new(2, 10, 3)];
        let (rows, report) = sampler.sample_rows("test", &targets).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.full, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target.user_id, 2);
    }

    #[test]
    fn fail_policy_aborts_table() {
        let (seen, universe) = fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(3)
            .with_seed(8);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let result = sampler.sample_rows("dev", &[Interaction::new(1, 10, 2)]);
        assert!(matches!(
            result,
            Err(PipelineError::SamplingExhausted { .. })
        ));
    }

    #[test]
    fn unseen_user_samples_from_whole_universe_minus_target() {
        let (seen, universe) = fixture();
        let config = NegativeSamplingConfig::default()
            .with_negatives_per_row(4)
            .with_seed(2);
        let sampler = NegativeSampler::new(&seen, &universe, config).unwrap();
        let negatives = sampler.sample("dev", &Interaction::new(99, 20, 2), 0).unwrap();
        let got: HashSet<u64> = negatives.items().iter().copied().collect();
        assert_eq!(got, HashSet::from([10, 11, 30, 40]));
    }

    #[test]
    fn rng_fill_bytes_handles_partial_chunks() {
        let mut rng = DeterministicRng::new(1);
        let mut buf = [0u8; 13];
        rand::RngCore::fill_bytes(&mut rng, &mut buf);
        assert!(buf.iter().any(|byte| *byte != 0));
    }
}

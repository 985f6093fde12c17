//! User scoping applied before indexing.
//!
//! Scoping removes users from every source at once (train, dev, test and
//! simulated alike), so the seen-set built afterwards still covers every
//! remaining interaction of every remaining user.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::info;

use crate::config::UserScope;
use crate::data::{SourceData, SourceRole};
use crate::errors::PipelineError;
use crate::types::UserId;

/// Counts gathered while scoping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeReport {
    pub users_before: usize,
    pub users_kept: usize,
    pub interactions_dropped: usize,
}

fn users_of<'a>(sources: impl IntoIterator<Item = &'a SourceData>) -> BTreeSet<UserId> {
    sources
        .into_iter()
        .flat_map(|source| source.interactions.iter().map(|row| row.user_id))
        .collect()
}

/// Users with at least `min_interactions` train-role interactions, capped at
/// `max_users` by a seeded uniform draw. Returned sorted.
pub fn select_active_users(
    sources: &[SourceData],
    min_interactions: usize,
    max_users: Option<usize>,
    seed: u64,
) -> BTreeSet<UserId> {
    let mut counts: BTreeMap<UserId, usize> = BTreeMap::new();
    for source in sources.iter().filter(|s| s.role == SourceRole::Train) {
        for row in &source.interactions {
            *counts.entry(row.user_id).or_insert(0) += 1;
        }
    }
    let active: Vec<UserId> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_interactions)
        .map(|(user, _)| user)
        .collect();
    match max_users {
        Some(cap) if active.len() > cap => {
            let mut rng = StdRng::seed_from_u64(seed);
            active.choose_multiple(&mut rng, cap).copied().collect()
        }
        _ => active.into_iter().collect(),
    }
}

/// Keep only interactions of `users` in every source.
pub fn restrict_to_users(sources: Vec<SourceData>, users: &BTreeSet<UserId>) -> Vec<SourceData> {
    sources
        .into_iter()
        .map(|mut source| {
            source
                .interactions
                .retain(|row| users.contains(&row.user_id));
            source
        })
        .collect()
}

/// Apply `scope` to loaded sources.
pub fn apply_scope(
    sources: Vec<SourceData>,
    scope: &UserScope,
) -> Result<(Vec<SourceData>, ScopeReport), PipelineError> {
    let users_before = users_of(&sources).len();
    let before: usize = sources.iter().map(SourceData::len).sum();
    let keep = match scope {
        UserScope::All => {
            return Ok((
                sources,
                ScopeReport {
                    users_before,
                    users_kept: users_before,
                    interactions_dropped: 0,
                },
            ));
        }
        UserScope::SimulatedOnly => {
            if !sources.iter().any(|s| s.role == SourceRole::Simulated) {
                return Err(PipelineError::Configuration(
                    "simulated-only scope requires at least one simulated source".to_string(),
                ));
            }
            users_of(sources.iter().filter(|s| s.role == SourceRole::Simulated))
        }
        UserScope::Active {
            min_interactions,
            max_users,
            seed,
        } => select_active_users(&sources, *min_interactions, *max_users, *seed),
    };
    let scoped = restrict_to_users(sources, &keep);
    let after: usize = scoped.iter().map(SourceData::len).sum();
    let report = ScopeReport {
        users_before,
        users_kept: users_of(&scoped).len(),
        interactions_dropped: before - after,
    };
    info!(
        scope = ?scope,
        users_before = report.users_before,
        users_kept = report.users_kept,
        dropped = report.interactions_dropped,
        "[evalset:scope] users scoped"
    );
    Ok((scoped, report))
}

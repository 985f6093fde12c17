//! Per-user seen-set built across every ingested source.
//!
//! The seen-set is the only guard against negative-sampling leakage: it must be
//! built from every source (train, dev, test, simulated), including sources a
//! given variant leaves out of its train pool.

use std::collections::HashMap;

use ahash::AHashSet;
use tracing::info;

use crate::data::{Interaction, SourceData};
use crate::types::{ItemId, UserId};

/// Counts gathered while merging sources into a [`SeenSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Sources merged.
    pub sources: usize,
    /// Interactions merged (before set deduplication).
    pub interactions: usize,
    /// Distinct users after merging.
    pub users: usize,
    /// Malformed records skipped by source readers.
    pub malformed: usize,
}

/// Mapping `user_id -> items interacted with`, merged across sources.
///
/// Items are only ever added; merging is commutative and associative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeenSet {
    by_user: HashMap<UserId, AHashSet<ItemId>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from every source, returning the merge report alongside.
    pub fn from_sources(sources: &[SourceData]) -> (Self, MergeReport) {
        let mut seen = Self::new();
        let mut report = MergeReport::default();
        for source in sources {
            seen.extend(&source.interactions);
            report.sources += 1;
            report.interactions += source.len();
            report.malformed += source.malformed;
        }
        report.users = seen.users();
        info!(
            sources = report.sources,
            users = report.users,
            interactions = report.interactions,
            malformed = report.malformed,
            "[evalset:history] seen-set built"
        );
        (seen, report)
    }

    /// Record one interaction.
    pub fn insert(&mut self, user_id: UserId, item_id: ItemId) -> bool {
        self.by_user.entry(user_id).or_default().insert(item_id)
    }

    /// Record every interaction of a source.
    pub fn extend<'a>(&mut self, interactions: impl IntoIterator<Item = &'a Interaction>) {
        for interaction in interactions {
            self.insert(interaction.user_id, interaction.item_id);
        }
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, other: &SeenSet) {
        for (user_id, items) in &other.by_user {
            self.by_user
                .entry(*user_id)
                .or_default()
                .extend(items.iter().copied());
        }
    }

    pub fn contains(&self, user_id: UserId, item_id: ItemId) -> bool {
        self.by_user
            .get(&user_id)
            .is_some_and(|items| items.contains(&item_id))
    }

    /// Items seen by `user_id`, if the user occurs in any source.
    pub fn items(&self, user_id: UserId) -> Option<&AHashSet<ItemId>> {
        self.by_user.get(&user_id)
    }

    /// Number of items seen by `user_id`.
    pub fn item_count(&self, user_id: UserId) -> usize {
        self.by_user.get(&user_id).map_or(0, |items| items.len())
    }

    /// Number of distinct users.
    pub fn users(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// Iterate `(user_id, items)` in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, &AHashSet<ItemId>)> {
        self.by_user.iter().map(|(user, items)| (*user, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceRole;

    fn source(id: &str, role: SourceRole, rows: &[(u64, u64)]) -> SourceData {
        SourceData::new(
            id,
            role,
            rows.iter()
                .map(|(user, item)| Interaction::new(*user, *item, 1))
                .collect(),
        )
    }

    #[test]
    fn merges_human_and_simulated_histories() {
        let human = source("train", SourceRole::Train, &[(1, 10), (1, 11), (2, 20)]);
        let agent = source("agent", SourceRole::Simulated, &[(1, 30), (1, 11)]);
        let (seen, report) = SeenSet::from_sources(&[human, agent]);

        let mut user_one: Vec<_> = seen.items(1).unwrap().iter().copied().collect();
        user_one.sort_unstable();
        assert_eq!(user_one, vec![10, 11, 30]);
        assert_eq!(seen.item_count(2), 1);
        assert_eq!(report.users, 2);
        assert_eq!(report.interactions, 5);
        assert_eq!(report.sources, 2);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = source("a", SourceRole::Train, &[(1, 1), (2, 2)]);
        let b = source("b", SourceRole::Dev, &[(1, 3), (3, 3)]);
        let c = source("c", SourceRole::Simulated, &[(2, 1), (1, 1)]);
        let (abc, _) = SeenSet::from_sources(&[a.clone(), b.clone(), c.clone()]);
        let (cba, _) = SeenSet::from_sources(&[c.clone(), b.clone(), a.clone()]);
        assert_eq!(abc, cba);

        let (left, _) = SeenSet::from_sources(&[a.clone(), b.clone()]);
        let (right, _) = SeenSet::from_sources(&[c]);
        let mut grouped = left;
        grouped.merge(&right);
        assert_eq!(grouped, abc);
    }

    #[test]
    fn merging_never_shrinks_a_user() {
        let mut seen = SeenSet::new();
        seen.insert(1, 10);
        let before = seen.item_count(1);
        let mut other = SeenSet::new();
        other.insert(1, 10);
        other.insert(2, 5);
        seen.merge(&other);
        assert!(seen.item_count(1) >= before);
        assert!(seen.contains(1, 10));
        assert!(seen.contains(2, 5));
        assert!(!seen.contains(3, 10));
    }

    #[test]
    fn malformed_counts_surface_in_report() {
        let data = source("train", SourceRole::Train, &[(1, 1)]).with_malformed(3);
        let (_, report) = SeenSet::from_sources(&[data, source("dev", SourceRole::Dev, &[])]);
        assert_eq!(report.malformed, 3);
        assert_eq!(report.sources, 2);
    }
}

//! Global population of negative-sampling candidates.

use ahash::AHashSet;
use tracing::info;

use crate::data::{Interaction, SourceData};
use crate::history::SeenSet;
use crate::types::{ItemId, UserId};

/// Every distinct item referenced by any ingested source.
///
/// Items are kept sorted so seeded draws index a stable population.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemUniverse {
    items: Vec<ItemId>,
    members: AHashSet<ItemId>,
}

impl ItemUniverse {
    /// Union of item ids over `sources`, including simulation-only items.
    pub fn from_sources(sources: &[SourceData]) -> Self {
        let mut universe = Self::default();
        for source in sources {
            universe.extend(&source.interactions);
        }
        info!(items = universe.len(), "[evalset:universe] item universe built");
        universe
    }

    /// Add the items of `interactions`.
    pub fn extend<'a>(&mut self, interactions: impl IntoIterator<Item = &'a Interaction>) {
        let before = self.items.len();
        for interaction in interactions {
            if self.members.insert(interaction.item_id) {
                self.items.push(interaction.item_id);
            }
        }
        if self.items.len() != before {
            self.items.sort_unstable();
        }
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.members.contains(&item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sorted item ids.
    pub fn as_slice(&self) -> &[ItemId] {
        &self.items
    }

    /// Candidates available to `user_id` for target `item_id`:
    /// `|universe \ (seen(user) ∪ {item})|`.
    pub fn eligible_count(&self, seen: &SeenSet, user_id: UserId, item_id: ItemId) -> usize {
        let mut excluded = match seen.items(user_id) {
            Some(items) => items.iter().filter(|item| self.contains(**item)).count(),
            None => 0,
        };
        if self.contains(item_id) && !seen.contains(user_id, item_id) {
            excluded += 1;
        }
        self.len() - excluded
    }
}

impl FromIterator<ItemId> for ItemUniverse {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        let members: AHashSet<ItemId> = iter.into_iter().collect();
        let mut items: Vec<ItemId> = members.iter().copied().collect();
        items.sort_unstable();
        Self { items, members }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SourceRole;

    #[test]
    fn simulated_only_items_are_candidates() {
        let human = SourceData::new(
            "train",
            SourceRole::Train,
            vec![Interaction::new(1, 10, 1), Interaction::new(2, 20, 1)],
        );
        let agent = SourceData::new(
            "agent",
            SourceRole::Simulated,
            vec![Interaction::new(1, 30, 1), Interaction::new(1, 10, 1)],
        );
        let universe = ItemUniverse::from_sources(&[human, agent]);
        assert_eq!(universe.as_slice(), &[10, 20, 30]);
        assert!(universe.contains(30));
    }

    #[test]
    fn eligible_count_excludes_seen_and_target() {
        let universe: ItemUniverse = [10, 11, 20, 30, 40].into_iter().collect();
        let mut seen = SeenSet::new();
        for item in [10, 11, 30] {
            seen.insert(1, item);
        }
        assert_eq!(universe.eligible_count(&seen, 1, 10), 2);
        // target outside the user's seen-set still counts as excluded
        assert_eq!(universe.eligible_count(&seen, 1, 20), 1);
        assert_eq!(universe.eligible_count(&seen, 7, 40), 4);
    }

    #[test]
    fn extend_keeps_items_sorted_and_unique() {
        let mut universe: ItemUniverse = [5, 1].into_iter().collect();
        universe.extend(&[Interaction::new(1, 3, 1), Interaction::new(2, 5, 1)]);
        assert_eq!(universe.as_slice(), &[1, 3, 5]);
    }
}

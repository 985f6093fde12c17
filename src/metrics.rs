use indexmap::IndexMap;

use crate::types::SourceId;

/// Per-source share of an assembled train pool.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceShare {
    pub source: SourceId,
    pub count: usize,
    pub share: f64,
}

/// How a train pool splits across the sources that fed it.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolComposition {
    pub total: usize,
    pub sources: usize,
    pub max_share: f64,
    pub min_share: f64,
    pub per_source: Vec<SourceShare>,
}

impl PoolComposition {
    /// Share contributed by `source`, or `0.0` if it contributed nothing.
    pub fn share_of(&self, source: &str) -> f64 {
        self.per_source
            .iter()
            .find(|entry| entry.source == source)
            .map_or(0.0, |entry| entry.share)
    }
}

/// Compute shares from per-source kept counts, in processing order.
pub fn pool_composition(counts: &IndexMap<SourceId, usize>) -> Option<PoolComposition> {
    if counts.is_empty() {
        return None;
    }
    let total: usize = counts.values().sum();
    let share = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let per_source: Vec<SourceShare> = counts
        .iter()
        .map(|(source, count)| SourceShare {
            source: source.clone(),
            count: *count,
            share: share(*count),
        })
        .collect();
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    Some(PoolComposition {
        total,
        sources: counts.len(),
        max_share: share(max),
        min_share: share(min),
        per_source,
    })
}

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::{ItemId, UserId};

pub fn stable_hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

/// Seed for one evaluation row, independent of scheduling order.
pub fn row_seed(base: u64, row_index: usize, user_id: UserId, item_id: ItemId) -> u64 {
    stable_hash_with(|hasher| {
        base.hash(hasher);
        (row_index as u64).hash(hasher);
        user_id.hash(hasher);
        item_id.hash(hasher);
    })
}

/// Seed for a named stream derived from a base seed (e.g. `"dev"`, `"test"`).
pub fn stream_seed(base: u64, stream: &str) -> u64 {
    stable_hash_with(|hasher| {
        base.hash(hasher);
        stream.hash(hasher);
    })
}

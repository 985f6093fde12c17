use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::roles::{DEV_TIME, SIMULATED_TIME, TEST_TIME, TRAIN_TIME};
use crate::types::{ItemId, LogMessage, Rating, SourceId, Timestamp, UserId, VariantName};

/// One recorded or simulated user-item event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl Interaction {
    /// Build an unrated interaction.
    pub fn new(user_id: UserId, item_id: ItemId, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            item_id,
            timestamp,
            rating: None,
        }
    }

    /// Attach a rating.
    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Validate raw fields as read from a source.
    ///
    /// Missing or negative identifiers yield a [`MalformedRecord`].
    pub fn from_fields(
        user_id: Option<i64>,
        item_id: Option<i64>,
        timestamp: Timestamp,
        rating: Option<Rating>,
    ) -> Result<Self, MalformedRecord> {
        let user_id = match user_id {
            None => return Err(MalformedRecord::new("missing user_id")),
            Some(raw) => u64::try_from(raw)
                .map_err(|_| MalformedRecord::new(format!("negative user_id {raw}")))?,
        };
        let item_id = match item_id {
            None => return Err(MalformedRecord::new("missing item_id")),
            Some(raw) => u64::try_from(raw)
                .map_err(|_| MalformedRecord::new(format!("negative item_id {raw}")))?,
        };
        Ok(Self {
            user_id,
            item_id,
            timestamp,
            rating,
        })
    }

    /// `(user_id, item_id)` key used for train-pool deduplication.
    pub fn key(&self) -> (UserId, ItemId) {
        (self.user_id, self.item_id)
    }
}

/// A raw record that could not be turned into an [`Interaction`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedRecord {
    pub reason: LogMessage,
}

impl MalformedRecord {
    pub fn new(reason: impl Into<LogMessage>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// What a source contributes to the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceRole {
    /// Historical human training log.
    Train,
    /// Held-out validation targets.
    Dev,
    /// Held-out test targets.
    Test,
    /// Agent-simulated log; candidate train-pool material.
    Simulated,
}

impl SourceRole {
    /// Time stamped onto records whose source carries no timestamps.
    pub fn default_time(self) -> Timestamp {
        match self {
            SourceRole::Train => TRAIN_TIME,
            SourceRole::Dev => DEV_TIME,
            SourceRole::Test => TEST_TIME,
            SourceRole::Simulated => SIMULATED_TIME,
        }
    }

    /// Whether rows of this role may enter a train pool.
    pub fn feeds_train_pool(self) -> bool {
        matches!(self, SourceRole::Train | SourceRole::Simulated)
    }

    /// Whether rows of this role are evaluation targets.
    pub fn is_evaluation(self) -> bool {
        matches!(self, SourceRole::Dev | SourceRole::Test)
    }
}

/// Interactions loaded from one source, plus the count of skipped records.
#[derive(Clone, Debug)]
pub struct SourceData {
    pub id: SourceId,
    pub role: SourceRole,
    pub interactions: Vec<Interaction>,
    pub malformed: usize,
}

impl SourceData {
    pub fn new(id: impl Into<SourceId>, role: SourceRole, interactions: Vec<Interaction>) -> Self {
        Self {
            id: id.into(),
            role,
            interactions,
            malformed: 0,
        }
    }

    pub fn with_malformed(mut self, malformed: usize) -> Self {
        self.malformed = malformed;
        self
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// Ordered negatives drawn for exactly one evaluation target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeSampleSet(pub Vec<ItemId>);

impl NegativeSampleSet {
    pub fn items(&self) -> &[ItemId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders as a bracketed list, e.g. `[120, 45, 999]`.
impl fmt::Display for NegativeSampleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, item) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        f.write_str("]")
    }
}

/// A dev/test target paired with its negatives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalRow {
    pub target: Interaction,
    pub negatives: NegativeSampleSet,
}

/// Train, dev and test tables for one named experiment configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetVariant {
    pub name: VariantName,
    pub train: Vec<Interaction>,
    pub dev: Vec<EvalRow>,
    pub test: Vec<EvalRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_sample_set_renders_as_list_literal() {
        let set = NegativeSampleSet(vec![120, 45, 999]);
        assert_eq!(set.to_string(), "[120, 45, 999]");
        assert_eq!(NegativeSampleSet::default().to_string(), "[]");
    }

    #[test]
    fn from_fields_rejects_missing_and_negative_ids() {
        assert!(Interaction::from_fields(None, Some(1), 1, None).is_err());
        assert!(Interaction::from_fields(Some(1), None, 1, None).is_err());
        let err = Interaction::from_fields(Some(-3), Some(1), 1, None).unwrap_err();
        assert!(err.reason.contains("negative user_id"));
        let ok = Interaction::from_fields(Some(7), Some(9), 2, Some(5)).unwrap();
        assert_eq!(ok, Interaction::new(7, 9, 2).with_rating(5));
    }

    #[test]
    fn role_defaults_follow_split_order() {
        assert_eq!(SourceRole::Train.default_time(), 1);
        assert_eq!(SourceRole::Dev.default_time(), 2);
        assert_eq!(SourceRole::Test.default_time(), 3);
        assert!(SourceRole::Simulated.feeds_train_pool());
        assert!(!SourceRole::Dev.feeds_train_pool());
        assert!(SourceRole::Test.is_evaluation());
    }
}

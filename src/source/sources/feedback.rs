use std::path::PathBuf;

use serde::Deserialize;
use tracing::{info, warn};

use crate::constants::output::DELIMITER;
use crate::constants::sources::SKIP_MALFORMED_MSG;
use crate::data::{Interaction, SourceData, SourceRole};
use crate::errors::PipelineError;
use crate::source::{InteractionSource, ensure_exists};
use crate::types::{Rating, SourceId, Timestamp};

/// Reads a tab-separated table with a header row.
///
/// Recognized columns: `user_id`, `item_id` (required per row), `rating` and
/// `time` (optional). Extra columns such as `neg_items` are ignored, so
/// previously published dev/test tables can be re-read as sources.
pub struct FeedbackTableSource {
    id: SourceId,
    role: SourceRole,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FeedbackRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    user_id: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    item_id: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rating: Option<Rating>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    time: Option<Timestamp>,
}

impl FeedbackTableSource {
    pub fn new(id: impl Into<SourceId>, role: SourceRole, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            role,
            path: path.into(),
        }
    }
}

impl InteractionSource for FeedbackTableSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn load(&self) -> Result<SourceData, PipelineError> {
        ensure_exists(&self.id, &self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;
        let default_time = self.role.default_time();
        let mut interactions = Vec::new();
        let mut malformed = 0usize;
        for (row_no, row) in reader.deserialize::<FeedbackRow>().enumerate() {
            let parsed = row.map_err(|err| err.to_string()).and_then(|row| {
                Interaction::from_fields(
                    row.user_id,
                    row.item_id,
                    row.time.unwrap_or(default_time),
                    row.rating,
                )
                .map_err(|record| record.reason)
            });
            match parsed {
                Ok(interaction) => interactions.push(interaction),
                Err(reason) => {
                    warn!(
                        source = %self.id,
                        row = row_no + 1,
                        %reason,
                        "[evalset:source] {}",
                        SKIP_MALFORMED_MSG
                    );
                    malformed += 1;
                }
            }
        }
        info!(
            source = %self.id,
            path = %self.path.display(),
            interactions = interactions.len(),
            malformed,
            "[evalset:source] feedback table loaded"
        );
        Ok(SourceData::new(self.id.clone(), self.role, interactions).with_malformed(malformed))
    }
}

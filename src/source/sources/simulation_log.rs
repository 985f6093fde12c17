use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::constants::sources::{SIMULATION_LOG_EXTENSION, SKIP_MALFORMED_MSG};
use crate::data::{Interaction, MalformedRecord, SourceData, SourceRole};
use crate::errors::PipelineError;
use crate::source::{InteractionSource, ensure_exists};
use crate::types::{Rating, SourceId, Timestamp, UserId};

/// Reads a directory of `<user_id>.json` simulation logs.
///
/// Each file maps a page key to the items viewed on that page and the ratings
/// given to them, positionally paired:
///
/// ```json
/// { "0": { "watch_id": [30, 11], "rating": [5, 2] } }
/// ```
///
/// Items without a matching rating are kept unrated. Unreadable files and
/// non-numeric file stems count as one malformed record each.
pub struct SimulationLogSource {
    id: SourceId,
    role: SourceRole,
    root: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct SimulationPage {
    #[serde(default)]
    watch_id: Vec<Value>,
    #[serde(default)]
    rating: Vec<Value>,
}

impl SimulationLogSource {
    pub fn new(id: impl Into<SourceId>, role: SourceRole, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            role,
            root: root.into(),
        }
    }

    fn log_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == SIMULATION_LOG_EXTENSION)
            })
            .collect();
        paths.sort();
        paths
    }

    fn read_log(&self, path: &Path) -> Result<(Vec<Interaction>, usize), MalformedRecord> {
        let user_id = user_id_from_stem(path)?;
        let body = fs::read_to_string(path)
            .map_err(|err| MalformedRecord::new(format!("unreadable log: {err}")))?;
        parse_simulation_log(user_id, &body, self.role.default_time())
    }
}

fn user_id_from_stem(path: &Path) -> Result<UserId, MalformedRecord> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<UserId>().ok())
        .ok_or_else(|| {
            MalformedRecord::new(format!(
                "log file '{}' is not named after a user id",
                path.display()
            ))
        })
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|v| {
                    v.is_finite()
                        && v.fract() == 0.0
                        && *v >= i64::MIN as f64
                        && *v < i64::MAX as f64
                })
                .map(|v| v as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parse one user's log body.
///
/// Returns the interactions and the number of malformed item entries.
pub fn parse_simulation_log(
    user_id: UserId,
    body: &str,
    time: Timestamp,
) -> Result<(Vec<Interaction>, usize), MalformedRecord> {
    let pages: BTreeMap<String, SimulationPage> = serde_json::from_str(body)
        .map_err(|err| MalformedRecord::new(format!("invalid log for user {user_id}: {err}")))?;
    let mut ordered: Vec<(&String, &SimulationPage)> = pages.iter().collect();
    ordered.sort_by_key(|(key, _)| (key.parse::<u64>().ok(), (*key).clone()));

    let mut interactions = Vec::new();
    let mut malformed = 0usize;
    for (_, page) in ordered {
        for (idx, raw_item) in page.watch_id.iter().enumerate() {
            let rating = page
                .rating
                .get(idx)
                .and_then(value_as_i64)
                .and_then(|raw| Rating::try_from(raw).ok());
            match value_as_i64(raw_item).and_then(|raw| u64::try_from(raw).ok()) {
                Some(item_id) => interactions.push(Interaction {
                    rating,
                    ..Interaction::new(user_id, item_id, time)
                }),
                None => malformed += 1,
            }
        }
    }
    Ok((interactions, malformed))
}

impl InteractionSource for SimulationLogSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn load(&self) -> Result<SourceData, PipelineError> {
        ensure_exists(&self.id, &self.root)?;
        if !self.root.is_dir() {
            return Err(PipelineError::SourceUnavailable {
                source_id: self.id.clone(),
                reason: format!("'{}' is not a directory", self.root.display()),
            });
        }
        let paths = self.log_paths();
        let mut interactions = Vec::new();
        let mut malformed = 0usize;
        for path in &paths {
            match self.read_log(path) {
                Ok((rows, skipped)) => {
                    interactions.extend(rows);
                    malformed += skipped;
                }
                Err(record) => {
                    warn!(
                        source = %self.id,
                        path = %path.display(),
                        reason = %record,
                        "[evalset:source] {}",
                        SKIP_MALFORMED_MSG
                    );
                    malformed += 1;
                }
            }
        }
        info!(
            source = %self.id,
            users = paths.len(),
            interactions = interactions.len(),
            malformed,
            "[evalset:source] simulation logs loaded"
        );
        Ok(SourceData::new(self.id.clone(), self.role, interactions).with_malformed(malformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pages_pair_items_with_ratings_positionally() {
        let body = r#"{"1": {"watch_id": [40], "rating": []},
                       "0": {"watch_id": [30, 11], "rating": [5, 2]}}"#;
        let (rows, malformed) = parse_simulation_log(1, body, 1).unwrap();
        assert_eq!(malformed, 0);
        assert_eq!(
            rows,
            vec![
                Interaction::new(1, 30, 1).with_rating(5),
                Interaction::new(1, 11, 1).with_rating(2),
                Interaction::new(1, 40, 1),
            ]
        );
    }

    #[test]
    fn numeric_page_keys_sort_numerically() {
        let body = r#"{"10": {"watch_id": [2]}, "2": {"watch_id": [1]}}"#;
        let (rows, _) = parse_simulation_log(5, body, 1).unwrap();
        let items: Vec<u64> = rows.iter().map(|row| row.item_id).collect();
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn string_and_float_ids_are_accepted_garbage_is_counted() {
        let body =
            r#"{"0": {"watch_id": ["12", 13.0, null, -1, 1e30, 2.5, 18446744073709551615], "rating": ["4"]}}"#;
        let (rows, malformed) = parse_simulation_log(9, body, 1).unwrap();
        assert_eq!(
            rows,
            vec![
                Interaction::new(9, 12, 1).with_rating(4),
                Interaction::new(9, 13, 1)
            ]
        );
        assert_eq!(malformed, 5);
    }

    #[test]
    fn load_skips_unparsable_files_and_bad_names() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("1.json"),
            r#"{"0": {"watch_id": [30, 11], "rating": [5, 2]}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("2.json"), "not json").unwrap();
        fs::write(dir.path().join("agent.json"), r#"{}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let data = SimulationLogSource::new("agent", SourceRole::Simulated, dir.path())
            .load()
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.malformed, 2);
        assert_eq!(data.role, SourceRole::Simulated);
    }
}

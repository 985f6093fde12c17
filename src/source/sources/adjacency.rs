use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::constants::sources::SKIP_MALFORMED_MSG;
use crate::data::{Interaction, MalformedRecord, SourceData, SourceRole};
use crate::errors::PipelineError;
use crate::source::{InteractionSource, ensure_exists};
use crate::types::{SourceId, Timestamp};

/// Reads `user_id item_id item_id ...` lines.
///
/// Every interaction receives the role's default time and no rating.
pub struct AdjacencyListSource {
    id: SourceId,
    role: SourceRole,
    path: PathBuf,
}

impl AdjacencyListSource {
    pub fn new(id: impl Into<SourceId>, role: SourceRole, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            role,
            path: path.into(),
        }
    }
}

/// Parsed content of one adjacency line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AdjacencyLine {
    pub interactions: Vec<Interaction>,
    pub malformed: Vec<MalformedRecord>,
}

/// Parse one line. Lines with fewer than two tokens carry no pair and yield `None`.
pub fn parse_adjacency_line(line: &str, time: Timestamp) -> Option<AdjacencyLine> {
    let mut tokens = line.split_whitespace();
    let user_token = tokens.next()?;
    let items: Vec<&str> = tokens.collect();
    if items.is_empty() {
        return None;
    }
    let mut parsed = AdjacencyLine::default();
    let Ok(user_id) = user_token.parse::<u64>() else {
        parsed.malformed.push(MalformedRecord::new(format!(
            "user token '{user_token}' is not a non-negative integer"
        )));
        return Some(parsed);
    };
    for token in items {
        match token.parse::<u64>() {
            Ok(item_id) => parsed
                .interactions
                .push(Interaction::new(user_id, item_id, time)),
            Err(_) => parsed.malformed.push(MalformedRecord::new(format!(
                "item token '{token}' for user {user_id} is not a non-negative integer"
            ))),
        }
    }
    Some(parsed)
}

impl InteractionSource for AdjacencyListSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    fn load(&self) -> Result<SourceData, PipelineError> {
        ensure_exists(&self.id, &self.path)?;
        let reader = BufReader::new(File::open(&self.path)?);
        let time = self.role.default_time();
        let mut interactions = Vec::new();
        let mut malformed = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let Some(parsed) = parse_adjacency_line(&line, time) else {
                continue;
            };
            for record in &parsed.malformed {
                warn!(
                    source = %self.id,
                    line = line_no + 1,
                    reason = %record,
                    "[evalset:source] {}",
                    SKIP_MALFORMED_MSG
                );
            }
            malformed += parsed.malformed.len();
            interactions.extend(parsed.interactions);
        }
        info!(
            source = %self.id,
            path = %self.path.display(),
            interactions = interactions.len(),
            malformed,
            "[evalset:source] adjacency list loaded"
        );
        Ok(SourceData::new(self.id.clone(), self.role, interactions).with_malformed(malformed))
    }
}

//! Ordered field-lookup rules for history records.
//!
//! Services disagree on where a record keeps its id, path and timestamp, so
//! each value is described as a list of JSON key paths tried in order; the
//! first non-empty value wins.

use crate::service::EntityKind;
use serde_json::Value;

/// A JSON key path such as `["data", "path"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule(pub &'static [&'static str]);

impl FieldRule {
    pub fn lookup<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        let mut cur = record;
        for key in self.0 {
            cur = cur.get(*key)?;
        }
        Some(cur)
    }
}

pub const TIMESTAMP_RULES: &[FieldRule] = &[FieldRule(&["date"]), FieldRule(&["eventDate"])];

pub const EVENT_KIND_RULES: &[FieldRule] = &[FieldRule(&["eventType"])];

pub const PATH_RULES: &[FieldRule] = &[
    FieldRule(&["data", "path"]),
    FieldRule(&["data", "importedPath"]),
    FieldRule(&["data", "droppedPath"]),
    FieldRule(&["data", "movieFilePath"]),
    FieldRule(&["movieFilePath"]),
    FieldRule(&["sourceTitle"]),
];

const MOVIE_ID_RULES: &[FieldRule] = &[FieldRule(&["movieId"]), FieldRule(&["movie", "id"])];

const EPISODE_ID_RULES: &[FieldRule] =
    &[FieldRule(&["episodeId"]), FieldRule(&["episode", "id"])];

pub fn entity_id_rules(kind: EntityKind) -> &'static [FieldRule] {
    match kind {
        EntityKind::Movie => MOVIE_ID_RULES,
        EntityKind::Episode => EPISODE_ID_RULES,
    }
}

/// First rule yielding a non-empty string.
pub fn first_str<'v>(record: &'v Value, rules: &[FieldRule]) -> Option<&'v str> {
    rules
        .iter()
        .filter_map(|rule| rule.lookup(record))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First rule yielding a positive integer (number or numeric string).
pub fn first_id(record: &Value, rules: &[FieldRule]) -> Option<i64> {
    rules
        .iter()
        .find_map(|rule| crate::service::positive_i64(rule.lookup(record)))
}

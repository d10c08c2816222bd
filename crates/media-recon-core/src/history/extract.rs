use super::rules::{self, FieldRule};
use super::HistoryRecord;
use crate::paths::normalize_library_path;
use crate::service::EntityKind;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// A "file deleted" history record narrowed to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEvent {
    pub entity_id: i64,
    /// Normalized root-relative path, when the record carried one.
    pub deleted_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    pub deletions: usize,
    pub not_deletion: usize,
    /// Deletions whose timestamp could not be parsed.
    pub missing_timestamp: usize,
    pub missing_entity_id: usize,
    pub missing_path: usize,
}

pub struct DeletionExtractor {
    kind: EntityKind,
    id_rules: &'static [FieldRule],
}

impl DeletionExtractor {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            id_rules: rules::entity_id_rules(kind),
        }
    }

    /// True when the event kind mentions "deleted", case-insensitively.
    pub fn is_deletion(record: &HistoryRecord) -> bool {
        record
            .event_kind()
            .map(|k| k.to_ascii_lowercase().contains("deleted"))
            .unwrap_or(false)
    }

    pub fn extract(&self, record: &HistoryRecord, stats: &mut ExtractStats) -> Option<DeletionEvent> {
        if !Self::is_deletion(record) {
            stats.not_deletion += 1;
            return None;
        }
        let Some(timestamp) = record.timestamp() else {
            stats.missing_timestamp += 1;
            return None;
        };
        let Some(entity_id) = rules::first_id(record.raw(), self.id_rules) else {
            debug!("Deletion record without {} id skipped", self.kind);
            stats.missing_entity_id += 1;
            return None;
        };

        let deleted_path = rules::first_str(record.raw(), rules::PATH_RULES)
            .map(|raw| normalize_library_path(raw, self.kind.root()))
            .filter(|p| !p.is_empty());
        if deleted_path.is_none() {
            stats.missing_path += 1;
        }

        stats.deletions += 1;
        Some(DeletionEvent {
            entity_id,
            deleted_path,
            timestamp,
        })
    }

    pub fn extract_all<'r, I>(&self, records: I) -> (Vec<DeletionEvent>, ExtractStats)
    where
        I: IntoIterator<Item = &'r HistoryRecord>,
    {
        let mut stats = ExtractStats::default();
        let events = records
            .into_iter()
            .filter_map(|r| self.extract(r, &mut stats))
            .collect();
        (events, stats)
    }
}

/// Keep the first event seen for each entity id, preserving feed order.
pub fn dedupe_first_seen(events: Vec<DeletionEvent>) -> Vec<DeletionEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(e.entity_id))
        .collect()
}

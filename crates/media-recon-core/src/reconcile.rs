use crate::history::DeletionEvent;
use crate::paths::split_any_sep;
use crate::probe::{CurrentStateProbe, ProbeOutcome};
use crate::progress::ProgressReporter;
use crate::service::{EntityKind, LibraryCatalog};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// A deleted entity that has a file again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub entity_id: i64,
    pub container_id: Option<i64>,
    pub deleted_path: Option<String>,
    pub current_path: String,
}

/// A deleted entity with no resolvable current file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillMissing {
    pub entity_id: i64,
    pub container_id: Option<i64>,
    pub deleted_path: Option<String>,
    pub outcome: ProbeOutcome,
}

/// Disjoint partition of every distinct deleted entity id.
#[derive(Debug, Default, Clone)]
pub struct Reconciliation {
    pub restored: Vec<Restored>,
    pub still_missing: Vec<StillMissing>,
}

impl Reconciliation {
    pub fn total(&self) -> usize {
        self.restored.len() + self.still_missing.len()
    }

    pub fn missing_ids(&self) -> Vec<i64> {
        self.still_missing.iter().map(|m| m.entity_id).collect()
    }

    /// Deleted paths of still-missing entities, sorted. Entities whose
    /// deletion record had no path are left out.
    pub fn missing_paths_sorted(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .still_missing
            .iter()
            .filter_map(|m| m.deleted_path.as_deref())
            .collect();
        paths.sort_unstable();
        paths
    }

    pub fn restored_paths_sorted(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.restored.iter().map(|r| r.current_path.as_str()).collect();
        paths.sort_unstable();
        paths
    }

    /// Number of still-missing entities whose probe failed outright.
    pub fn probe_failures(&self) -> usize {
        self.still_missing
            .iter()
            .filter(|m| matches!(m.outcome, ProbeOutcome::Failed(_)))
            .count()
    }
}

/// Probe each (already de-duplicated) deletion and partition the entities.
pub fn classify_deletions<C: LibraryCatalog + ?Sized>(
    events: &[DeletionEvent],
    probe: &mut CurrentStateProbe<'_, C>,
    reporter: &dyn ProgressReporter,
) -> Reconciliation {
    let started = Instant::now();
    let total = events.len();
    reporter.on_probe_start(total);

    let mut result = Reconciliation::default();
    for (idx, event) in events.iter().enumerate() {
        let state = probe.probe(event.entity_id);
        match state.outcome {
            ProbeOutcome::Present(current_path) => result.restored.push(Restored {
                entity_id: event.entity_id,
                container_id: state.container_id,
                deleted_path: event.deleted_path.clone(),
                current_path,
            }),
            outcome => result.still_missing.push(StillMissing {
                entity_id: event.entity_id,
                container_id: state.container_id,
                deleted_path: event.deleted_path.clone(),
                outcome,
            }),
        }
        reporter.on_probe_progress(idx + 1, total);
    }

    info!(
        "{} restored, {} still missing ({} probe failures)",
        result.restored.len(),
        result.still_missing.len(),
        result.probe_failures()
    );
    reporter.on_probe_complete(
        result.restored.len(),
        result.still_missing.len(),
        started.elapsed().as_secs_f64(),
    );
    result
}

/// Collection folder of a movie path: `movies/Library/Collection/Movie` gives
/// `Collection`, `movies/Collection/Movie` gives `Collection`.
pub fn collection_of(path: &str) -> String {
    let segs = split_any_sep(path);
    match segs.len() {
        n if n >= 3 => segs[2].to_string(),
        2 => segs[1].to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Per-group counts for both halves of a reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub missing: BTreeMap<String, usize>,
    pub restored: BTreeMap<String, usize>,
}

/// Movies group by collection folder; episodes by series title (fetched
/// through the run cache, so each series is looked up once).
pub fn summarize<C: LibraryCatalog + ?Sized>(
    result: &Reconciliation,
    probe: &mut CurrentStateProbe<'_, C>,
) -> GroupSummary {
    let mut summary = GroupSummary::default();
    let kind = probe.catalog().kind();

    for m in &result.still_missing {
        let label = group_label(kind, m.container_id, m.deleted_path.as_deref(), probe);
        *summary.missing.entry(label).or_default() += 1;
    }
    for r in &result.restored {
        let label = group_label(kind, r.container_id, Some(&r.current_path), probe);
        *summary.restored.entry(label).or_default() += 1;
    }
    summary
}

fn group_label<C: LibraryCatalog + ?Sized>(
    kind: EntityKind,
    container_id: Option<i64>,
    path: Option<&str>,
    probe: &mut CurrentStateProbe<'_, C>,
) -> String {
    match (kind, container_id) {
        (EntityKind::Episode, Some(id)) => {
            let catalog = probe.catalog();
            probe.cache().container_title(catalog, id)
        }
        _ => path.map(collection_of).unwrap_or_else(|| "Unknown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_of() {
        assert_eq!(collection_of("movies/Library/Unwatched/Movie/m.mkv"), "Unwatched");
        assert_eq!(collection_of("movies/Kids"), "Kids");
        assert_eq!(collection_of("movies"), "Unknown");
    }

    #[test]
    fn test_sorted_outputs_skip_pathless() {
        let result = Reconciliation {
            restored: vec![
                Restored {
                    entity_id: 1,
                    container_id: None,
                    deleted_path: None,
                    current_path: "movies/b.mkv".into(),
                },
                Restored {
                    entity_id: 2,
                    container_id: None,
                    deleted_path: None,
                    current_path: "movies/a.mkv".into(),
                },
            ],
            still_missing: vec![
                StillMissing {
                    entity_id: 3,
                    container_id: None,
                    deleted_path: Some("movies/z.mkv".into()),
                    outcome: ProbeOutcome::Absent,
                },
                StillMissing {
                    entity_id: 4,
                    container_id: None,
                    deleted_path: None,
                    outcome: ProbeOutcome::Failed("timeout".into()),
                },
            ],
        };
        assert_eq!(result.restored_paths_sorted(), vec!["movies/a.mkv", "movies/b.mkv"]);
        assert_eq!(result.missing_paths_sorted(), vec!["movies/z.mkv"]);
        assert_eq!(result.missing_ids(), vec![3, 4]);
        assert_eq!(result.probe_failures(), 1);
        assert_eq!(result.total(), 4);
    }
}

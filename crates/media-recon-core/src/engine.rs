use crate::config::{AppConfig, HistoryConfig};
use crate::error::Error;
use crate::history::{dedupe_first_seen, DeletionExtractor, ExtractStats, HistoryScanner, ScanMode, ScanStats};
use crate::output::write_lines;
use crate::probe::{CurrentStateProbe, RunCache};
use crate::progress::ProgressReporter;
use crate::reconcile::{classify_deletions, summarize, GroupSummary, Reconciliation};
use crate::remediate::{RemediationExecutor, RemediationReport};
use crate::service::{EntityKind, HistoryFeed, LibraryCatalog};
use crate::window::TimeWindow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

impl ScanMode {
    pub fn paged(config: &HistoryConfig) -> Self {
        ScanMode::Paged {
            page_size: config.page_size,
            overscan_pages: config.overscan_pages,
        }
    }
}

/// `radarr_20250310` for movies deleted on 2025-03-10.
pub fn default_output_prefix(kind: EntityKind, date: &str) -> String {
    format!("{}_{}", kind.service_name(), date.trim().replace('-', ""))
}

/// `<prefix>_missing.txt` and `<prefix>_restored.txt`.
pub fn output_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    let with_suffix = |suffix: &str| {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    };
    (with_suffix("_missing.txt"), with_suffix("_restored.txt"))
}

#[derive(Debug, Clone)]
pub struct DeletionRunOptions {
    pub mode: ScanMode,
    pub output_prefix: PathBuf,
    pub redownload: bool,
}

#[derive(Debug)]
pub struct DeletionRunResult {
    pub window: TimeWindow,
    pub history_duration: Duration,
    pub probe_duration: Duration,
    pub remediation_duration: Duration,
    pub scan_stats: ScanStats,
    pub extract_stats: ExtractStats,
    pub duplicates_dropped: usize,
    pub reconciliation: Reconciliation,
    pub groups: GroupSummary,
    pub container_fetches: usize,
    pub missing_file: PathBuf,
    pub restored_file: PathBuf,
    pub remediation: Option<RemediationReport>,
}

/// Deletion-window reconciliation for one entity kind.
pub struct ReconcileEngine<'a, F: HistoryFeed + ?Sized, C: LibraryCatalog + ?Sized> {
    feed: &'a F,
    catalog: &'a C,
    config: &'a AppConfig,
}

impl<'a, F: HistoryFeed + ?Sized, C: LibraryCatalog + ?Sized> ReconcileEngine<'a, F, C> {
    pub fn new(feed: &'a F, catalog: &'a C, config: &'a AppConfig) -> Self {
        Self {
            feed,
            catalog,
            config,
        }
    }

    /// Run the full pipeline:
    /// 1. Scan the history feed for records inside the window
    /// 2. Extract deletion events, first-seen per entity
    /// 3. Probe current state and partition into restored / still missing
    /// 4. Write both path lists (empty files when nothing is found)
    /// 5. Optionally re-monitor and search for the still-missing set
    pub fn run(
        &self,
        window: TimeWindow,
        options: &DeletionRunOptions,
        reporter: &dyn ProgressReporter,
    ) -> Result<DeletionRunResult, Error> {
        let kind = self.catalog.kind();

        // Phase 1: History
        let history_start = Instant::now();
        let scan = HistoryScanner::new(self.feed, window).scan(options.mode, reporter)?;
        let history_duration = history_start.elapsed();

        // Phase 2: Extract
        let (events, extract_stats) = DeletionExtractor::new(kind).extract_all(&scan.records);
        let before = events.len();
        let events = dedupe_first_seen(events);
        let duplicates_dropped = before - events.len();
        info!(
            "{} deletion event(s) for {} distinct {}(s)",
            before,
            events.len(),
            kind
        );
        debug!("Extraction stats: {:?}", extract_stats);

        // Phase 3: Probe
        let probe_start = Instant::now();
        let mut cache = RunCache::new();
        let mut probe = CurrentStateProbe::new(self.catalog, &mut cache);
        let reconciliation = classify_deletions(&events, &mut probe, reporter);
        let groups = summarize(&reconciliation, &mut probe);
        let probe_duration = probe_start.elapsed();
        let container_fetches = cache.container_fetches();

        // Phase 4: Outputs
        let (missing_file, restored_file) = output_paths(&options.output_prefix);
        let missing_written = write_lines(&missing_file, reconciliation.missing_paths_sorted())?;
        let restored_written = write_lines(&restored_file, reconciliation.restored_paths_sorted())?;
        info!(
            "Wrote {} missing path(s) to {} and {} restored path(s) to {}",
            missing_written,
            missing_file.display(),
            restored_written,
            restored_file.display()
        );

        // Phase 5: Remediation
        let remediation_start = Instant::now();
        let remediation = if options.redownload {
            let executor = RemediationExecutor::new(self.catalog, &self.config.remediation);
            Some(executor.run(&reconciliation.missing_ids(), reporter))
        } else {
            None
        };
        let remediation_duration = remediation_start.elapsed();

        Ok(DeletionRunResult {
            window,
            history_duration,
            probe_duration,
            remediation_duration,
            scan_stats: scan.stats,
            extract_stats,
            duplicates_dropped,
            reconciliation,
            groups,
            container_fetches,
            missing_file,
            restored_file,
            remediation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_prefix() {
        assert_eq!(default_output_prefix(EntityKind::Movie, "2025-03-10"), "radarr_20250310");
        assert_eq!(default_output_prefix(EntityKind::Episode, "2025-03-10"), "sonarr_20250310");
    }

    #[test]
    fn test_output_paths_append_suffix() {
        let (missing, restored) = output_paths(Path::new("out/radarr_20250310"));
        assert_eq!(missing, PathBuf::from("out/radarr_20250310_missing.txt"));
        assert_eq!(restored, PathBuf::from("out/radarr_20250310_restored.txt"));
    }

    #[test]
    fn test_paged_mode_from_config() {
        let mode = ScanMode::paged(&HistoryConfig::default());
        assert_eq!(
            mode,
            ScanMode::Paged {
                page_size: 1000,
                overscan_pages: 1
            }
        );
    }
}

use crate::config::RemediationConfig;
use crate::outcome::{ItemOutcome, Outcome, OutcomeCounts};
use crate::progress::ProgressReporter;
use crate::service::LibraryCatalog;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone)]
pub struct RemediationReport {
    /// One entry per entity: flag flipped, already monitored, or failed.
    pub monitored: Vec<ItemOutcome<i64>>,
    /// One entry per search command sent, holding the ids in that batch.
    pub searches: Vec<ItemOutcome<Vec<i64>>>,
}

impl RemediationReport {
    pub fn monitored_counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.monitored)
    }

    pub fn search_counts(&self) -> OutcomeCounts {
        OutcomeCounts::tally(&self.searches)
    }

    /// Entity ids whose search command was accepted.
    pub fn searched_ids(&self) -> usize {
        self.searches
            .iter()
            .filter(|b| b.outcome.succeeded())
            .map(|b| b.item.len())
            .sum()
    }
}

/// Marks still-missing entities monitored and asks the service to search for
/// them again. Per-entity and per-batch failures are recorded, never raised.
pub struct RemediationExecutor<'a, C: LibraryCatalog + ?Sized> {
    catalog: &'a C,
    batch_size: usize,
    batch_delay: Duration,
}

impl<'a, C: LibraryCatalog + ?Sized> RemediationExecutor<'a, C> {
    pub fn new(catalog: &'a C, config: &RemediationConfig) -> Self {
        Self {
            catalog,
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
        }
    }

    pub fn run(&self, entity_ids: &[i64], reporter: &dyn ProgressReporter) -> RemediationReport {
        let mut report = RemediationReport::default();
        if entity_ids.is_empty() {
            return report;
        }

        info!(
            "Triggering re-acquisition for {} {}(s)",
            entity_ids.len(),
            self.catalog.kind()
        );
        reporter.on_remediation_start(entity_ids.len() * 2);

        for (idx, id) in entity_ids.iter().enumerate() {
            let outcome = self.ensure_monitored(*id);
            report.monitored.push(ItemOutcome::new(*id, outcome));
            reporter.on_remediation_progress(idx + 1, entity_ids.len() * 2);
        }

        let mut done = entity_ids.len();
        let batches: Vec<&[i64]> = entity_ids.chunks(self.batch_size).collect();
        for (idx, batch) in batches.iter().enumerate() {
            if idx > 0 && !self.batch_delay.is_zero() {
                thread::sleep(self.batch_delay);
            }
            let outcome = match self.catalog.enqueue_search(batch) {
                Ok(()) => {
                    debug!("Queued {} for {} id(s)", self.catalog.kind().search_command(), batch.len());
                    Outcome::Succeeded
                }
                Err(e) => {
                    error!("Search batch {} of {} failed: {}", idx + 1, batches.len(), e);
                    Outcome::Failed(e.to_string())
                }
            };
            report.searches.push(ItemOutcome::new(batch.to_vec(), outcome));
            done += batch.len();
            reporter.on_remediation_progress(done, entity_ids.len() * 2);
        }

        let searched = report.searched_ids();
        reporter.on_remediation_complete(searched, entity_ids.len() - searched);
        report
    }

    fn ensure_monitored(&self, id: i64) -> Outcome {
        match self.catalog.entity(id) {
            Ok(None) => Outcome::Skipped("not found".to_string()),
            Ok(Some(entity)) if entity.monitored => Outcome::Skipped("already monitored".to_string()),
            Ok(Some(entity)) => match self.catalog.set_monitored(&entity) {
                Ok(()) => Outcome::Succeeded,
                Err(e) => {
                    warn!("Could not set monitored on {} {}: {}", self.catalog.kind(), id, e);
                    Outcome::Failed(e.to_string())
                }
            },
            Err(e) => {
                warn!("Could not fetch {} {}: {}", self.catalog.kind(), id, e);
                Outcome::Failed(e.to_string())
            }
        }
    }
}

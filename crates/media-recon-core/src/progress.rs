/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter {
    fn on_history_start(&self) {}
    fn on_history_page(&self, _page: u32, _records_fetched: usize) {}
    fn on_history_complete(&self, _records_in_window: usize, _duration_secs: f64) {}
    fn on_probe_start(&self, _total: usize) {}
    fn on_probe_progress(&self, _done: usize, _total: usize) {}
    fn on_probe_complete(&self, _restored: usize, _still_missing: usize, _duration_secs: f64) {}
    fn on_remediation_start(&self, _total: usize) {}
    fn on_remediation_progress(&self, _done: usize, _total: usize) {}
    fn on_remediation_complete(&self, _succeeded: usize, _failed: usize) {}
    /// `total_lines` comes from a binary newline count and may be zero.
    fn on_lines_start(&self, _label: &str, _total_lines: u64) {}
    fn on_lines_progress(&self, _lines_read: u64, _total_lines: u64) {}
    fn on_lines_complete(&self, _lines_read: u64, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

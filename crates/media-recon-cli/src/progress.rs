use indicatif::{ProgressBar, ProgressStyle};
use media_recon_core::ProgressReporter;
use std::sync::Mutex;
use std::time::Duration;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - History phase: spinner (the feed reports no total)
/// - Probe and remediation phases: bars over the known entity count
/// - File lists: bar over the pre-counted line total
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICKS),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn bar(label: &str, total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let template = format!(
        "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
        label
    );
    pb.set_style(
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICKS),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_history_start(&self) {
        self.set_bar(spinner("Reading history..."));
    }

    fn on_history_page(&self, page: u32, records_fetched: usize) {
        self.with_bar(|pb| {
            pb.set_message(format!(
                "Reading history... page {}, {} records",
                page, records_fetched
            ))
        });
    }

    fn on_history_complete(&self, records_in_window: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m History scan complete: {} records in window ({:.2}s)",
            records_in_window, duration_secs
        );
    }

    fn on_probe_start(&self, total: usize) {
        self.set_bar(bar("Probing", total as u64));
    }

    fn on_probe_progress(&self, done: usize, _total: usize) {
        self.with_bar(|pb| pb.set_position(done as u64));
    }

    fn on_probe_complete(&self, restored: usize, still_missing: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Probe complete: {} restored, {} still missing ({:.2}s)",
            restored, still_missing, duration_secs
        );
    }

    fn on_remediation_start(&self, total: usize) {
        self.set_bar(bar("Remediating", total as u64));
    }

    fn on_remediation_progress(&self, done: usize, _total: usize) {
        self.with_bar(|pb| pb.set_position(done as u64));
    }

    fn on_remediation_complete(&self, succeeded: usize, failed: usize) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Remediation complete: {} searched, {} not searched",
            succeeded, failed
        );
    }

    fn on_lines_start(&self, label: &str, total_lines: u64) {
        if total_lines == 0 {
            self.set_bar(spinner(label));
        } else {
            self.set_bar(bar(label, total_lines));
        }
    }

    fn on_lines_progress(&self, lines_read: u64, _total_lines: u64) {
        self.with_bar(|pb| pb.set_position(lines_read));
    }

    fn on_lines_complete(&self, lines_read: u64, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Read {} lines in {:.2}s",
            lines_read, duration_secs
        );
    }
}

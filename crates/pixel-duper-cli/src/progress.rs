use indicatif::{ProgressBar, ProgressStyle};
use pixel_duper_core::ProgressReporter;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan phase: spinner (unknown total files upfront)
/// - Fingerprint and compare phases: progress bars
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.guard();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.guard().take() {
            pb.finish_and_clear();
        }
    }

    fn start_bar(&self, label: &str, total: usize) {
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
            label
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS);
        let pb = ProgressBar::new(total as u64);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn advance(&self, done: usize, total: usize) {
        if let Some(pb) = self.guard().as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(done as u64);
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_store_load_complete(&self, records: usize, duration_secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Store loaded: {} records in {:.2}s",
            records, duration_secs
        );
    }

    fn on_scan_start(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars(TICK_CHARS),
        );
        pb.set_message("Scanning files...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_progress(&self, files_found: usize, _current_path: &str) {
        if let Some(pb) = self.guard().as_ref() {
            pb.set_message(format!("Scanning... {} images found", files_found));
        }
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} images in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_fill_start(&self, total_files: usize) {
        self.start_bar("Fingerprinting", total_files);
    }

    fn on_fill_progress(&self, files_done: usize, total_files: usize) {
        self.advance(files_done, total_files);
    }

    fn on_fill_complete(&self, decoded: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Fingerprints complete: {} decoded in {:.2}s",
            decoded, duration_secs
        );
    }

    fn on_compare_start(&self, total_pairs: usize) {
        self.start_bar("Comparing", total_pairs);
    }

    fn on_compare_progress(&self, pairs_done: usize, total_pairs: usize) {
        self.advance(pairs_done, total_pairs);
    }

    fn on_compare_complete(&self, results: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Compare complete: {} results in {:.2}s",
            results, duration_secs
        );
    }

    fn on_store_save_complete(&self, records: usize, duration_secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Store saved: {} records in {:.2}s",
            records, duration_secs
        );
    }
}

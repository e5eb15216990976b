/// Trait for reporting scan progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations and may be called from rayon workers.
pub trait ProgressReporter: Send + Sync {
    fn on_store_load_complete(&self, _records: usize, _duration_secs: f64) {}
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize, _current_path: &str) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_fill_start(&self, _total_files: usize) {}
    fn on_fill_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_fill_complete(&self, _decoded: usize, _duration_secs: f64) {}
    fn on_compare_start(&self, _total_pairs: usize) {}
    fn on_compare_progress(&self, _pairs_done: usize, _total_pairs: usize) {}
    fn on_compare_complete(&self, _results: usize, _duration_secs: f64) {}
    fn on_store_save_complete(&self, _records: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

use crate::compare::{CompareResult, Comparator};
use crate::config::AppConfig;
use crate::decoder::{DecodeScratch, DecoderChain};
use crate::entity::{DefectKind, FingerprintEntity};
use crate::error::Error;
use crate::identity::LocalFileSystem;
use crate::progress::ProgressReporter;
use crate::scanner;
use crate::store::FingerprintStore;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct ScanEngine {
    config: AppConfig,
    store_path: PathBuf,
    decoders: DecoderChain,
}

#[derive(Debug)]
pub struct ScanResult {
    pub load_duration: Duration,
    pub scan_duration: Duration,
    pub fill_duration: Duration,
    pub compare_duration: Duration,
    pub save_duration: Duration,
    pub files_visited: usize,
    /// Files served from the store without decoding.
    pub cache_hits: usize,
    pub decoded: usize,
    /// Files no decoder could read.
    pub failed: usize,
    /// Records written on save, `None` when nothing changed.
    pub saved_records: Option<usize>,
    pub cancelled: bool,
    pub results: Vec<CompareResult>,
}

impl ScanResult {
    pub fn duplicate_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, CompareResult::Duplicate { .. }))
            .count()
    }

    pub fn defect_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, CompareResult::Defect { .. }))
            .count()
    }
}

#[derive(Default)]
struct FillCounts {
    cache_hits: AtomicUsize,
    decoded: AtomicUsize,
    failed: AtomicUsize,
    done: AtomicUsize,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Self {
        let store_path = PathBuf::from(&config.store_path);
        Self {
            config,
            store_path,
            decoders: DecoderChain::default(),
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_decoders(mut self, decoders: DecoderChain) -> Self {
        self.decoders = decoders;
        self
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Run the full pipeline:
    /// 1. Load the fingerprint store, dropping outdated records
    /// 2. Parallel directory walk over the search roots
    /// 3. Decode and fingerprint every file the store cannot serve
    /// 4. Defect findings and pairwise duplicate search
    /// 5. Save the store if anything changed
    ///
    /// `cancel` is checked between files. A cancelled scan keeps the work
    /// already finished but skips the comparison.
    pub fn scan(&self, reporter: &dyn ProgressReporter, cancel: &AtomicBool) -> Result<ScanResult, Error> {
        let options = &self.config.compare;
        options.validate()?;

        // Phase 1: Load store
        let load_start = Instant::now();
        let store = FingerprintStore::new(options.ignore_frame_width);
        if self.store_path.exists() {
            match store.load(&self.store_path, true, &LocalFileSystem) {
                Ok(records) => reporter.on_store_load_complete(records, load_start.elapsed().as_secs_f64()),
                Err(e) => warn!(
                    "Cannot load store {}: {}. Starting with an empty store",
                    self.store_path.display(),
                    e
                ),
            }
        } else {
            debug!("No store at {}", self.store_path.display());
        }
        let load_duration = load_start.elapsed();

        // Phase 2: Walk
        let scope = self.config.scope();
        info!("Processing directories: {:?}", scope.search.iter().map(|p| p.as_str()).collect::<Vec<_>>());
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let files = scanner::collect_image_files(&scope, &self.config.ignore_patterns, reporter)?;
        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(files.len(), scan_duration.as_secs_f64());
        debug!(
            "Scan completed in {:.2}s, {} image files",
            scan_duration.as_secs_f64(),
            files.len()
        );

        // Phase 3: Fill
        info!("Fingerprinting {} files...", files.len());
        let fill_start = Instant::now();
        let total = files.len();
        let counts = FillCounts::default();
        reporter.on_fill_start(total);
        let entities: Vec<Arc<FingerprintEntity>> = files
            .par_iter()
            .map_init(DecodeScratch::default, |scratch, identity| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let mut entity = store.get(identity);
                let needs_decode = entity.needs_pixel_fill(options)
                    || (entity.defect == DefectKind::Undefined && entity.needs_defect_check(options));
                if needs_decode {
                    let decoded = self.decoders.decode_file(scratch, entity.path());
                    // The file in flight when the scan is cancelled is dropped.
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                    match decoded {
                        Ok(decoded) => {
                            entity.fill(&decoded, options);
                            counts.decoded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            debug!("Cannot decode {}: {}", entity.path(), e);
                            entity.mark_undecodable();
                            counts.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    store.put(entity.clone());
                } else {
                    counts.cache_hits.fetch_add(1, Ordering::Relaxed);
                }
                entity.compute_derived(options, &scope);

                let done = counts.done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_fill_progress(done, total);
                Some(Arc::new(entity))
            })
            .flatten()
            .collect();
        let fill_duration = fill_start.elapsed();
        let decoded = counts.decoded.load(Ordering::Relaxed);
        reporter.on_fill_complete(decoded, fill_duration.as_secs_f64());
        let cancelled = cancel.load(Ordering::Relaxed);
        debug!(
            "Fill completed in {:.2}s, {} decoded, {} from store",
            fill_duration.as_secs_f64(),
            decoded,
            counts.cache_hits.load(Ordering::Relaxed)
        );

        // Phase 4: Compare
        let compare_start = Instant::now();
        let results = if cancelled {
            warn!("Scan cancelled after {} of {} files", entities.len(), total);
            Vec::new()
        } else {
            info!("Comparing {} fingerprints...", entities.len());
            Comparator::new(options).run(&entities, reporter)
        };
        let compare_duration = compare_start.elapsed();
        reporter.on_compare_complete(results.len(), compare_duration.as_secs_f64());

        // Phase 5: Save
        let save_start = Instant::now();
        let saved_records = if store.is_dirty() {
            if let Some(parent) = self.store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let records = store.save(&self.store_path)?;
            reporter.on_store_save_complete(records, save_start.elapsed().as_secs_f64());
            Some(records)
        } else {
            debug!("Store unchanged, not saving");
            None
        };
        let save_duration = save_start.elapsed();

        Ok(ScanResult {
            load_duration,
            scan_duration,
            fill_duration,
            compare_duration,
            save_duration,
            files_visited: total,
            cache_hits: counts.cache_hits.load(Ordering::Relaxed),
            decoded,
            failed: counts.failed.load(Ordering::Relaxed),
            saved_records,
            cancelled,
            results,
        })
    }

    /// Records in the persisted store, without touching the files they
    /// describe.
    pub fn count_store(&self) -> Result<usize, Error> {
        if !self.store_path.exists() {
            return Ok(0);
        }
        let store = FingerprintStore::new(self.config.compare.ignore_frame_width);
        store.load(&self.store_path, false, &LocalFileSystem)
    }

    /// Delete the persisted store. Returns whether there was one.
    pub fn clear_store(&self) -> Result<bool, Error> {
        if !self.store_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.store_path)?;
        info!("Fingerprint store {} cleared", self.store_path.display());
        Ok(true)
    }
}

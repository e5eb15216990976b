pub mod codec;

use crate::entity::FingerprintEntity;
use crate::error::Result;
use crate::identity::{FileIdentity, FileSystem};
use crate::path::Path;
use dashmap::DashMap;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// Persistent cache of fingerprint entities keyed by path hash.
///
/// Safe to share between scan workers: `get` and `put` only lock the bucket
/// they touch.
pub struct FingerprintStore {
    buckets: DashMap<u32, Vec<FingerprintEntity>>,
    ignore_frame_width: usize,
    dirty: AtomicBool,
}

impl FingerprintStore {
    pub fn new(ignore_frame_width: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            ignore_frame_width,
            dirty: AtomicBool::new(false),
        }
    }

    /// Cached entity for `identity`, or a fresh one when nothing is cached or
    /// the cached record no longer matches size and time. The fresh entity is
    /// registered so later lookups see it.
    pub fn get(&self, identity: &FileIdentity) -> FingerprintEntity {
        let mut bucket = self.buckets.entry(identity.hash()).or_default();
        if let Some(existing) = bucket.iter_mut().find(|e| e.path() == identity.path()) {
            if existing.identity.size == identity.size
                && existing.identity.modified_time == identity.modified_time
            {
                trace!("Store hit for {}", identity.path());
                return existing.clone();
            }
            debug!("Stale store record for {}", identity.path());
            if existing.need_to_save() {
                self.dirty.store(true, Ordering::Relaxed);
            }
            *existing = FingerprintEntity::new(identity.clone());
            return existing.clone();
        }
        let fresh = FingerprintEntity::new(identity.clone());
        bucket.push(fresh.clone());
        fresh
    }

    /// Write back an entity after it has been filled.
    pub fn put(&self, entity: FingerprintEntity) {
        let mut bucket = self.buckets.entry(entity.identity.hash()).or_default();
        match bucket.iter_mut().find(|e| e.path() == entity.path()) {
            Some(existing) => *existing = entity,
            None => bucket.push(entity),
        }
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn lookup(&self, path: &Path) -> Option<FingerprintEntity> {
        let hash = crate::identity::hash_path(path);
        self.buckets
            .get(&hash)
            .and_then(|bucket| bucket.iter().find(|e| e.path() == path).cloned())
    }

    pub fn remove(&self, path: &Path) -> Option<FingerprintEntity> {
        let hash = crate::identity::hash_path(path);
        let mut bucket = self.buckets.get_mut(&hash)?;
        let index = bucket.iter().position(|e| e.path() == path)?;
        let removed = bucket.swap_remove(index);
        self.dirty.store(true, Ordering::Relaxed);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entities worth persisting.
    pub fn saved_len(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| bucket.iter().filter(|e| e.need_to_save()).count())
            .sum()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        if !self.buckets.is_empty() {
            self.dirty.store(true, Ordering::Relaxed);
        }
        self.buckets.clear();
    }

    /// Snapshot of every entity, sorted by path.
    pub fn entities(&self) -> Vec<FingerprintEntity> {
        let mut all: Vec<FingerprintEntity> = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.value().clone())
            .collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }

    /// Replace the contents with the records in `file`.
    ///
    /// Either every record is read or the store is left untouched. With
    /// `validate`, records whose file changed or vanished are dropped.
    pub fn load(&self, file: &std::path::Path, validate: bool, fs: &dyn FileSystem) -> Result<usize> {
        let reader = File::open(file)?;
        let mut reader = BufReader::new(reader);
        let loaded = codec::read_store(&mut reader, self.ignore_frame_width)?;
        let total = loaded.len();

        let kept: Vec<FingerprintEntity> = if validate {
            loaded
                .into_par_iter()
                .filter_map(|mut entity| {
                    if entity.identity.actual(fs, true) {
                        Some(entity)
                    } else {
                        trace!("Dropping outdated record for {}", entity.path());
                        None
                    }
                })
                .collect()
        } else {
            loaded
        };
        let dropped = total - kept.len();

        self.buckets.clear();
        for entity in kept {
            let mut bucket = self.buckets.entry(entity.identity.hash()).or_default();
            match bucket.iter_mut().find(|e| e.path() == entity.path()) {
                Some(existing) => *existing = entity,
                None => bucket.push(entity),
            }
        }
        self.dirty.store(dropped > 0, Ordering::Relaxed);

        info!(
            "Loaded {} records from {} ({} outdated)",
            total - dropped,
            file.display(),
            dropped
        );
        Ok(total - dropped)
    }

    /// Write every entity worth persisting to `file`, through a temporary
    /// file renamed into place.
    pub fn save(&self, file: &std::path::Path) -> Result<usize> {
        let entities: Vec<FingerprintEntity> = self
            .entities()
            .into_iter()
            .filter(|e| e.need_to_save())
            .collect();

        let temp = temp_path(file);
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            if let Err(e) = codec::write_store(&mut writer, entities.iter()) {
                drop(writer);
                let _ = fs::remove_file(&temp);
                return Err(e);
            }
            writer.flush()?;
        }
        if let Err(e) = fs::rename(&temp, file) {
            warn!("Cannot move {} into place: {}", temp.display(), e);
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        self.dirty.store(false, Ordering::Relaxed);

        info!("Saved {} records to {}", entities.len(), file.display());
        Ok(entities.len())
    }
}

fn temp_path(file: &std::path::Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

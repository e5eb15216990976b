use crate::config::SearchScope;
use crate::decoder::is_supported_extension;
use crate::identity::{FileIdentity, FileStat};
use crate::path::Path;
use crate::progress::ProgressReporter;
use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;
use tracing::{error, warn};

struct Walk<'a> {
    found: DashMap<u32, Vec<FileIdentity>>,
    ignore: &'a crate::path::PathSet,
    patterns: Vec<Pattern>,
    count: AtomicUsize,
    reporter: &'a dyn ProgressReporter,
}

/// Parallel traversal of the search roots. Collects every image file not
/// excluded by the ignore roots or the glob patterns, with the size and
/// modification time read during the walk. Skips symlinks and 0-byte files.
pub fn collect_image_files(
    scope: &SearchScope,
    ignore_globs: &[String],
    reporter: &dyn ProgressReporter,
) -> io::Result<Vec<FileIdentity>> {
    let patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    let walk = Walk {
        found: DashMap::new(),
        ignore: &scope.ignore,
        patterns,
        count: AtomicUsize::new(0),
        reporter,
    };

    let roots: Vec<&Path> = scope.search.iter().collect();
    roots
        .par_iter()
        .try_for_each(|root| visit_dirs(root.as_std_path(), root.subfolders(), &walk))?;

    let mut files: Vec<FileIdentity> = walk
        .found
        .into_iter()
        .flat_map(|(_, bucket)| bucket)
        .collect();
    files.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(files)
}

fn visit_dirs(dir: &std::path::Path, recurse: bool, walk: &Walk) -> io::Result<()> {
    if !dir.is_dir() {
        warn!("Search path {} is not a directory", dir.display());
        return Ok(());
    }
    if is_ignored_dir(dir, walk) {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() == io::ErrorKind::PermissionDenied {
                error!(
                    "Access denied reading directory {}: {}",
                    dir.display(),
                    err
                );
                return Ok(());
            } else {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                ));
            }
        }
    };

    entries.par_bridge().try_for_each(|entry_result| -> io::Result<()> {
        let entry = entry_result.map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error reading entry in directory {}: {}", dir.display(), err),
            )
        })?;

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            return Ok(());
        }
        if file_type.is_dir() {
            if recurse {
                visit_dirs(&path, recurse, walk)?;
            }
            return Ok(());
        }

        let image_path = Path::from_std(&path);
        if !is_supported_extension(&image_path)
            || walk.patterns.iter().any(|pattern| pattern.matches_path(&path))
            || walk.ignore.is_has_sub_path(&image_path)
        {
            return Ok(());
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("Error getting metadata for {}: {}", path.display(), err);
                return Ok(());
            }
        };
        if metadata.len() == 0 {
            return Ok(());
        }
        let stat = FileStat {
            size: metadata.len(),
            modified_time: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0),
        };

        let identity = FileIdentity::new(image_path, stat.size, stat.modified_time);
        let count = walk.count.fetch_add(1, Ordering::Relaxed) + 1;
        walk.reporter.on_scan_progress(count, identity.path().as_str());
        let mut bucket = walk.found.entry(identity.hash()).or_default();
        if !bucket.iter().any(|f| f.path() == identity.path()) {
            bucket.push(identity);
        }
        Ok(())
    })?;

    Ok(())
}

fn is_ignored_dir(dir: &std::path::Path, walk: &Walk) -> bool {
    if walk.patterns.iter().any(|pattern| pattern.matches_path(dir)) {
        return true;
    }
    let as_path = Path::directory_os(dir.as_os_str(), false);
    walk.ignore.is_has_sub_path(&as_path)
}

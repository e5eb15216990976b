use crate::hasher;
use crate::path::Path;
use std::fs;
use std::io;
use std::time::UNIX_EPOCH;
use tracing::trace;

/// Size and modification time of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    /// Nanoseconds since the Unix epoch.
    pub modified_time: u64,
}

/// Source of file metadata. Lets staleness checks run against a stub.
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
}

pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = fs::metadata(path.as_std_path())?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path),
            ));
        }
        let modified_time = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ok(FileStat {
            size: metadata.len(),
            modified_time,
        })
    }
}

/// Path, size, modification time and path hash of one file.
///
/// `hash` is always the hash of the path's comparison rendering; it keys the
/// fingerprint store and never reflects file content.
#[derive(Debug, Clone)]
pub struct FileIdentity {
    path: Path,
    pub size: u64,
    pub modified_time: u64,
    hash: u32,
    actual: Option<bool>,
}

impl FileIdentity {
    pub fn new(path: Path, size: u64, modified_time: u64) -> Self {
        let hash = hash_path(&path);
        Self {
            path,
            size,
            modified_time,
            hash,
            actual: None,
        }
    }

    /// Stat `path`. `None` means the file is gone or unreadable and must be
    /// treated as changed.
    pub fn from_live_file(path: &Path, fs: &dyn FileSystem) -> Option<FileIdentity> {
        match fs.stat(path) {
            Ok(stat) => Some(FileIdentity::new(path.clone(), stat.size, stat.modified_time)),
            Err(e) => {
                trace!("Cannot stat {}: {}", path, e);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Whether this identity still describes the file on disk.
    ///
    /// The verdict is cached, so a scan pass stats each file at most once
    /// unless `force` is set.
    pub fn actual(&mut self, fs: &dyn FileSystem, force: bool) -> bool {
        if !force {
            if let Some(verdict) = self.actual {
                return verdict;
            }
        }
        let verdict = match FileIdentity::from_live_file(&self.path, fs) {
            Some(live) => self.same_file(&live),
            None => false,
        };
        self.actual = Some(verdict);
        verdict
    }

    pub fn invalidate(&mut self) {
        self.actual = None;
    }

    /// Point this identity at a new path. Size and time stay as they are.
    pub fn rename(&mut self, new_path: Path) {
        self.hash = hash_path(&new_path);
        self.path = new_path;
        self.actual = None;
    }

    /// Field-by-field comparison of size, time, hash and path.
    pub fn same_file(&self, other: &FileIdentity) -> bool {
        self.size == other.size
            && self.modified_time == other.modified_time
            && self.hash == other.hash
            && self.path == other.path
    }
}

pub fn hash_path(path: &Path) -> u32 {
    hasher::hash_data(path.comparison())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingFs {
        stat: Mutex<io::Result<FileStat>>,
        calls: AtomicUsize,
    }

    impl CountingFs {
        fn new(size: u64, modified_time: u64) -> Self {
            Self {
                stat: Mutex::new(Ok(FileStat {
                    size,
                    modified_time,
                })),
                calls: AtomicUsize::new(0),
            }
        }

        fn set(&self, size: u64, modified_time: u64) {
            *self.stat.lock().unwrap() = Ok(FileStat {
                size,
                modified_time,
            });
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FileSystem for CountingFs {
        fn stat(&self, _path: &Path) -> io::Result<FileStat> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &*self.stat.lock().unwrap() {
                Ok(stat) => Ok(*stat),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    #[test]
    fn test_hash_follows_path() {
        let id = FileIdentity::new(Path::new("/a/b.png"), 1, 2);
        assert_eq!(id.hash(), hasher::hash_data(b"/A/B.PNG"));
        let same = FileIdentity::new(Path::new("/A/B.png"), 1, 2);
        assert_eq!(id.hash(), same.hash());
    }

    #[test]
    fn test_actual_caches_verdict() {
        let fs = CountingFs::new(2000, 1000);
        let mut id = FileIdentity::new(Path::new("/img/a.png"), 1000, 1000);

        assert!(!id.actual(&fs, false));
        assert_eq!(fs.calls(), 1);
        assert!(!id.actual(&fs, false));
        assert_eq!(fs.calls(), 1);
    }

    #[test]
    fn test_actual_detects_changes_when_forced() {
        let fs = CountingFs::new(1000, 1000);
        let mut id = FileIdentity::new(Path::new("/img/a.png"), 1000, 1000);
        assert!(id.actual(&fs, false));

        fs.set(1000, 1001);
        assert!(id.actual(&fs, false), "cached verdict is reused");
        assert!(!id.actual(&fs, true));

        fs.set(999, 1000);
        assert!(!id.actual(&fs, true));
        assert_eq!(fs.calls(), 3);
    }

    #[test]
    fn test_missing_file_is_not_actual() {
        let fs = CountingFs::new(0, 0);
        *fs.stat.lock().unwrap() = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let mut id = FileIdentity::new(Path::new("/img/a.png"), 1, 1);
        assert!(FileIdentity::from_live_file(id.path(), &fs).is_none());
        assert!(!id.actual(&fs, true));
    }

    #[test]
    fn test_rename_rehashes_and_keeps_metadata() {
        let mut id = FileIdentity::new(Path::new("/img/a.png"), 10, 20);
        let old_hash = id.hash();
        id.rename(Path::new("/img/b.png"));
        assert_ne!(id.hash(), old_hash);
        assert_eq!(id.hash(), hasher::hash_data(b"/IMG/B.PNG"));
        assert_eq!((id.size, id.modified_time), (10, 20));
    }

    #[test]
    fn test_local_file_system() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        std::fs::write(&file, [0u8; 12]).unwrap();
        let path = Path::from_std(&file);

        let mut id = FileIdentity::from_live_file(&path, &LocalFileSystem).unwrap();
        assert_eq!(id.size, 12);
        assert!(id.actual(&LocalFileSystem, true));

        std::fs::write(&file, [0u8; 20]).unwrap();
        assert!(!id.actual(&LocalFileSystem, true));
    }
}

mod set;

pub use set::PathSet;

use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Delimiter used by the comparison rendering on every platform.
const COMPARISON_DELIMITER: u8 = b'/';

fn is_delimiter(b: u8) -> bool {
    b == b'/' || (cfg!(windows) && b == b'\\')
}

/// Byte offsets of the parsed parts inside one rendering.
///
/// `[0, dir_end)` directory, `[name_start, name_end)` base name,
/// `[ext_start, end)` extension. The separating delimiter and dot are excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Spans {
    dir_end: usize,
    name_start: usize,
    name_end: usize,
    ext_start: usize,
    end: usize,
}

impl Spans {
    fn parse_file(bytes: &[u8]) -> Spans {
        let end = bytes.len();
        let (dir_end, name_start) = match bytes.iter().rposition(|&b| is_delimiter(b)) {
            Some(i) => (i, i + 1),
            None => (0, 0),
        };
        let (name_end, ext_start) = match bytes[name_start..].iter().rposition(|&b| b == b'.') {
            Some(0) | None => (end, end),
            Some(i) => (name_start + i, name_start + i + 1),
        };
        Spans {
            dir_end,
            name_start,
            name_end,
            ext_start,
            end,
        }
    }

    fn parse_directory(bytes: &[u8]) -> Spans {
        let end = bytes.len();
        Spans {
            dir_end: end,
            name_start: end,
            name_end: end,
            ext_start: end,
            end,
        }
    }

    fn range(&self, mode: CompareMode) -> std::ops::Range<usize> {
        match mode {
            CompareMode::FullPath => 0..self.end,
            CompareMode::Directory => 0..self.dir_end,
            CompareMode::Name => self.name_start..self.name_end,
            CompareMode::NameWithExtension => self.name_start..self.end,
            CompareMode::Extension => self.ext_start..self.end,
        }
    }
}

/// Which part of two paths a comparison looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    FullPath,
    Directory,
    Name,
    NameWithExtension,
    Extension,
}

/// Relation between the directory parts of two paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Unrelated,
    Equal,
    FirstContainsSecond,
    SecondContainsFirst,
}

impl Containment {
    /// The same relation seen from the other side.
    pub fn reversed(self) -> Containment {
        match self {
            Containment::FirstContainsSecond => Containment::SecondContainsFirst,
            Containment::SecondContainsFirst => Containment::FirstContainsSecond,
            other => other,
        }
    }
}

/// Immutable filesystem path with a parsed view and a case-normalized
/// comparison rendering.
///
/// The native OS string is kept untouched and used for every filesystem
/// access. Names that are not valid Unicode get a lossy display string, but
/// their comparison rendering keeps the raw bytes, so two such files never
/// collapse into one path.
///
/// Equality, ordering and hashing all go through [`Path::compare`] on the
/// comparison rendering, so `C:/Photos/A.JPG` and `c:/photos/a.jpg` are the
/// same path. Clones share all renderings.
#[derive(Clone)]
pub struct Path {
    native: Arc<OsStr>,
    display: Arc<str>,
    comparison: Arc<[u8]>,
    display_spans: Spans,
    comparison_spans: Spans,
    subfolders: bool,
}

impl Path {
    /// Parse a file path.
    pub fn new(raw: &str) -> Path {
        Path::from_os(OsStr::new(raw))
    }

    pub fn from_std(path: &std::path::Path) -> Path {
        Path::from_os(path.as_os_str())
    }

    /// Parse a file path given in the platform's native encoding.
    pub fn from_os(native: &OsStr) -> Path {
        let display = native.to_string_lossy();
        let comparison = comparison_rendering(native.as_encoded_bytes());
        Path {
            display_spans: Spans::parse_file(display.as_bytes()),
            comparison_spans: Spans::parse_file(&comparison),
            native: Arc::from(native),
            display: Arc::from(display),
            comparison: Arc::from(comparison),
            subfolders: false,
        }
    }

    /// Parse a directory path, typically a search root. The whole path,
    /// minus trailing delimiters, is the directory part.
    pub fn directory(raw: &str, subfolders: bool) -> Path {
        Path::directory_os(OsStr::new(raw), subfolders)
    }

    pub fn directory_os(native: &OsStr, subfolders: bool) -> Path {
        let bytes = native.as_encoded_bytes();
        let trimmed = bytes
            .iter()
            .rposition(|&b| !is_delimiter(b))
            .map_or(0, |i| i + 1);
        // The filesystem root keeps its delimiter for display and walking.
        let kept = if trimmed == 0 && !bytes.is_empty() { 1 } else { trimmed };
        let native = ascii_prefix(native, kept);
        let display = native.to_string_lossy().into_owned();
        let comparison = comparison_rendering(&bytes[..trimmed]);
        Path {
            display_spans: Spans::parse_directory(display.as_bytes()),
            comparison_spans: Spans::parse_directory(&comparison),
            native: Arc::from(native.as_os_str()),
            display: Arc::from(display),
            comparison: Arc::from(comparison),
            subfolders,
        }
    }

    /// Display rendering. Lossy for names that are not valid Unicode.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    pub fn as_os_str(&self) -> &OsStr {
        &self.native
    }

    pub fn as_std_path(&self) -> &std::path::Path {
        std::path::Path::new(&*self.native)
    }

    /// Upper-cased rendering used for equality, ordering and hashing.
    pub fn comparison(&self) -> &[u8] {
        &self.comparison
    }

    pub fn directory_part(&self) -> &str {
        &self.display[self.display_spans.range(CompareMode::Directory)]
    }

    pub fn name(&self) -> &str {
        &self.display[self.display_spans.range(CompareMode::Name)]
    }

    pub fn name_with_extension(&self) -> &str {
        &self.display[self.display_spans.range(CompareMode::NameWithExtension)]
    }

    pub fn extension(&self) -> &str {
        &self.display[self.display_spans.range(CompareMode::Extension)]
    }

    pub fn subfolders(&self) -> bool {
        self.subfolders
    }

    pub fn with_subfolders(mut self, subfolders: bool) -> Path {
        self.subfolders = subfolders;
        self
    }

    /// Ordinal comparison of one span of the comparison renderings.
    ///
    /// The directory delimiter orders before every other character, so the
    /// descendants of a directory sort directly after it.
    pub fn compare(a: &Path, b: &Path, mode: CompareMode) -> Ordering {
        let sa = &a.comparison[a.comparison_spans.range(mode)];
        let sb = &b.comparison[b.comparison_spans.range(mode)];
        for (&x, &y) in sa.iter().zip(sb) {
            if x != y {
                return sort_key(x).cmp(&sort_key(y));
            }
        }
        sa.len().cmp(&sb.len())
    }

    /// Resolve how the directory parts of `a` and `b` nest.
    ///
    /// Walks both directory spans while they match, so the cost is bounded by
    /// the shorter one. Only a path with `subfolders` set can contain a
    /// deeper directory; a file directly inside a root is `Equal` to it.
    pub fn is_contained(a: &Path, b: &Path) -> Containment {
        let da = &a.comparison[..a.comparison_spans.dir_end];
        let db = &b.comparison[..b.comparison_spans.dir_end];
        let common = da.iter().zip(db).take_while(|(x, y)| x == y).count();

        if common == da.len() && common == db.len() {
            Containment::Equal
        } else if common == da.len() {
            if db[common] == COMPARISON_DELIMITER && a.subfolders {
                Containment::FirstContainsSecond
            } else {
                Containment::Unrelated
            }
        } else if common == db.len() {
            if da[common] == COMPARISON_DELIMITER && b.subfolders {
                Containment::SecondContainsFirst
            } else {
                Containment::Unrelated
            }
        } else {
            Containment::Unrelated
        }
    }
}

/// First `len` bytes of `native`. `len` must fall on an ASCII boundary.
#[cfg(unix)]
fn ascii_prefix(native: &OsStr, len: usize) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    OsStr::from_bytes(&native.as_bytes()[..len]).to_os_string()
}

#[cfg(not(unix))]
fn ascii_prefix(native: &OsStr, len: usize) -> OsString {
    match native.to_str() {
        Some(s) => OsString::from(&s[..len]),
        None => native.to_os_string(),
    }
}

/// Upper-case every valid UTF-8 run and copy invalid bytes through as they
/// are.
fn comparison_rendering(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;
    while !rest.is_empty() {
        let (valid, invalid_len) = match std::str::from_utf8(rest) {
            Ok(valid) => (valid, 0),
            Err(e) => {
                let valid = std::str::from_utf8(&rest[..e.valid_up_to()]).unwrap_or_default();
                let invalid_len = e.error_len().unwrap_or(rest.len() - e.valid_up_to());
                (valid, invalid_len)
            }
        };
        out.extend_from_slice(upper_case(valid).as_bytes());
        let start = valid.len();
        out.extend_from_slice(&rest[start..start + invalid_len]);
        rest = &rest[start + invalid_len..];
    }
    out
}

fn upper_case(s: &str) -> String {
    let upper = s.to_uppercase();
    if cfg!(windows) {
        upper.replace('\\', "/")
    } else {
        upper
    }
}

fn sort_key(b: u8) -> u16 {
    if b == COMPARISON_DELIMITER {
        0
    } else {
        b as u16 + 1
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Path) -> bool {
        Path::compare(self, other, CompareMode::FullPath) == Ordering::Equal
    }
}

impl Eq for Path {}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Path) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Path) -> Ordering {
        Path::compare(self, other, CompareMode::FullPath)
    }
}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.comparison.hash(state);
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("path", &&*self.display)
            .field("subfolders", &self.subfolders)
            .finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

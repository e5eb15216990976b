use super::{CompareMode, Containment, Path, COMPARISON_DELIMITER};

/// Sorted set of paths in which no member contains another.
///
/// Used for search roots, ignore roots and valid roots. Lookups are binary
/// searches over the `FullPath` order.
#[derive(Debug, Clone, Default)]
pub struct PathSet {
    paths: Vec<Path>,
}

impl PathSet {
    pub fn new() -> Self {
        Self { paths: Vec::new() }
    }

    /// Merge `path` into the set.
    ///
    /// Dropped when an existing member equals or contains it; members it
    /// contains are replaced by it. Returns whether the set changed.
    pub fn insert(&mut self, path: Path) -> bool {
        let mut i = 0;
        while i < self.paths.len() {
            match Path::is_contained(&self.paths[i], &path) {
                Containment::Equal | Containment::FirstContainsSecond => return false,
                Containment::SecondContainsFirst => {
                    self.paths.remove(i);
                }
                Containment::Unrelated => i += 1,
            }
        }
        let pos = self
            .paths
            .binary_search_by(|p| Path::compare(p, &path, CompareMode::FullPath))
            .unwrap_or_else(|pos| pos);
        self.paths.insert(pos, path);
        true
    }

    /// Exact membership.
    pub fn is_has_path(&self, path: &Path) -> bool {
        self.search(path).is_ok()
    }

    /// Whether `path` lies inside any member.
    pub fn is_has_sub_path(&self, path: &Path) -> bool {
        self.index_of_sub_path(path).is_some()
    }

    /// Index of the member `path` lies inside.
    ///
    /// A containing member sorts before `path`, so the search starts one
    /// element before the insertion point. It only keeps walking back while
    /// the member and `path` still share an ancestor directory, because any
    /// other member before that point cannot be a prefix of `path`.
    pub fn index_of_sub_path(&self, path: &Path) -> Option<usize> {
        let pos = match self.search(path) {
            Ok(i) => return Some(i),
            Err(pos) => pos,
        };
        let mut i = pos;
        while i > 0 {
            i -= 1;
            let member = &self.paths[i];
            if matches!(
                Path::is_contained(member, path),
                Containment::Equal | Containment::FirstContainsSecond
            ) {
                return Some(i);
            }
            if !shares_ancestor(member, path) {
                break;
            }
        }
        None
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.paths.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Path> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn search(&self, path: &Path) -> Result<usize, usize> {
        self.paths
            .binary_search_by(|p| Path::compare(p, path, CompareMode::FullPath))
    }
}

fn shares_ancestor(member: &Path, path: &Path) -> bool {
    let m = member.comparison();
    let p = path.comparison();
    m.iter()
        .zip(p)
        .take_while(|(x, y)| x == y)
        .any(|(&x, _)| x == COMPARISON_DELIMITER)
}

impl FromIterator<Path> for PathSet {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Self {
        let mut set = PathSet::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(set: &PathSet) -> Vec<&str> {
        set.iter().map(|p| p.as_str()).collect()
    }

    #[test]
    fn test_non_overlapping_no_overlap() {
        let set: PathSet = ["/home/user/photos", "/home/user/docs", "/var/data"]
            .iter()
            .map(|d| Path::directory(d, true))
            .collect();
        assert_eq!(set.len(), 3);
        assert_eq!(dirs(&set), vec!["/home/user/docs", "/home/user/photos", "/var/data"]);
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let set: PathSet = ["/home/user/docs", "/var/data", "/home/user"]
            .iter()
            .map(|d| Path::directory(d, true))
            .collect();
        // /home/user/docs is replaced once /home/user arrives
        assert_eq!(dirs(&set), vec!["/home/user", "/var/data"]);
    }

    #[test]
    fn test_new_root_inside_existing_is_dropped() {
        let mut set = PathSet::new();
        assert!(set.insert(Path::directory("/home/user", true)));
        assert!(!set.insert(Path::directory("/home/user/docs", true)));
        assert_eq!(dirs(&set), vec!["/home/user"]);
    }

    #[test]
    fn test_non_recursive_root_keeps_children() {
        let mut set = PathSet::new();
        set.insert(Path::directory("/home/user", false));
        assert!(set.insert(Path::directory("/home/user/docs", true)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_idempotent_insertion() {
        let mut set = PathSet::new();
        set.insert(Path::directory("/a", true));
        set.insert(Path::directory("/b", false));
        let before = dirs(&set).join("|");
        assert!(!set.insert(Path::directory("/a", true)));
        assert!(!set.insert(Path::directory("/B/", false)));
        assert_eq!(dirs(&set).join("|"), before);
    }

    #[test]
    fn test_is_has_path() {
        let set: PathSet = [Path::directory("/a", true), Path::directory("/c", true)]
            .into_iter()
            .collect();
        assert!(set.is_has_path(&Path::directory("/A", true)));
        assert!(!set.is_has_path(&Path::directory("/b", true)));
    }

    #[test]
    fn test_is_has_sub_path() {
        let set: PathSet = [
            Path::directory("/a", true),
            Path::directory("/a b", true),
            Path::directory("/m", false),
        ]
        .into_iter()
        .collect();

        assert!(set.is_has_sub_path(&Path::new("/a/x/y.png")));
        assert!(set.is_has_sub_path(&Path::new("/a b/y.png")));
        assert!(set.is_has_sub_path(&Path::new("/m/y.png")));
        assert!(!set.is_has_sub_path(&Path::new("/m/deeper/y.png")));
        assert!(!set.is_has_sub_path(&Path::new("/ab/y.png")));
        assert_eq!(set.index_of_sub_path(&Path::new("/a b/y.png")), Some(1));
    }

    #[test]
    fn test_sub_path_behind_nested_member() {
        // "/r" is flat, so "/r/a" may coexist and sorts between "/r" and "/r/x.png".
        let set: PathSet = [Path::directory("/r", false), Path::directory("/r/a", true)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.index_of_sub_path(&Path::new("/r/x.png")), Some(0));
        assert_eq!(set.index_of_sub_path(&Path::new("/r/a/b/x.png")), Some(1));
    }

    #[test]
    fn test_empty_set_reports_not_found() {
        let set = PathSet::new();
        assert!(!set.is_has_path(&Path::new("/a.png")));
        assert!(!set.is_has_sub_path(&Path::new("/a.png")));
    }
}

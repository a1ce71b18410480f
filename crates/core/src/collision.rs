use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Answers whether a path is already in use.
pub trait PathOccupancy {
    fn is_occupied(&self, path: &Path) -> bool;
}

/// Checks the real file system. Dangling symlinks count as occupied.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskOccupancy;

impl PathOccupancy for DiskOccupancy {
    fn is_occupied(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }
}

impl PathOccupancy for HashSet<PathBuf> {
    fn is_occupied(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

/// Returns `candidate` if it is free, otherwise the first free
/// `stem_N.ext` with N counting up from 1.
pub fn next_free_variant(candidate: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !is_taken(candidate) {
        return candidate.to_path_buf();
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new(""));
    let stem = candidate
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut n = 1u64;
    loop {
        let mut name = format!("{}_{}", stem, n);
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
        let next = parent.join(name);
        if !is_taken(&next) {
            return next;
        }
        n += 1;
    }
}

/// Resolves targets for one batch. Every returned path is reserved so a
/// later call in the same batch never receives it again.
pub struct TargetResolver<'a> {
    occupancy: &'a dyn PathOccupancy,
    reserved: HashSet<PathBuf>,
}

impl<'a> TargetResolver<'a> {
    pub fn new(occupancy: &'a dyn PathOccupancy) -> Self {
        Self {
            occupancy,
            reserved: HashSet::new(),
        }
    }

    pub fn resolve(&mut self, candidate: &Path) -> PathBuf {
        let resolved = next_free_variant(candidate, |p| {
            self.reserved.contains(p) || self.occupancy.is_occupied(p)
        });
        self.reserved.insert(resolved.clone());
        resolved
    }

    pub fn reserved(&self) -> &HashSet<PathBuf> {
        &self.reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn taken(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn free_candidate_is_returned_unchanged() {
        let occupied = taken(&[]);
        let resolved = next_free_variant(Path::new("dir/pic_1.jpg"), |p| occupied.is_occupied(p));
        assert_eq!(resolved, PathBuf::from("dir/pic_1.jpg"));
    }

    #[test]
    fn taken_candidate_gets_numeric_suffix() {
        let occupied = taken(&["dir/pic_1.jpg", "dir/pic_1_1.jpg"]);
        let resolved = next_free_variant(Path::new("dir/pic_1.jpg"), |p| occupied.is_occupied(p));
        assert_eq!(resolved, PathBuf::from("dir/pic_1_2.jpg"));
    }

    #[test]
    fn suffix_without_extension() {
        let occupied = taken(&["dir/README"]);
        let resolved = next_free_variant(Path::new("dir/README"), |p| occupied.is_occupied(p));
        assert_eq!(resolved, PathBuf::from("dir/README_1"));
    }

    #[test]
    fn resolver_is_deterministic() {
        let occupied = taken(&["a.jpg"]);
        let first = TargetResolver::new(&occupied).resolve(Path::new("a.jpg"));
        let second = TargetResolver::new(&occupied).resolve(Path::new("a.jpg"));
        assert_eq!(first, second);
    }

    #[test]
    fn resolver_never_hands_out_reserved_path_twice() {
        let occupied = taken(&[]);
        let mut resolver = TargetResolver::new(&occupied);
        let a = resolver.resolve(Path::new("x/pic.jpg"));
        let b = resolver.resolve(Path::new("x/pic.jpg"));
        let c = resolver.resolve(Path::new("x/pic.jpg"));
        assert_eq!(a, PathBuf::from("x/pic.jpg"));
        assert_eq!(b, PathBuf::from("x/pic_1.jpg"));
        assert_eq!(c, PathBuf::from("x/pic_2.jpg"));
        assert_eq!(resolver.reserved().len(), 3);
    }

    #[test]
    fn disk_resolver_skips_existing_files() {
        let temp = tempdir().expect("tempdir");
        let candidate = temp.path().join("pic_1.jpg");
        assert_eq!(TargetResolver::new(&DiskOccupancy).resolve(&candidate), candidate);

        fs::write(&candidate, b"x").expect("write");
        assert_eq!(
            TargetResolver::new(&DiskOccupancy).resolve(&candidate),
            temp.path().join("pic_1_1.jpg")
        );
    }
}

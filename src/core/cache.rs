// Per-run memoization for parsed images and DLL search-path lookups.
// Entries are pure functions of their keys; binaries on disk are treated as
// immutable for the lifetime of the cache, so nothing is ever invalidated.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::pe::{self, BuildType, Machine};

/// One parsed binary. Immutable once read; derived by parsing, never mutated.
#[derive(Clone, Debug)]
pub struct BinaryInfo {
    pub path: PathBuf,
    pub machine: Machine,
    pub buildtype: BuildType,
    pub imports: Vec<String>,
}

/// Owned by the caller and passed by reference into every operation that
/// needs memoization, so repeated closure runs stay independently
/// reproducible and no hidden process-wide state exists.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    binaries: HashMap<PathBuf, Arc<BinaryInfo>>,
    lookups: HashMap<(String, Vec<PathBuf>), Option<PathBuf>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the image at `path`, or return the cached parse. Parsing is the
    /// expensive step, so a path is read from disk at most once per cache.
    pub fn binary(&mut self, path: &Path) -> Result<Arc<BinaryInfo>, Error> {
        if let Some(info) = self.binaries.get(path) {
            tracing::trace!(path = %path.display(), "binary cache hit");
            return Ok(Arc::clone(info));
        }
        let image = pe::read_image(path)?;
        tracing::debug!(
            path = %path.display(),
            machine = %image.machine,
            imports = image.imports.len(),
            "parsed binary"
        );
        let info = Arc::new(BinaryInfo {
            path: path.to_path_buf(),
            machine: image.machine,
            buildtype: image.buildtype(),
            imports: image.imports,
        });
        self.binaries.insert(path.to_path_buf(), Arc::clone(&info));
        Ok(info)
    }

    /// First directory in `dirs` containing a file literally named `name`.
    /// Directory order is strict precedence; a later same-named file never
    /// wins. Memoized on `(name, dirs)`.
    pub fn find_dll(&mut self, name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
        let key = (name.to_string(), dirs.to_vec());
        if let Some(hit) = self.lookups.get(&key) {
            tracing::trace!(name, "lookup cache hit");
            return hit.clone();
        }
        let found = dirs.iter().map(|dir| dir.join(name)).find(|p| p.is_file());
        self.lookups.insert(key, found.clone());
        found
    }
}

#[cfg(test)]
mod tests {
    use super::ResolutionCache;
    use std::fs;

    #[test]
    fn find_dll_honors_directory_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("bin");
        let second = temp.path().join("lib");
        fs::create_dir_all(&first).expect("mkdir");
        fs::create_dir_all(&second).expect("mkdir");
        fs::write(first.join("libdup.dll"), b"a").expect("write");
        fs::write(second.join("libdup.dll"), b"b").expect("write");
        fs::write(second.join("libonly.dll"), b"c").expect("write");

        let mut cache = ResolutionCache::new();
        let dirs = vec![first.clone(), second.clone()];
        assert_eq!(
            cache.find_dll("libdup.dll", &dirs),
            Some(first.join("libdup.dll"))
        );
        assert_eq!(
            cache.find_dll("libonly.dll", &dirs),
            Some(second.join("libonly.dll"))
        );
        assert_eq!(cache.find_dll("libmissing.dll", &dirs), None);
    }

    #[test]
    fn find_dll_is_memoized_per_directory_list() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("bin");
        fs::create_dir_all(&dir).expect("mkdir");

        let mut cache = ResolutionCache::new();
        let dirs = vec![dir.clone()];
        assert_eq!(cache.find_dll("liblate.dll", &dirs), None);

        // The miss is memoized; a file appearing later is not observed. The
        // cache contract assumes the prefix is immutable during a run.
        fs::write(dir.join("liblate.dll"), b"x").expect("write");
        assert_eq!(cache.find_dll("liblate.dll", &dirs), None);

        // A different directory list is a different key.
        let other = vec![dir.clone(), dir];
        assert!(cache.find_dll("liblate.dll", &other).is_some());
    }

    #[test]
    fn directories_are_not_matches() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("bin");
        fs::create_dir_all(dir.join("libdir.dll")).expect("mkdir");

        let mut cache = ResolutionCache::new();
        assert_eq!(cache.find_dll("libdir.dll", &[dir]), None);
    }
}

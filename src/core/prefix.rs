// Installation prefix layout and the logical plugin-name mapping.
// Fixed layout: shared DLLs in `bin/`, plugins in `lib/gstreamer-1.0/`.
use std::path::{Path, PathBuf};

pub const BIN_DIR: &str = "bin";
pub const LIB_DIR: &str = "lib";
pub const PLUGIN_SUBDIR: &str = "gstreamer-1.0";
const PLUGIN_FILE_PREFIX: &str = "gst";
const DLL_SUFFIX: &str = ".dll";

/// Root of an installation tree. Used only for path resolution; the resolver
/// never mutates the tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prefix {
    root: PathBuf,
}

impl Prefix {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Recover the prefix from a DLL path inside it: a file directly under
    /// `lib/gstreamer-1.0/` or under `bin/` implies the root. Anything else
    /// is not part of a recognized layout.
    pub fn infer(dll_path: &Path) -> Option<Self> {
        let parent = dll_path.parent()?;
        if parent.file_name()? == PLUGIN_SUBDIR {
            let lib = parent.parent()?;
            if lib.file_name()? == LIB_DIR {
                return Some(Self::new(lib.parent()?));
            }
            return None;
        }
        if parent.file_name()? == BIN_DIR {
            return Some(Self::new(parent.parent()?));
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR)
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.root.join(LIB_DIR).join(PLUGIN_SUBDIR)
    }

    /// DLL search path inside the prefix, in strict precedence order.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        vec![self.bin_dir(), self.plugin_dir()]
    }

    /// Deterministic logical-name mapping: `foo` -> `lib/gstreamer-1.0/gstfoo.dll`.
    pub fn plugin_path(&self, name: &str) -> PathBuf {
        self.plugin_dir()
            .join(format!("{PLUGIN_FILE_PREFIX}{name}{DLL_SUFFIX}"))
    }

    /// Batch existence check so the caller learns about every missing plugin
    /// in one pass instead of failing on the first.
    pub fn missing_plugins(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter(|name| !self.plugin_path(name).is_file())
            .cloned()
            .collect()
    }

    /// Strip the prefix root. Paths produced by resolution are always inside
    /// the prefix; anything else passes through unchanged.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }
}

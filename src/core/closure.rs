// Worklist dependency closure over PE import tables.
// Discovery order is deterministic: roots in caller order, each root's
// dependencies breadth-first behind it, FIFO queue, strict search-path
// precedence. The visited set bounds cyclic import graphs.
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::core::cache::ResolutionCache;
use crate::core::error::{Error, ErrorKind};
use crate::core::prefix::Prefix;
use crate::core::system::{is_system_dll, module_deps};

/// Insertion-ordered, duplicate-free output accumulator. Entries are
/// prefix-relative paths, or bare names for acknowledged system DLLs. Once
/// inserted an entry is never re-yielded, even if rediscovered via a
/// different dependency path.
#[derive(Clone, Debug, Default)]
pub struct DependencySet {
    entries: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: PathBuf) -> bool {
        if self.seen.contains(&entry) {
            return false;
        }
        self.seen.insert(entry.clone());
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, entry: &Path) -> bool {
        self.seen.contains(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.entries
    }
}

/// Map logical plugin names to root binary paths. Missing plugins fail as
/// one batch naming every absent logical name, so a caller learns about all
/// of them in one pass.
pub fn plugin_roots(prefix: &Prefix, plugins: &[String]) -> Result<Vec<PathBuf>, Error> {
    let missing = prefix.missing_plugins(plugins);
    if !missing.is_empty() {
        return Err(Error::new(ErrorKind::PluginNotFound)
            .with_message(format!("plugins not found: {}", missing.join(", ")))
            .with_path(prefix.plugin_dir())
            .with_hint("Plugin names map to lib/gstreamer-1.0/gst<name>.dll inside the prefix."));
    }
    Ok(plugins.iter().map(|name| prefix.plugin_path(name)).collect())
}

/// Closure over the named plugins inside `prefix`. Root order is preserved
/// in the output.
pub fn plugin_closure(
    cache: &mut ResolutionCache,
    prefix: &Prefix,
    plugins: &[String],
    include_system: bool,
) -> Result<DependencySet, Error> {
    let roots = plugin_roots(prefix, plugins)?;
    closure(cache, prefix, &roots, &prefix.search_dirs(), include_system)
}

/// Closure over explicit root binary paths. Each root's own relative path is
/// emitted unconditionally before any of its dependencies; the visited set
/// is shared across roots so a dependency discovered under an earlier root
/// is never re-emitted under a later one.
pub fn closure(
    cache: &mut ResolutionCache,
    prefix: &Prefix,
    roots: &[PathBuf],
    search_dirs: &[PathBuf],
    include_system: bool,
) -> Result<DependencySet, Error> {
    let mut out = DependencySet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut dynamic_emitted: HashSet<String> = HashSet::new();

    for root in roots {
        let info = cache.binary(root)?;
        out.insert(prefix.relative(root));
        tracing::debug!(root = %root.display(), "resolving root binary");

        let mut queue: VecDeque<(String, PathBuf)> = info
            .imports
            .iter()
            .map(|name| (name.clone(), root.clone()))
            .collect();

        while let Some((name, required_by)) = queue.pop_front() {
            let Some(path) = visit_name(
                cache,
                prefix,
                search_dirs,
                &name,
                &required_by,
                include_system,
                &mut visited,
                &mut dynamic_emitted,
                &mut out,
            )?
            else {
                continue;
            };
            let dep = cache.binary(&path)?;
            for import in &dep.imports {
                queue.push_back((import.clone(), path.clone()));
            }
        }
    }
    Ok(out)
}

/// One worklist step for `name`: skip if visited, classify, resolve, emit,
/// then inject the dynamic dependency table. Returns the resolved path when
/// the caller should go on to walk its import table. Only statically
/// discovered names land in `visited`: a dynamically injected DLL that later
/// shows up as a plain import must still have its import table walked.
#[allow(clippy::too_many_arguments)]
fn visit_name(
    cache: &mut ResolutionCache,
    prefix: &Prefix,
    search_dirs: &[PathBuf],
    name: &str,
    required_by: &Path,
    include_system: bool,
    visited: &mut HashSet<String>,
    dynamic_emitted: &mut HashSet<String>,
    out: &mut DependencySet,
) -> Result<Option<PathBuf>, Error> {
    if !visited.insert(name.to_string()) {
        return Ok(None);
    }
    if is_system_dll(name) {
        // System DLLs are acknowledged by bare name at most; their own
        // dependencies are assumed system-provided and are never walked.
        if include_system {
            out.insert(PathBuf::from(name));
        }
        return Ok(None);
    }
    let Some(path) = cache.find_dll(name, search_dirs) else {
        return Err(Error::new(ErrorKind::DepNotFound)
            .with_message("not found in any search directory")
            .with_module(name)
            .with_path(required_by));
    };
    tracing::debug!(name, path = %path.display(), "resolved dependency");
    out.insert(prefix.relative(&path));
    emit_dynamic_deps(
        cache,
        prefix,
        search_dirs,
        name,
        &path,
        include_system,
        dynamic_emitted,
        out,
    )?;
    Ok(Some(path))
}

/// Emit the runtime-loaded companions of `name` without descending into
/// their import tables. `dynamic_emitted` keeps the table walk from
/// repeating (or cycling) but is separate from the worklist's `visited`
/// set, so a later static discovery of the same DLL is still descended.
#[allow(clippy::too_many_arguments)]
fn emit_dynamic_deps(
    cache: &mut ResolutionCache,
    prefix: &Prefix,
    search_dirs: &[PathBuf],
    name: &str,
    loader: &Path,
    include_system: bool,
    dynamic_emitted: &mut HashSet<String>,
    out: &mut DependencySet,
) -> Result<(), Error> {
    for extra in module_deps(name) {
        if !dynamic_emitted.insert(extra.to_string()) {
            continue;
        }
        if is_system_dll(extra) {
            if include_system {
                out.insert(PathBuf::from(*extra));
            }
            continue;
        }
        let Some(path) = cache.find_dll(extra, search_dirs) else {
            return Err(Error::new(ErrorKind::DepNotFound)
                .with_message("not found in any search directory")
                .with_module(*extra)
                .with_path(loader));
        };
        tracing::debug!(name = *extra, path = %path.display(), "resolved dynamic dependency");
        out.insert(prefix.relative(&path));
        emit_dynamic_deps(
            cache,
            prefix,
            search_dirs,
            extra,
            &path,
            include_system,
            dynamic_emitted,
            out,
        )?;
    }
    Ok(())
}

/// Direct imports of one binary, optionally with system DLLs filtered out.
/// Backs the non-recursive `dll-deps` listing; no resolution happens here.
pub fn direct_imports(
    cache: &mut ResolutionCache,
    path: &Path,
    include_system: bool,
) -> Result<Vec<String>, Error> {
    let info = cache.binary(path)?;
    Ok(info
        .imports
        .iter()
        .filter(|name| include_system || !is_system_dll(name))
        .cloned()
        .collect())
}

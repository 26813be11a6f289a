//! Loading netlists from YAML files.
//!
//! A netlist file holds one flat netlist; a directory of netlist files
//! defines a hierarchy in which each file names the circuit type of its
//! stem. Loading is the only I/O surface of this crate; everything
//! downstream works on already-constructed values.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{span, Level};

use crate::{Error, Netlist, RecursiveNetlist, Result};

/// The default extension of netlist files.
pub const DEFAULT_EXT: &str = ".yml";

/// Loads a single flat netlist from a YAML file.
pub fn load_netlist(path: impl AsRef<Path>) -> Result<Netlist> {
    let path = path.as_ref();
    let _guard = span!(Level::INFO, "loading netlist", path = %path.display()).entered();
    let text = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Loads a hierarchy from the directory containing `path`.
///
/// Every sibling file ending in `ext` becomes a hierarchy entry named by
/// its cleaned file stem; the entry for `path` itself comes first, making
/// it the circuit of interest. Files are read in natural filename order so
/// the remaining entries are deterministic.
pub fn load_recursive_netlist(path: impl AsRef<Path>, ext: &str) -> Result<RecursiveNetlist> {
    let path = fs::canonicalize(path)?;
    let _guard =
        span!(Level::INFO, "loading recursive netlist", path = %path.display()).entered();
    let folder = path.parent().unwrap_or_else(|| Path::new("."));

    let mut recnet = RecursiveNetlist::new();
    // The circuit we're interested in comes first.
    recnet.add_netlist(file_stem(&path, ext)?, Netlist::new())?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let p = entry.path();
        if p.is_file() && p.to_string_lossy().ends_with(ext) {
            files.push(p);
        }
    }
    files.sort_by(|a, b| natord::compare(&a.to_string_lossy(), &b.to_string_lossy()));

    for file in files {
        recnet.add_netlist(file_stem(&file, ext)?, load_netlist(&file)?)?;
    }
    Ok(recnet)
}

/// The circuit-type name a netlist file defines: its file name with the
/// given extension removed.
fn file_stem(path: &Path, ext: &str) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::MalformedInput(format!("invalid netlist path: {}", path.display())))?;
    Ok(name.strip_suffix(ext).unwrap_or(name).to_string())
}

/// An explicit cache for netlists loaded from disk.
///
/// Keys are canonicalized paths. The cache is never invalidated
/// implicitly: callers needing fresh data after a file changes must call
/// [`invalidate`](NetlistCache::invalidate) (or [`clear`](NetlistCache::clear))
/// themselves, or bypass the cache with [`load_netlist`].
#[derive(Debug, Default)]
pub struct NetlistCache {
    entries: HashMap<PathBuf, Netlist>,
}

impl NetlistCache {
    /// Creates a new, empty cache.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the netlist at `path`, reusing a previously loaded copy when
    /// one is cached under the same canonical path.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&Netlist> {
        let key = fs::canonicalize(path)?;
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let net = load_netlist(entry.key())?;
                Ok(entry.insert(net))
            }
        }
    }

    /// Drops the cached entry for `path`, if any.
    pub fn invalidate(&mut self, path: impl AsRef<Path>) {
        if let Ok(key) = fs::canonicalize(path) {
            self.entries.remove(&key);
        }
    }

    /// Drops every cached entry.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The number of cached netlists.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const TOP_YAML: &str = "\
instances:
  u:
    component: sub
ports:
  out: u,o
";

    const SUB_YAML: &str = "\
instances:
  v: wg
ports:
  o: v,o1
";

    #[test]
    fn loads_flat_netlist() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "sub.yml", SUB_YAML);
        let net = load_netlist(&path).unwrap();
        assert_eq!(net.instance("v").unwrap().name(), "wg");
        assert_eq!(net.port("o").unwrap().to_string(), "v,o1");
    }

    #[test]
    fn loads_directory_as_hierarchy() {
        let dir = tempfile::tempdir().unwrap();
        let top = write_file(dir.path(), "top.yml", TOP_YAML);
        write_file(dir.path(), "sub.yml", SUB_YAML);

        let recnet = load_recursive_netlist(&top, DEFAULT_EXT).unwrap();
        // The named circuit comes first even though "sub.yml" sorts before it.
        assert_eq!(recnet.top().unwrap().0, "top");
        assert_eq!(recnet.len(), 2);

        let flat = recnet.flatten().unwrap();
        assert!(flat.netlist.instances().contains_key("u~v"));
        assert_eq!(flat.netlist.ports()["out"].to_string(), "u~v,o1");
    }

    #[test]
    fn cache_reuses_and_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "sub.yml", SUB_YAML);

        let mut cache = NetlistCache::new();
        cache.load(&path).unwrap();
        assert_eq!(cache.len(), 1);

        // A stale cache keeps serving the old contents until invalidated.
        write_file(dir.path(), "sub.yml", TOP_YAML);
        assert!(cache.load(&path).unwrap().instance("v").is_some());

        cache.invalidate(&path);
        assert!(cache.load(&path).unwrap().instance("u").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}

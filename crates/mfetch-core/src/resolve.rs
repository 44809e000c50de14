//! Destination resolution against sanctioned download roots.
//!
//! A request names a directory key, a filename, and optionally an explicit
//! destination directory. The key selects an ordered list of roots; the
//! destination (or the first root) must, after full normalization, be one of
//! those roots or live beneath one. Containment is checked component-wise on
//! normalized paths, never by string prefix, so `/models/ck-evil` is not
//! inside `/models/ck` and `..`/symlink escapes are caught.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::url_model::base_name;

/// Upper bound on symlink hops while normalizing one path.
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown directory '{0}'")]
    UnknownDirectory(String),
    #[error("No paths configured for '{0}'")]
    NoConfiguredRoots(String),
    #[error("Destination path is not allowed")]
    PathNotAllowed(PathBuf),
    #[error("Invalid filename '{0}'")]
    InvalidFilename(String),
    #[error("cannot resolve relative path: {0}")]
    Io(#[from] io::Error),
}

/// Directory key -> ordered, normalized roots. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct AllowedRootSet {
    roots: BTreeMap<String, Vec<PathBuf>>,
}

impl AllowedRootSet {
    /// Builds the set, expanding `~/` and normalizing every root so each is
    /// absolute, `..`-free and symlink-resolved.
    pub fn new(config: &BTreeMap<String, Vec<PathBuf>>) -> io::Result<Self> {
        let mut roots = BTreeMap::new();
        for (key, paths) in config {
            let normalized = paths
                .iter()
                .map(|p| normalize_path(&expand_home(p)))
                .collect::<io::Result<Vec<_>>>()?;
            roots.insert(key.clone(), normalized);
        }
        Ok(Self { roots })
    }

    /// Roots for `key` in configured order, or `None` for an unknown key.
    pub fn roots(&self, key: &str) -> Option<&[PathBuf]> {
        self.roots.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.roots.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Resolves a safe destination for `filename` under `directory_key`.
    ///
    /// Pure apart from reading symlinks during normalization; never creates
    /// directories.
    pub fn resolve(
        &self,
        directory_key: &str,
        filename: &str,
        destination: Option<&str>,
    ) -> Result<ResolvedTarget, ResolveError> {
        let allowed = self
            .roots(directory_key)
            .ok_or_else(|| ResolveError::UnknownDirectory(directory_key.to_string()))?;
        let first = allowed
            .first()
            .ok_or_else(|| ResolveError::NoConfiguredRoots(directory_key.to_string()))?;

        let candidate = match destination.filter(|d| !d.is_empty()) {
            Some(dest) => normalize_path(&expand_home(Path::new(dest)))?,
            None => first.clone(),
        };

        if !allowed.iter().any(|root| candidate.starts_with(root)) {
            return Err(ResolveError::PathNotAllowed(candidate));
        }

        let filename = base_name(filename)
            .ok_or_else(|| ResolveError::InvalidFilename(filename.to_string()))?;
        Ok(ResolvedTarget::new(candidate, filename))
    }
}

/// A validated download destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub directory: PathBuf,
    pub filename: String,
    pub full_path: PathBuf,
}

impl ResolvedTarget {
    fn new(directory: PathBuf, filename: String) -> Self {
        let full_path = directory.join(&filename);
        Self {
            directory,
            filename,
            full_path,
        }
    }
}

/// Expands a leading `~` or `~/` against `$HOME`; other paths pass through.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    if let Some(Component::Normal(first)) = components.next() {
        if first == "~" {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(components.as_path());
            }
        }
    }
    path.to_path_buf()
}

/// Makes `path` absolute and resolves `.`, `..` and symlinks component by
/// component. Components that do not exist yet are kept lexically, so a
/// destination can be validated before it is created.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut hops = 0;
    resolve_components(&absolute, &mut hops)
}

fn resolve_components(path: &Path, hops: &mut usize) -> io::Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => {
                out.push(name);
                let is_link = std::fs::symlink_metadata(&out)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if !is_link {
                    continue;
                }
                *hops += 1;
                if *hops > MAX_SYMLINK_HOPS {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("too many symlinks resolving {}", path.display()),
                    ));
                }
                let target = std::fs::read_link(&out)?;
                out.pop();
                let joined = if target.is_absolute() {
                    target
                } else {
                    out.join(target)
                };
                out = resolve_components(&joined, hops)?;
            }
        }
    }
    Ok(out)
}

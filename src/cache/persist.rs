//! Persisted cache registry.
//!
//! Each cache type declares a unique tag, a file name and a format version
//! in the static [`CACHE_TYPES`] table. Artifacts live under
//! `<root>/<repository-id>/<file-name>` as JSON envelopes embedding the
//! format version; a version mismatch on load is a cache miss, never an
//! error. Discovery walks the cache root recursively; removal deletes
//! selected artifacts and prunes now-empty parent directories up to (but
//! never including) the root.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

/// Cache I/O failure naming the offending path.
///
/// Fatal only for the specific operation requested; read-side failures
/// degrade to cache misses instead.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed removing '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed writing cache '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed serializing cache '{path}': {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Registered persisted cache types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKind {
    FlagIndex,
    LicenseIndex,
}

impl CacheKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FlagIndex => "flags",
            Self::LicenseIndex => "licenses",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry entry for one persisted cache type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDescriptor {
    pub kind: CacheKind,
    /// File name of the artifact inside a repository's cache directory
    pub file_name: &'static str,
    /// Format version embedded in the artifact
    pub version: u32,
}

/// Static registration table of every persisted cache type, populated at
/// compile time and validated by the match in [`CacheDescriptor::of`].
pub const CACHE_TYPES: [CacheDescriptor; 2] = [
    CacheDescriptor {
        kind: CacheKind::FlagIndex,
        file_name: "flags.json",
        version: 1,
    },
    CacheDescriptor {
        kind: CacheKind::LicenseIndex,
        file_name: "licenses.json",
        version: 1,
    },
];

impl CacheDescriptor {
    /// Descriptor for a cache kind.
    #[must_use]
    pub fn of(kind: CacheKind) -> &'static CacheDescriptor {
        match kind {
            CacheKind::FlagIndex => &CACHE_TYPES[0],
            CacheKind::LicenseIndex => &CACHE_TYPES[1],
        }
    }
}

/// On-disk envelope wrapping every persisted artifact.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope<T> {
    version: u32,
    data: T,
}

/// Registry of persisted caches rooted at one directory.
#[derive(Debug, Clone)]
pub struct CacheRegistry {
    root: PathBuf,
}

impl CacheRegistry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache directory for a repository.
    #[must_use]
    pub fn repo_dir(&self, repo_id: &str) -> PathBuf {
        self.root.join(repo_id.trim_start_matches('/'))
    }

    /// Artifact path for a cache type and repository.
    #[must_use]
    pub fn cache_file(&self, descriptor: &CacheDescriptor, repo_id: &str) -> PathBuf {
        self.repo_dir(repo_id).join(descriptor.file_name)
    }

    /// Load a persisted artifact.
    ///
    /// Any failure - unreadable file, unparsable envelope, format-version
    /// mismatch - degrades to `None` (cache miss) and is logged at debug
    /// level.
    pub fn load<T: DeserializeOwned>(
        &self,
        descriptor: &CacheDescriptor,
        repo_id: &str,
    ) -> Option<T> {
        let path = self.cache_file(descriptor, repo_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::debug!("cache miss for '{}': {e}", path.display());
                return None;
            }
        };
        let envelope: CacheEnvelope<T> = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("cache miss for '{}': unparsable artifact: {e}", path.display());
                return None;
            }
        };
        if envelope.version != descriptor.version {
            log::debug!(
                "cache miss for '{}': format version {} != {}",
                path.display(),
                envelope.version,
                descriptor.version
            );
            return None;
        }
        Some(envelope.data)
    }

    /// Write a persisted artifact, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] naming the artifact path on any I/O or
    /// serialization failure.
    pub fn store<T: Serialize>(
        &self,
        descriptor: &CacheDescriptor,
        repo_id: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let path = self.cache_file(descriptor, repo_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;
        }
        let envelope = CacheEnvelope {
            version: descriptor.version,
            data,
        };
        let json =
            serde_json::to_string_pretty(&envelope).map_err(|source| StorageError::Serialize {
                path: path.clone(),
                source,
            })?;
        fs::write(&path, json).map_err(|source| StorageError::Write { path, source })
    }

    /// Mapping of every registered cache type to the artifact paths that
    /// currently exist under the root.
    #[must_use]
    pub fn existing(&self) -> BTreeMap<CacheKind, BTreeSet<PathBuf>> {
        let mut map: BTreeMap<CacheKind, BTreeSet<PathBuf>> = BTreeMap::new();
        for descriptor in &CACHE_TYPES {
            map.insert(descriptor.kind, BTreeSet::new());
        }
        for entry in WalkDir::new(&self.root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if let Some(descriptor) = CACHE_TYPES.iter().find(|d| d.file_name == name) {
                if let Some(paths) = map.get_mut(&descriptor.kind) {
                    paths.insert(entry.into_path());
                }
            }
        }
        map
    }

    /// Remove artifacts of the selected cache types.
    ///
    /// Returns the removed (or, with `dry_run`, would-be-removed) paths.
    /// After each deletion, now-empty parent directories are pruned up to
    /// but never including the root; a non-empty parent stops the pruning
    /// silently.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Remove`] naming the first path that failed.
    pub fn remove(
        &self,
        selection: &BTreeSet<CacheKind>,
        dry_run: bool,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let existing = self.existing();
        let mut removed = Vec::new();
        for kind in selection {
            let Some(paths) = existing.get(kind) else {
                continue;
            };
            for path in paths {
                if !dry_run {
                    fs::remove_file(path).map_err(|source| StorageError::Remove {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(parent) = path.parent() {
                        self.prune_empty_dirs(parent)?;
                    }
                }
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }

    /// Remove the entire cache root tree. A missing root is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Remove`] naming the root on any other
    /// failure.
    pub fn remove_all(&self) -> Result<(), StorageError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove {
                path: self.root.clone(),
                source,
            }),
        }
    }

    fn prune_empty_dirs(&self, start: &Path) -> Result<(), StorageError> {
        let mut dir = start;
        while dir != self.root && dir.starts_with(&self.root) {
            match fs::remove_dir(dir) {
                Ok(()) => {}
                Err(e)
                    if e.kind() == io::ErrorKind::DirectoryNotEmpty
                        || e.kind() == io::ErrorKind::NotFound =>
                {
                    break;
                }
                Err(source) => {
                    return Err(StorageError::Remove {
                        path: dir.to_path_buf(),
                        source,
                    });
                }
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        Ok(())
    }
}

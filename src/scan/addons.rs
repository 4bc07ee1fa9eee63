//! Shared check addons.
//!
//! Addons are helper indexes constructed once per scan and injected into the
//! checks that declare them. They are shared via `Arc` (the reference count
//! doubles as teardown) and read-only after construction. Addons are
//! cache-aware: when a persisted-cache registry is configured they load
//! their derived index from disk and rebuild on any miss.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheDescriptor, CacheKind, CacheRegistry};
use crate::record::Repository;

use super::registry::ConfigError;

/// Identity of a shared addon a check may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddonId {
    FlagIndex,
    LicenseIndex,
}

impl fmt::Display for AddonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlagIndex => write!(f, "flag-index"),
            Self::LicenseIndex => write!(f, "license-index"),
        }
    }
}

/// Index of the repository's flag definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagIndex {
    /// Globally defined flags
    pub global: BTreeSet<String>,
    /// Per-package flag definitions, keyed by `category/package`
    pub local: BTreeMap<String, BTreeSet<String>>,
}

impl FlagIndex {
    /// Build the index from repository metadata.
    #[must_use]
    pub fn build(repo: &Repository) -> Self {
        Self {
            global: repo.metadata.global_flags.clone(),
            local: repo.metadata.local_flags.clone(),
        }
    }

    /// Load the index from the persisted cache, rebuilding (and
    /// re-persisting) on a miss. Persist failures degrade with a warning;
    /// the freshly built index is still returned.
    #[must_use]
    pub fn load_or_build(repo: &Repository, cache: Option<&CacheRegistry>) -> Self {
        let descriptor = CacheDescriptor::of(CacheKind::FlagIndex);
        if let Some(registry) = cache {
            if let Some(index) = registry.load(descriptor, &repo.id) {
                return index;
            }
        }
        let index = Self::build(repo);
        if let Some(registry) = cache {
            if let Err(e) = registry.store(descriptor, &repo.id, &index) {
                log::warn!("failed persisting flag index: {e}");
            }
        }
        index
    }

    /// Flags defined for one package.
    #[must_use]
    pub fn local_flags(&self, category: &str, package: &str) -> Option<&BTreeSet<String>> {
        self.local.get(&format!("{category}/{package}"))
    }
}

/// Index of the licenses the repository defines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseIndex {
    pub known: BTreeSet<String>,
}

impl LicenseIndex {
    /// Build the index from repository metadata.
    #[must_use]
    pub fn build(repo: &Repository) -> Self {
        Self {
            known: repo.metadata.licenses.clone(),
        }
    }

    /// Load the index from the persisted cache, rebuilding on a miss.
    #[must_use]
    pub fn load_or_build(repo: &Repository, cache: Option<&CacheRegistry>) -> Self {
        let descriptor = CacheDescriptor::of(CacheKind::LicenseIndex);
        if let Some(registry) = cache {
            if let Some(index) = registry.load(descriptor, &repo.id) {
                return index;
            }
        }
        let index = Self::build(repo);
        if let Some(registry) = cache {
            if let Err(e) = registry.store(descriptor, &repo.id, &index) {
                log::warn!("failed persisting license index: {e}");
            }
        }
        index
    }
}

/// The addons constructed for one scan.
///
/// Only addons some registered check requires are built; check factories
/// obtain their dependencies through the `require_*` accessors.
#[derive(Default)]
pub struct Addons {
    pub(crate) flag_index: Option<Arc<FlagIndex>>,
    pub(crate) license_index: Option<Arc<LicenseIndex>>,
}

impl Addons {
    /// Build the addons in `required` for a scan of `repo`.
    #[must_use]
    pub fn build(
        repo: &Repository,
        required: &BTreeSet<AddonId>,
        cache: Option<&CacheRegistry>,
    ) -> Self {
        Self {
            flag_index: required
                .contains(&AddonId::FlagIndex)
                .then(|| Arc::new(FlagIndex::load_or_build(repo, cache))),
            license_index: required
                .contains(&AddonId::LicenseIndex)
                .then(|| Arc::new(LicenseIndex::load_or_build(repo, cache))),
        }
    }

    /// The flag index, if it was constructed for this scan.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAddon`] when the addon was not built.
    pub fn require_flag_index(&self) -> Result<Arc<FlagIndex>, ConfigError> {
        self.flag_index
            .clone()
            .ok_or(ConfigError::MissingAddon(AddonId::FlagIndex))
    }

    /// The license index, if it was constructed for this scan.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAddon`] when the addon was not built.
    pub fn require_license_index(&self) -> Result<Arc<LicenseIndex>, ConfigError> {
        self.license_index
            .clone()
            .ok_or(ConfigError::MissingAddon(AddonId::LicenseIndex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RepoMetadata;

    fn repo() -> Repository {
        let mut metadata = RepoMetadata::default();
        metadata.global_flags.insert("debug".to_string());
        metadata
            .local_flags
            .entry("app-arch/tar".to_string())
            .or_default()
            .insert("minimal".to_string());
        metadata.licenses.insert("GPL-2".to_string());
        Repository::new("gentoo").with_metadata(metadata)
    }

    #[test]
    fn test_flag_index_build() {
        let index = FlagIndex::build(&repo());
        assert!(index.global.contains("debug"));
        assert!(index.local_flags("app-arch", "tar").is_some());
        assert!(index.local_flags("app-arch", "xz").is_none());
    }

    #[test]
    fn test_addons_built_only_when_required() {
        let required = [AddonId::FlagIndex].into_iter().collect();
        let addons = Addons::build(&repo(), &required, None);
        assert!(addons.require_flag_index().is_ok());
        assert!(matches!(
            addons.require_license_index(),
            Err(ConfigError::MissingAddon(AddonId::LicenseIndex))
        ));
    }

    #[test]
    fn test_flag_index_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CacheRegistry::new(dir.path());
        let repo = repo();

        let built = FlagIndex::load_or_build(&repo, Some(&registry));
        let path = registry.cache_file(CacheDescriptor::of(CacheKind::FlagIndex), &repo.id);
        assert!(path.exists());

        // second load comes from disk
        let reloaded = FlagIndex::load_or_build(&repo, Some(&registry));
        assert_eq!(built, reloaded);
    }
}

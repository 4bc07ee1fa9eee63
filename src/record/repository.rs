//! Repository description and checksum ledgers.
//!
//! A repository maintains two parallel checksum-ledger formats for its
//! distributable files: a legacy per-package ledger (filename to checksum
//! map, one table per package) and a newer consolidated manifest carrying a
//! format version. Both must agree for every `(filename, algorithm)` pair
//! they both cover; the reconciliation logic lives in
//! [`crate::checks::distfiles`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ChecksumMap;

/// Manifest format version the reconciler understands. Older formats are
/// skipped, not errors.
pub const MANIFEST_FORMAT: u32 = 2;

/// A record's legacy-ledger entry could not be found.
///
/// Recovered locally: the reconciler converts this into a per-record finding
/// and continues with the remaining files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing checksum ledger entry for '{filename}'")]
pub struct MissingChecksum {
    pub filename: String,
}

/// Consolidated checksum manifest for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Ledger format version; see [`MANIFEST_FORMAT`]
    pub version: u32,
    /// Filename to checksum map for every distfile the manifest covers
    #[serde(default)]
    pub distfiles: BTreeMap<String, ChecksumMap>,
}

impl Manifest {
    /// Create an empty manifest at the given format version.
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            distfiles: BTreeMap::new(),
        }
    }

    /// Add a distfile entry.
    #[must_use]
    pub fn with_distfile(mut self, name: impl Into<String>, checksums: ChecksumMap) -> Self {
        self.distfiles.insert(name.into(), checksums);
        self
    }
}

/// Repository-level metadata consulted by checks and addons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Globally defined feature flags
    #[serde(default)]
    pub global_flags: BTreeSet<String>,
    /// Per-package flag definitions, keyed by `category/package`
    #[serde(default)]
    pub local_flags: BTreeMap<String, BTreeSet<String>>,
    /// Licenses the repository defines
    #[serde(default)]
    pub licenses: BTreeSet<String>,
}

/// A scanned repository: identity, metadata and checksum ledgers.
///
/// The repository is owned by the caller and read-only to the scan core for
/// the duration of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Stable repository identity; also addresses persisted caches
    pub id: String,
    #[serde(default)]
    pub metadata: RepoMetadata,
    /// Consolidated manifests, keyed by `category/package`
    #[serde(default)]
    pub manifests: BTreeMap<String, Manifest>,
    /// Legacy per-package ledgers, keyed by `category/package`.
    ///
    /// `None` means the repository does not maintain legacy ledgers at all;
    /// checks treat that as feature absence, not an error.
    #[serde(default)]
    pub legacy_ledgers: Option<BTreeMap<String, BTreeMap<String, ChecksumMap>>>,
}

impl Repository {
    /// Create an empty repository description.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: RepoMetadata::default(),
            manifests: BTreeMap::new(),
            legacy_ledgers: None,
        }
    }

    /// Set repository metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: RepoMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a consolidated manifest for a package.
    #[must_use]
    pub fn with_manifest(mut self, category: &str, package: &str, manifest: Manifest) -> Self {
        self.manifests
            .insert(format!("{category}/{package}"), manifest);
        self
    }

    /// Add a legacy ledger table for a package. The first call enables
    /// legacy-ledger support on the repository.
    #[must_use]
    pub fn with_legacy_ledger(
        mut self,
        category: &str,
        package: &str,
        entries: BTreeMap<String, ChecksumMap>,
    ) -> Self {
        self.legacy_ledgers
            .get_or_insert_with(BTreeMap::new)
            .insert(format!("{category}/{package}"), entries);
        self
    }

    /// Consolidated manifest for a package, if one exists.
    #[must_use]
    pub fn manifest(&self, category: &str, package: &str) -> Option<&Manifest> {
        self.manifests.get(&format!("{category}/{package}"))
    }

    /// Whether this repository maintains legacy per-package ledgers.
    #[must_use]
    pub fn has_legacy_ledger(&self) -> bool {
        self.legacy_ledgers.is_some()
    }

    /// Legacy ledger table for a package, if present.
    #[must_use]
    pub fn legacy_ledger(
        &self,
        category: &str,
        package: &str,
    ) -> Option<&BTreeMap<String, ChecksumMap>> {
        self.legacy_ledgers
            .as_ref()
            .and_then(|ledgers| ledgers.get(&format!("{category}/{package}")))
    }

    /// Legacy checksums for one file of a package.
    ///
    /// # Errors
    ///
    /// Returns [`MissingChecksum`] when the package has no ledger table or
    /// the table has no entry for `filename`.
    pub fn legacy_checksums(
        &self,
        category: &str,
        package: &str,
        filename: &str,
    ) -> Result<&ChecksumMap, MissingChecksum> {
        self.legacy_ledger(category, package)
            .and_then(|table| table.get(filename))
            .ok_or_else(|| MissingChecksum {
                filename: filename.to_string(),
            })
    }
}

//! Record data model and record sources.
//!
//! A [`Record`] is a single versioned package unit identified by
//! `(category, package, version)`. Records declare distributable files with
//! checksum maps, feature flags and licenses. The owning [`Repository`] is
//! passed to the scan alongside the record stream and exposes the checksum
//! ledgers.
//!
//! # Architecture
//!
//! - [`repository`]: the repository description, its metadata and the two
//!   checksum-ledger formats
//! - [`source`]: the JSON-lines record source used by the CLI

pub mod repository;
pub mod source;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

pub use repository::{Manifest, MissingChecksum, RepoMetadata, Repository, MANIFEST_FORMAT};
pub use source::{JsonRecordSource, SourceError};

/// Mapping of checksum-algorithm name to digest value.
///
/// A `BTreeMap` keeps algorithm iteration order stable so repeated scans of
/// unchanged input render identically.
pub type ChecksumMap = BTreeMap<String, String>;

/// A distributable file declared by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distfile {
    /// File name, unique within the repository's distfile namespace
    pub name: String,
    /// Declared checksums, algorithm name to digest
    #[serde(default)]
    pub checksums: ChecksumMap,
}

impl Distfile {
    /// Create a distfile with no checksums.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checksums: ChecksumMap::new(),
        }
    }

    /// Add a checksum declaration.
    #[must_use]
    pub fn with_checksum(mut self, algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        self.checksums.insert(algorithm.into(), digest.into());
        self
    }
}

/// A single versioned package record.
///
/// Records are produced by a record source in strict
/// `(category, package, version)` sort order and are read-only to the scan
/// core for the duration of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub category: String,
    pub package: String,
    pub version: String,
    /// Distributable files this record declares
    #[serde(default)]
    pub distfiles: Vec<Distfile>,
    /// Feature flags this record uses
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Licenses this record declares
    #[serde(default)]
    pub licenses: BTreeSet<String>,
}

impl Record {
    /// Create a record with no distfiles, flags or licenses.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            package: package.into(),
            version: version.into(),
            distfiles: Vec::new(),
            flags: BTreeSet::new(),
            licenses: BTreeSet::new(),
        }
    }

    /// Add a declared distfile.
    #[must_use]
    pub fn with_distfile(mut self, distfile: Distfile) -> Self {
        self.distfiles.push(distfile);
        self
    }

    /// Add declared feature flags.
    #[must_use]
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Add declared licenses.
    #[must_use]
    pub fn with_licenses<I, S>(mut self, licenses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.licenses.extend(licenses.into_iter().map(Into::into));
        self
    }

    /// The `category/package` key this record belongs to.
    #[must_use]
    pub fn cp(&self) -> String {
        format!("{}/{}", self.category, self.package)
    }

    /// The full `category/package-version` identity of this record.
    #[must_use]
    pub fn cpv(&self) -> String {
        format!("{}/{}-{}", self.category, self.package, self.version)
    }

    /// Sort key tuple used to validate record stream ordering.
    #[must_use]
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.category, &self.package, &self.version)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.category, self.package, self.version)
    }
}

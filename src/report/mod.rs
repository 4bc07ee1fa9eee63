//! Findings and report sinks.
//!
//! Checks emit immutable [`Finding`] values during `feed`/`finish`; the core
//! hands them straight to a [`Reporter`] and holds no finding state after
//! emission. Reporters are append-only and are never consulted for
//! deduplication - the pipeline guarantees no duplicate finding identity per
//! scan.
//!
//! Multi-value finding fields (checksum triples, orphan lists, flag lists)
//! are sorted at construction so repeated scans of unchanged input render
//! byte-identically.

use std::fmt;
use std::io::Write;

use serde::Serialize;
use yansi::Paint;

use crate::record::Record;

/// Severity class of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One algorithm-level checksum disagreement.
///
/// `found` is the value declared by the side being checked, `expected` the
/// value already on record for the same `(filename, algorithm)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ChecksumConflict {
    pub algorithm: String,
    pub found: String,
    pub expected: String,
}

impl ChecksumConflict {
    #[must_use]
    pub fn new(
        algorithm: impl Into<String>,
        found: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            found: found.into(),
            expected: expected.into(),
        }
    }
}

fn render_conflicts(conflicts: &[ChecksumConflict]) -> String {
    let parts: Vec<String> = conflicts
        .iter()
        .map(|c| format!("{} {} != {}", c.algorithm, c.found, c.expected))
        .collect();
    parts.join(", ")
}

/// An emitted, immutable analysis result.
///
/// Constructors sort multi-value fields; severity and a stable identity key
/// are derived from the variant and the records it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "kebab-case")]
pub enum Finding {
    /// Two records declare the same distfile with disagreeing digests.
    ConflictingChecksums {
        category: String,
        package: String,
        version: String,
        filename: String,
        conflicts: Vec<ChecksumConflict>,
        /// Identities of every record previously seen declaring the file
        others: Vec<String>,
    },
    /// A legacy-ledger entry has no counterpart in the manifest.
    MissingInManifest {
        category: String,
        package: String,
        version: String,
        filename: String,
    },
    /// Manifest and legacy ledger disagree on a file's digests.
    ManifestMismatch {
        category: String,
        package: String,
        version: String,
        filename: String,
        conflicts: Vec<ChecksumConflict>,
    },
    /// Manifest entries never matched by any legacy entry in the package.
    OrphanedManifestEntries {
        category: String,
        package: String,
        files: Vec<String>,
    },
    /// A record's legacy-ledger entry is unavailable.
    MissingChecksum {
        category: String,
        package: String,
        version: String,
        filename: String,
    },
    /// Globally defined flags used by no record in the repository.
    UnusedGlobalFlags { flags: Vec<String> },
    /// Flags defined for a package but used by none of its records.
    UnusedLocalFlags {
        category: String,
        package: String,
        flags: Vec<String>,
    },
    /// Licenses defined by the repository but referenced by no record.
    UnusedLicenses { licenses: Vec<String> },
    /// A check errored or panicked inside a lifecycle callback.
    CheckFailure {
        check: String,
        stage: String,
        context: String,
        error: String,
    },
}

impl Finding {
    /// Build a [`Finding::ConflictingChecksums`], sorting the conflict
    /// triples by algorithm and the seen-list lexicographically.
    #[must_use]
    pub fn conflicting_checksums(
        record: &Record,
        filename: impl Into<String>,
        mut conflicts: Vec<ChecksumConflict>,
        mut others: Vec<String>,
    ) -> Self {
        conflicts.sort();
        others.sort();
        Self::ConflictingChecksums {
            category: record.category.clone(),
            package: record.package.clone(),
            version: record.version.clone(),
            filename: filename.into(),
            conflicts,
            others,
        }
    }

    #[must_use]
    pub fn missing_in_manifest(record: &Record, filename: impl Into<String>) -> Self {
        Self::MissingInManifest {
            category: record.category.clone(),
            package: record.package.clone(),
            version: record.version.clone(),
            filename: filename.into(),
        }
    }

    /// Build a [`Finding::ManifestMismatch`] with conflicts sorted by
    /// algorithm.
    #[must_use]
    pub fn manifest_mismatch(
        record: &Record,
        filename: impl Into<String>,
        mut conflicts: Vec<ChecksumConflict>,
    ) -> Self {
        conflicts.sort();
        Self::ManifestMismatch {
            category: record.category.clone(),
            package: record.package.clone(),
            version: record.version.clone(),
            filename: filename.into(),
            conflicts,
        }
    }

    /// Build a [`Finding::OrphanedManifestEntries`] with files sorted.
    #[must_use]
    pub fn orphaned_manifest_entries(
        category: impl Into<String>,
        package: impl Into<String>,
        mut files: Vec<String>,
    ) -> Self {
        files.sort();
        Self::OrphanedManifestEntries {
            category: category.into(),
            package: package.into(),
            files,
        }
    }

    #[must_use]
    pub fn missing_checksum(record: &Record, filename: impl Into<String>) -> Self {
        Self::MissingChecksum {
            category: record.category.clone(),
            package: record.package.clone(),
            version: record.version.clone(),
            filename: filename.into(),
        }
    }

    #[must_use]
    pub fn unused_global_flags(mut flags: Vec<String>) -> Self {
        flags.sort();
        Self::UnusedGlobalFlags { flags }
    }

    #[must_use]
    pub fn unused_local_flags(
        category: impl Into<String>,
        package: impl Into<String>,
        mut flags: Vec<String>,
    ) -> Self {
        flags.sort();
        Self::UnusedLocalFlags {
            category: category.into(),
            package: package.into(),
            flags,
        }
    }

    #[must_use]
    pub fn unused_licenses(mut licenses: Vec<String>) -> Self {
        licenses.sort();
        Self::UnusedLicenses { licenses }
    }

    /// Short kebab-case name of the finding kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConflictingChecksums { .. } => "conflicting-checksums",
            Self::MissingInManifest { .. } => "missing-in-manifest",
            Self::ManifestMismatch { .. } => "manifest-mismatch",
            Self::OrphanedManifestEntries { .. } => "orphaned-manifest-entries",
            Self::MissingChecksum { .. } => "missing-checksum",
            Self::UnusedGlobalFlags { .. } => "unused-global-flags",
            Self::UnusedLocalFlags { .. } => "unused-local-flags",
            Self::UnusedLicenses { .. } => "unused-licenses",
            Self::CheckFailure { .. } => "check-failure",
        }
    }

    /// Severity class of this finding.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::ConflictingChecksums { .. }
            | Self::MissingInManifest { .. }
            | Self::ManifestMismatch { .. }
            | Self::MissingChecksum { .. }
            | Self::CheckFailure { .. } => Severity::Error,
            Self::OrphanedManifestEntries { .. }
            | Self::UnusedGlobalFlags { .. }
            | Self::UnusedLocalFlags { .. }
            | Self::UnusedLicenses { .. } => Severity::Warning,
        }
    }

    /// Stable identity key, identical across scans of identical input.
    #[must_use]
    pub fn identity(&self) -> String {
        match self {
            Self::ConflictingChecksums {
                category,
                package,
                version,
                filename,
                ..
            } => format!("{}:{category}/{package}-{version}:{filename}", self.name()),
            Self::MissingInManifest {
                category,
                package,
                version,
                filename,
            }
            | Self::ManifestMismatch {
                category,
                package,
                version,
                filename,
                ..
            }
            | Self::MissingChecksum {
                category,
                package,
                version,
                filename,
            } => format!("{}:{category}/{package}-{version}:{filename}", self.name()),
            Self::OrphanedManifestEntries {
                category, package, ..
            }
            | Self::UnusedLocalFlags {
                category, package, ..
            } => format!("{}:{category}/{package}", self.name()),
            Self::UnusedGlobalFlags { .. } | Self::UnusedLicenses { .. } => {
                self.name().to_string()
            }
            Self::CheckFailure {
                check,
                stage,
                context,
                ..
            } => format!("{}:{check}:{stage}:{context}", self.name()),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictingChecksums {
                category,
                package,
                version,
                filename,
                conflicts,
                others,
            } => write!(
                f,
                "{category}/{package}-{version}: conflicts with ({}) for file '{filename}', checksums: {}",
                others.join(", "),
                render_conflicts(conflicts),
            ),
            Self::MissingInManifest {
                category,
                package,
                version,
                filename,
            } => write!(
                f,
                "{category}/{package}-{version}: file '{filename}' missing in manifest"
            ),
            Self::ManifestMismatch {
                category,
                package,
                version,
                filename,
                conflicts,
            } => write!(
                f,
                "{category}/{package}-{version}: file '{filename}' checksum conflict: {}",
                render_conflicts(conflicts),
            ),
            Self::OrphanedManifestEntries {
                category,
                package,
                files,
            } => write!(
                f,
                "{category}/{package}: manifest knows of ({}), but no ledger entry does",
                files.join(", "),
            ),
            Self::MissingChecksum {
                category,
                package,
                version,
                filename,
            } => write!(
                f,
                "{category}/{package}-{version}: no checksum ledger entry for '{filename}'"
            ),
            Self::UnusedGlobalFlags { flags } => {
                write!(f, "unused global flag(s): {}", flags.join(", "))
            }
            Self::UnusedLocalFlags {
                category,
                package,
                flags,
            } => write!(
                f,
                "{category}/{package}: unused local flag(s): {}",
                flags.join(", "),
            ),
            Self::UnusedLicenses { licenses } => {
                write!(f, "unused license(s): {}", licenses.join(", "))
            }
            Self::CheckFailure {
                check,
                stage,
                context,
                error,
            } => write!(f, "check '{check}' failed in {stage} ({context}): {error}"),
        }
    }
}

/// Append-only sink for findings.
pub trait Reporter {
    fn report(&mut self, finding: Finding);
}

impl Reporter for Vec<Finding> {
    fn report(&mut self, finding: Finding) {
        self.push(finding);
    }
}

/// Reporter printing one human-readable line per finding.
pub struct PlainReporter<W: Write> {
    writer: W,
    errors: usize,
}

impl<W: Write> PlainReporter<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer, errors: 0 }
    }

    /// Number of error-severity findings reported so far.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors
    }
}

impl<W: Write> Reporter for PlainReporter<W> {
    fn report(&mut self, finding: Finding) {
        let severity = finding.severity();
        if severity == Severity::Error {
            self.errors += 1;
        }
        let label = match severity {
            Severity::Info => severity.cyan().to_string(),
            Severity::Warning => severity.yellow().to_string(),
            Severity::Error => severity.red().to_string(),
        };
        if let Err(e) = writeln!(self.writer, "{label}: {finding}") {
            log::error!("failed writing finding: {e}");
        }
    }
}

/// Reporter printing one JSON object per line.
pub struct JsonReporter<W: Write> {
    writer: W,
    errors: usize,
}

impl<W: Write> JsonReporter<W> {
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer, errors: 0 }
    }

    /// Number of error-severity findings reported so far.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, finding: Finding) {
        if finding.severity() == Severity::Error {
            self.errors += 1;
        }
        match serde_json::to_string(&finding) {
            Ok(json) => {
                if let Err(e) = writeln!(self.writer, "{json}") {
                    log::error!("failed writing finding: {e}");
                }
            }
            Err(e) => log::error!("failed serializing finding: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record::new("app-arch", "tar", "1.35")
    }

    #[test]
    fn test_conflict_fields_sorted() {
        let finding = Finding::conflicting_checksums(
            &sample_record(),
            "tar-1.35.tar.xz",
            vec![
                ChecksumConflict::new("sha512", "b", "c"),
                ChecksumConflict::new("sha256", "a", "d"),
            ],
            vec!["z/z-1".to_string(), "a/a-1".to_string()],
        );
        match &finding {
            Finding::ConflictingChecksums {
                conflicts, others, ..
            } => {
                assert_eq!(conflicts[0].algorithm, "sha256");
                assert_eq!(others, &["a/a-1", "z/z-1"]);
            }
            other => panic!("unexpected finding {other:?}"),
        }
    }

    #[test]
    fn test_identity_stable() {
        let a = Finding::missing_in_manifest(&sample_record(), "f.tar.xz");
        let b = Finding::missing_in_manifest(&sample_record(), "f.tar.xz");
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.identity(), "missing-in-manifest:app-arch/tar-1.35:f.tar.xz");
    }

    #[test]
    fn test_severities() {
        assert_eq!(
            Finding::missing_checksum(&sample_record(), "f").severity(),
            Severity::Error
        );
        assert_eq!(
            Finding::unused_global_flags(vec!["x".into()]).severity(),
            Severity::Warning
        );
    }

    #[test]
    fn test_display_rendering() {
        let finding = Finding::orphaned_manifest_entries(
            "app-arch",
            "tar",
            vec!["b.tar".to_string(), "a.tar".to_string()],
        );
        assert_eq!(
            finding.to_string(),
            "app-arch/tar: manifest knows of (a.tar, b.tar), but no ledger entry does"
        );
    }

    #[test]
    fn test_plain_reporter_counts_errors() {
        let mut reporter = PlainReporter::new(Vec::new());
        reporter.report(Finding::missing_checksum(&sample_record(), "f"));
        reporter.report(Finding::unused_licenses(vec!["MIT".into()]));
        assert_eq!(reporter.errors(), 1);
    }

    #[test]
    fn test_json_reporter_emits_tagged_objects() {
        let mut out = Vec::new();
        {
            let mut reporter = JsonReporter::new(&mut out);
            reporter.report(Finding::unused_licenses(vec!["MIT".into()]));
        }
        let line = String::from_utf8(out).unwrap();
        assert!(line.contains("\"finding\":\"unused-licenses\""));
    }
}

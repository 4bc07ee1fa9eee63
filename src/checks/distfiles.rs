//! Distfile consistency checks.
//!
//! Distributable files are frequently shared across many records (a common
//! source tarball, say); declaring inconsistent digests for the same file is
//! a correctness bug regardless of which record is "right". The detector
//! here is O(total declared files) with one amortized lookup per file, never
//! a pairwise record comparison.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;

use crate::record::{ChecksumMap, MissingChecksum, MANIFEST_FORMAT};
use crate::report::{ChecksumConflict, Finding, Reporter};
use crate::scan::{Check, FeedUnit, ScanContext};

/// Detects conflicting checksum declarations for a shared distfile.
///
/// Fed one record at a time, accumulating `filename -> (best known checksum
/// set, identities of every declaring record)` across the whole scan. On a
/// conflict the stored set is kept (first seen wins); on agreement a
/// strictly richer declaration replaces the stored set (monotonic
/// enrichment). The declaring record's identity is appended to the
/// seen-list in every case, so later conflicts name all earlier declarers.
#[derive(Default)]
pub struct ChecksumConflictCheck {
    seen: HashMap<String, (ChecksumMap, Vec<String>)>,
}

impl ChecksumConflictCheck {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Check for ChecksumConflictCheck {
    fn name(&self) -> &'static str {
        "conflicting-checksums"
    }

    fn feed(
        &mut self,
        unit: FeedUnit<'_>,
        _ctx: &ScanContext<'_>,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let FeedUnit::Version(record) = unit else {
            anyhow::bail!("expected a version feed unit, got {}", unit.context());
        };
        for distfile in &record.distfiles {
            match self.seen.get_mut(&distfile.name) {
                Some((stored, holders)) => {
                    // Conflicts exist only on the algorithm intersection;
                    // disjoint algorithm sets are not a conflict.
                    let conflicts: Vec<ChecksumConflict> = distfile
                        .checksums
                        .iter()
                        .filter_map(|(algorithm, found)| {
                            stored.get(algorithm).and_then(|expected| {
                                (expected != found).then(|| {
                                    ChecksumConflict::new(algorithm, found, expected)
                                })
                            })
                        })
                        .collect();
                    if !conflicts.is_empty() {
                        reporter.report(Finding::conflicting_checksums(
                            record,
                            &distfile.name,
                            conflicts,
                            holders.clone(),
                        ));
                    } else if distfile.checksums.len() > stored.len() {
                        *stored = distfile.checksums.clone();
                    }
                    holders.push(record.cpv());
                }
                None => {
                    self.seen.insert(
                        distfile.name.clone(),
                        (distfile.checksums.clone(), vec![record.cpv()]),
                    );
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &ScanContext<'_>, _reporter: &mut dyn Reporter) -> Result<()> {
        self.seen.clear();
        Ok(())
    }
}

/// Reconciles the legacy per-package checksum ledger against the
/// consolidated manifest.
///
/// Fed one package run at a time. Packages whose manifest is not at the
/// reconcilable format version are skipped, as are repositories without
/// legacy-ledger support (feature detection, not an error). Unavailable
/// ledger entries degrade to per-record findings; manifest entries never
/// matched by any legacy entry across the run are reported as orphans.
#[derive(Default)]
pub struct ManifestSyncCheck;

impl ManifestSyncCheck {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Check for ManifestSyncCheck {
    fn name(&self) -> &'static str {
        "manifest-conflicts"
    }

    fn feed(
        &mut self,
        unit: FeedUnit<'_>,
        ctx: &ScanContext<'_>,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let FeedUnit::Package(records) = unit else {
            anyhow::bail!("expected a package feed unit, got {}", unit.context());
        };
        let Some(first) = records.first() else {
            return Ok(());
        };
        let (category, package) = (first.category.as_str(), first.package.as_str());
        let Some(manifest) = ctx.repo.manifest(category, package) else {
            return Ok(());
        };
        if manifest.version != MANIFEST_FORMAT {
            log::debug!(
                "skipping {category}/{package}: manifest format {} not reconcilable",
                manifest.version
            );
            return Ok(());
        }
        if !ctx.repo.has_legacy_ledger() {
            return Ok(());
        }

        let mut matched: BTreeSet<&str> = BTreeSet::new();
        for record in records {
            for distfile in &record.distfiles {
                let ledger_entry =
                    match ctx.repo.legacy_checksums(category, package, &distfile.name) {
                        Ok(entry) => entry,
                        Err(MissingChecksum { filename }) => {
                            reporter.report(Finding::missing_checksum(record, filename));
                            continue;
                        }
                    };
                matched.insert(distfile.name.as_str());
                let Some(manifest_entry) = manifest.distfiles.get(&distfile.name) else {
                    reporter.report(Finding::missing_in_manifest(record, &distfile.name));
                    continue;
                };
                let conflicts: Vec<ChecksumConflict> = ledger_entry
                    .iter()
                    .filter_map(|(algorithm, ledger_value)| {
                        manifest_entry.get(algorithm).and_then(|manifest_value| {
                            (manifest_value != ledger_value).then(|| {
                                ChecksumConflict::new(algorithm, ledger_value, manifest_value)
                            })
                        })
                    })
                    .collect();
                if !conflicts.is_empty() {
                    reporter.report(Finding::manifest_mismatch(record, &distfile.name, conflicts));
                }
            }
        }

        let orphans: Vec<String> = manifest
            .distfiles
            .keys()
            .filter(|name| !matched.contains(name.as_str()))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            reporter.report(Finding::orphaned_manifest_entries(category, package, orphans));
        }
        Ok(())
    }
}

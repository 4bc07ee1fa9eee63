use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use repolint::checks::builtin_registry;
use repolint::config::ScanConfig;
use repolint::record::{Distfile, Record, Repository};
use repolint::report::{Finding, Reporter};
use repolint::scan::{Check, CheckRegistry, FeedUnit, ScanContext, Scanner, Scope};

/// Sorted record streams over a small alphabet, with a shared distfile whose
/// digest varies so checksum conflicts actually occur.
fn record_stream() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_map(
        ("[a-c]", "[p-r]"),
        prop::collection::btree_set("[0-9]", 1..4),
        0..8,
    )
    .prop_flat_map(|keys| {
        let identities: Vec<(String, String, String)> = keys
            .into_iter()
            .flat_map(|((category, package), versions)| {
                versions
                    .into_iter()
                    .map(move |version| (category.clone(), package.clone(), version))
            })
            .collect();
        let digests = prop::collection::vec("[ab]", identities.len());
        (Just(identities), digests)
    })
    .prop_map(|(identities, digests)| {
        identities
            .into_iter()
            .zip(digests)
            .map(|((category, package, version), digest)| {
                Record::new(category, package, version)
                    .with_distfile(Distfile::new("shared.tar.xz").with_checksum("sha256", digest))
            })
            .collect()
    })
}

fn scan_builtin(records: Vec<Record>) -> Vec<Finding> {
    let scanner = Scanner::new(builtin_registry().unwrap(), ScanConfig::default());
    let mut findings: Vec<Finding> = Vec::new();
    scanner
        .scan(&Repository::new("test"), records, &mut findings)
        .unwrap();
    findings
}

struct UnitLog {
    name: &'static str,
    units: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Check for UnitLog {
    fn name(&self) -> &'static str {
        self.name
    }

    fn feed(
        &mut self,
        unit: FeedUnit<'_>,
        _ctx: &ScanContext<'_>,
        _reporter: &mut dyn Reporter,
    ) -> anyhow::Result<()> {
        let identities = unit.records().iter().map(Record::cpv).collect();
        self.units.lock().unwrap().push(identities);
        Ok(())
    }
}

fn register_log(
    registry: &mut CheckRegistry,
    name: &'static str,
    scope: Scope,
) -> Arc<Mutex<Vec<Vec<String>>>> {
    let units = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::clone(&units);
    registry
        .register(
            name,
            scope,
            &[],
            Box::new(move |_| {
                Ok(Box::new(UnitLog {
                    name,
                    units: Arc::clone(&handle),
                }))
            }),
        )
        .unwrap();
    units
}

proptest! {
    #[test]
    fn test_scan_is_idempotent(records in record_stream()) {
        let first = scan_builtin(records.clone());
        let second = scan_builtin(records);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_partition_cardinality_matches_key_count(records in record_stream()) {
        let packages: BTreeSet<String> = records.iter().map(Record::cp).collect();
        let categories: BTreeSet<String> =
            records.iter().map(|r| r.category.clone()).collect();

        let mut registry = CheckRegistry::new();
        let version_units = register_log(&mut registry, "log-version", Scope::Version);
        let package_units = register_log(&mut registry, "log-package", Scope::Package);
        let category_units = register_log(&mut registry, "log-category", Scope::Category);

        let scanner = Scanner::new(registry, ScanConfig::default());
        let mut findings: Vec<Finding> = Vec::new();
        scanner
            .scan(&Repository::new("test"), records.clone(), &mut findings)
            .unwrap();

        let version_units = version_units.lock().unwrap();
        let package_units = package_units.lock().unwrap();
        let category_units = category_units.lock().unwrap();

        prop_assert_eq!(version_units.len(), records.len());
        prop_assert_eq!(package_units.len(), packages.len());
        prop_assert_eq!(category_units.len(), categories.len());

        // Every package unit is a contiguous run sharing one grouping key,
        // and the coarser partitions cover exactly the finer ones' records.
        for unit in package_units.iter() {
            let cps: BTreeSet<&str> = unit
                .iter()
                .map(|cpv| &cpv[..cpv.rfind('-').unwrap()])
                .collect();
            prop_assert_eq!(cps.len(), 1);
        }
        let flat = |units: &[Vec<String>]| -> Vec<String> {
            units.iter().flatten().cloned().collect()
        };
        prop_assert_eq!(flat(&version_units), flat(&package_units));
        prop_assert_eq!(flat(&package_units), flat(&category_units));
    }

    #[test]
    fn test_conflict_findings_match_digest_diversity(records in record_stream()) {
        let findings = scan_builtin(records.clone());

        // The stream declares one shared file with digests drawn from {a, b};
        // a conflict finding exists iff both digests occur, and every
        // conflict cites two differing values for the one algorithm.
        let digests: BTreeSet<&str> = records
            .iter()
            .map(|r| r.distfiles[0].checksums["sha256"].as_str())
            .collect();
        let conflicts: Vec<&Finding> = findings
            .iter()
            .filter(|f| matches!(f, Finding::ConflictingChecksums { .. }))
            .collect();

        if digests.len() < 2 {
            prop_assert!(conflicts.is_empty());
        } else {
            prop_assert!(!conflicts.is_empty());
        }
        for finding in conflicts {
            if let Finding::ConflictingChecksums { conflicts, .. } = finding {
                prop_assert_eq!(conflicts.len(), 1);
                prop_assert_ne!(&conflicts[0].found, &conflicts[0].expected);
            }
        }
    }
}

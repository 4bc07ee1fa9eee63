use std::sync::{Arc, Mutex};

use repolint::cache::CacheGranularity;
use repolint::config::ScanConfig;
use repolint::record::{Distfile, Record, Repository};
use repolint::report::{Finding, Reporter};
use repolint::scan::{Check, CheckRegistry, FeedUnit, ScanContext, Scanner, Scope};

/// Records every feed unit it receives as the list of record identities.
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

fn sample_stream() -> Vec<Record> {
    vec![
        Record::new("app-arch", "tar", "1.34"),
        Record::new("app-arch", "tar", "1.35"),
        Record::new("app-arch", "xz", "5.4"),
        Record::new("app-arch", "xz", "5.6"),
        Record::new("dev-libs", "glib", "2.78"),
        Record::new("dev-libs", "glib", "2.80"),
        Record::new("sys-apps", "coreutils", "9.4"),
    ]
}

#[test]
fn test_partition_cardinality_per_scope() {
    let mut registry = CheckRegistry::new();
    let versions = register_log(&mut registry, "log-version", Scope::Version);
    let packages = register_log(&mut registry, "log-package", Scope::Package);
    let categories = register_log(&mut registry, "log-category", Scope::Category);
    let repository = register_log(&mut registry, "log-repository", Scope::Repository);

    let scanner = Scanner::new(registry, ScanConfig::default());
    let repo = Repository::new("test");
    let mut findings: Vec<Finding> = Vec::new();
    let stats = scanner.scan(&repo, sample_stream(), &mut findings).unwrap();

    assert_eq!(stats.records, 7);
    assert_eq!(stats.packages, 4);
    assert_eq!(stats.categories, 3);

    let versions = versions.lock().unwrap();
    let packages = packages.lock().unwrap();
    let categories = categories.lock().unwrap();
    let repository = repository.lock().unwrap();

    assert_eq!(versions.len(), 7);
    assert_eq!(packages.len(), 4);
    assert_eq!(categories.len(), 3);
    assert_eq!(repository.len(), 1);

    // A coarser scope covers exactly the records the finer one sees, with
    // matching partition boundaries.
    let flat_versions: Vec<String> = versions.iter().flatten().cloned().collect();
    let flat_packages: Vec<String> = packages.iter().flatten().cloned().collect();
    let flat_categories: Vec<String> = categories.iter().flatten().cloned().collect();
    assert_eq!(flat_versions, flat_packages);
    assert_eq!(flat_packages, flat_categories);
    assert_eq!(flat_categories, repository[0]);

    assert_eq!(
        packages.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![2, 2, 2, 1]
    );
    assert_eq!(
        categories.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![4, 2, 1]
    );
}

#[test]
fn test_repeated_scans_are_identical() {
    let repo = Repository::new("gentoo").with_legacy_ledger(
        "app-arch",
        "tar",
        [(
            "tar-1.34.tar.xz".to_string(),
            [("sha256".to_string(), "aa".to_string())].into_iter().collect(),
        )]
        .into_iter()
        .collect(),
    );
    let records = vec![
        Record::new("app-arch", "tar", "1.34")
            .with_distfile(Distfile::new("shared.tar.xz").with_checksum("sha256", "aa")),
        Record::new("app-arch", "tar", "1.35")
            .with_distfile(Distfile::new("shared.tar.xz").with_checksum("sha256", "bb")),
    ];

    let scan = |records: Vec<Record>| -> Vec<Finding> {
        let registry = repolint::checks::builtin_registry().unwrap();
        let scanner = Scanner::new(registry, ScanConfig::default());
        let mut findings: Vec<Finding> = Vec::new();
        scanner.scan(&repo, records, &mut findings).unwrap();
        findings
    };

    let first = scan(records.clone());
    let second = scan(records);
    assert!(!first.is_empty());
    assert_eq!(first, second);

    // Byte-identical once rendered, too.
    let render = |findings: &[Finding]| {
        findings
            .iter()
            .map(|f| serde_json::to_string(f).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(render(&first), render(&second));
}

/// Fails on one specific package, emitting a finding beforehand that must be
/// discarded with the failed unit.
struct FailOn {
    target: &'static str,
}

impl Check for FailOn {
    fn name(&self) -> &'static str {
        "fail-on"
    }

    fn feed(
        &mut self,
        unit: FeedUnit<'_>,
        _ctx: &ScanContext<'_>,
        reporter: &mut dyn Reporter,
    ) -> anyhow::Result<()> {
        let record = &unit.records()[0];
        if record.cp() == self.target {
            reporter.report(Finding::unused_global_flags(vec!["partial".to_string()]));
            anyhow::bail!("boom");
        }
        Ok(())
    }
}

#[test]
fn test_check_failure_is_isolated() {
    let mut registry = CheckRegistry::new();
    registry
        .register(
            "fail-on",
            Scope::Package,
            &[],
            Box::new(|_| Ok(Box::new(FailOn { target: "app-arch/xz" }))),
        )
        .unwrap();
    let sibling = register_log(&mut registry, "log-package", Scope::Package);

    let scanner = Scanner::new(registry, ScanConfig::default());
    let repo = Repository::new("test");
    let mut findings: Vec<Finding> = Vec::new();
    let stats = scanner.scan(&repo, sample_stream(), &mut findings).unwrap();

    // The failure became a finding; the unit's partial finding was dropped.
    assert_eq!(stats.check_failures, 1);
    assert_eq!(findings.len(), 1);
    match &findings[0] {
        Finding::CheckFailure { check, stage, context, error } => {
            assert_eq!(check, "fail-on");
            assert_eq!(stage, "feed");
            assert_eq!(context, "package app-arch/xz");
            assert!(error.contains("boom"));
        }
        other => panic!("unexpected finding {other:?}"),
    }

    // The sibling check still saw every package unit.
    assert_eq!(sibling.lock().unwrap().len(), 4);
}

/// Panics once; the aggregator must contain it like an error return.
struct PanicOnce {
    done: bool,
}

impl Check for PanicOnce {
    fn name(&self) -> &'static str {
        "panic-once"
    }

    fn feed(
        &mut self,
        _unit: FeedUnit<'_>,
        _ctx: &ScanContext<'_>,
        _reporter: &mut dyn Reporter,
    ) -> anyhow::Result<()> {
        if !self.done {
            self.done = true;
            panic!("unexpected state");
        }
        Ok(())
    }
}

#[test]
fn test_panicking_check_is_contained() {
    let mut registry = CheckRegistry::new();
    registry
        .register(
            "panic-once",
            Scope::Version,
            &[],
            Box::new(|_| Ok(Box::new(PanicOnce { done: false }))),
        )
        .unwrap();

    let scanner = Scanner::new(registry, ScanConfig::default());
    let repo = Repository::new("test");
    let mut findings: Vec<Finding> = Vec::new();
    let stats = scanner.scan(&repo, sample_stream(), &mut findings).unwrap();

    assert_eq!(stats.check_failures, 1);
    assert!(matches!(
        &findings[0],
        Finding::CheckFailure { error, .. } if error.contains("unexpected state")
    ));
}

/// Observes whether the shared query cache is empty at each record, then
/// populates it.
struct CacheObserver {
    observations: Arc<Mutex<Vec<bool>>>,
}

impl Check for CacheObserver {
    fn name(&self) -> &'static str {
        "cache-observer"
    }

    fn feed(
        &mut self,
        _unit: FeedUnit<'_>,
        ctx: &ScanContext<'_>,
        _reporter: &mut dyn Reporter,
    ) -> anyhow::Result<()> {
        self.observations
            .lock()
            .unwrap()
            .push(ctx.query_cache.is_empty());
        ctx.query_cache.get_or_compute("marker", || 1u32);
        Ok(())
    }
}

#[test]
fn test_query_cache_cleared_at_package_boundaries() {
    let observations = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::clone(&observations);
    let mut registry = CheckRegistry::new();
    registry
        .register(
            "cache-observer",
            Scope::Version,
            &[],
            Box::new(move |_| {
                Ok(Box::new(CacheObserver {
                    observations: Arc::clone(&handle),
                }))
            }),
        )
        .unwrap();

    let config = ScanConfig::default().with_query_caching(CacheGranularity::Package);
    let scanner = Scanner::new(registry, config);
    let repo = Repository::new("test");
    let records = vec![
        Record::new("app-arch", "tar", "1.34"),
        Record::new("app-arch", "tar", "1.35"),
        Record::new("app-arch", "xz", "5.6"),
        Record::new("dev-libs", "glib", "2.80"),
    ];
    let mut findings: Vec<Finding> = Vec::new();
    scanner.scan(&repo, records, &mut findings).unwrap();

    // Empty at the first record of each package, carried across versions
    // within one.
    assert_eq!(*observations.lock().unwrap(), vec![true, false, true, true]);
}

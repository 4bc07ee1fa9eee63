//! The scope aggregator.
//!
//! Folds the pre-sorted record stream into feed units at every registered
//! check's scope and drives the `start`/`feed`/`finish` lifecycle. The
//! stream is consumed lazily: only the current package/category run is
//! buffered, and the whole stream is materialized only when some check
//! explicitly registered at [`Scope::Repository`].
//!
//! Input must already be sorted by (category, package, version); a violation
//! is a precondition error, not silently tolerated. A check failing inside a
//! lifecycle callback is isolated: findings buffered by the failing call are
//! discarded, a [`Finding::CheckFailure`] is emitted instead, and processing
//! of sibling checks and subsequent feed units continues.

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use thiserror::Error;

use crate::cache::QueryCache;
use crate::config::ScanConfig;
use crate::record::{Record, Repository};
use crate::report::{Finding, Reporter};

use super::registry::{CheckRegistry, ConfigError, RunningCheck};
use super::{Check, FeedUnit, ScanContext, Scope};

/// Fatal scan failure.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("record stream not sorted by (category, package, version): '{prev}' followed by '{next}'")]
    UnsortedInput { prev: String, next: String },
    #[error("duplicate record '{cpv}' in input stream")]
    DuplicateRecord { cpv: String },
}

/// Statistics from one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Records consumed from the source
    pub records: usize,
    /// Package groups observed
    pub packages: usize,
    /// Category groups observed
    pub categories: usize,
    /// Findings handed to the reporter, failure findings included
    pub findings: usize,
    /// Check lifecycle failures converted to findings
    pub check_failures: usize,
}

/// Drives registered checks over a record stream.
pub struct Scanner {
    registry: CheckRegistry,
    config: ScanConfig,
}

impl Scanner {
    #[must_use]
    pub fn new(registry: CheckRegistry, config: ScanConfig) -> Self {
        Self { registry, config }
    }

    /// Run every registered check over `records`.
    ///
    /// Findings go to `reporter` as they are emitted; the scanner holds no
    /// finding state after emission.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Config`] if check construction fails and
    /// [`ScanError::UnsortedInput`]/[`ScanError::DuplicateRecord`] on
    /// ordering violations in the stream.
    pub fn scan<I>(
        &self,
        repo: &Repository,
        records: I,
        reporter: &mut dyn Reporter,
    ) -> Result<ScanStats, ScanError>
    where
        I: IntoIterator<Item = Record>,
    {
        let addons = self.registry.build_addons(repo, &self.config);
        let mut checks = self.registry.instantiate(&addons)?;
        let query_cache = QueryCache::new(self.config.query_caching);
        let ctx = ScanContext {
            repo,
            query_cache: &query_cache,
        };
        let mut stats = ScanStats::default();

        log::info!(
            "scanning repository '{}' with {} check(s)",
            repo.id,
            checks.len()
        );

        let want_package = checks.iter().any(|c| c.scope == Scope::Package);
        let want_category = checks.iter().any(|c| c.scope == Scope::Category);
        let want_repository = checks.iter().any(|c| c.scope == Scope::Repository);
        let buffering = want_package || want_category || want_repository;

        for running in &mut checks {
            run_stage(running, "start", "repository", reporter, &mut stats, |check, _| {
                check.start(&ctx)
            });
        }

        // Current category's records; the current package run is the tail
        // starting at `package_start`.
        let mut category_buf: Vec<Record> = Vec::new();
        let mut package_start = 0usize;
        let mut repository_buf: Vec<Record> = Vec::new();
        let mut prev: Option<(String, String, String)> = None;

        for record in records {
            if let Some((prev_cat, prev_pkg, prev_ver)) = &prev {
                let (cat, pkg, ver) = record.sort_key();
                if cat < prev_cat.as_str() || (cat == prev_cat.as_str() && pkg < prev_pkg.as_str())
                {
                    return Err(ScanError::UnsortedInput {
                        prev: format!("{prev_cat}/{prev_pkg}-{prev_ver}"),
                        next: record.cpv(),
                    });
                }
                let category_changed = cat != prev_cat.as_str();
                let package_changed = category_changed || pkg != prev_pkg.as_str();
                if !package_changed && ver == prev_ver.as_str() {
                    return Err(ScanError::DuplicateRecord { cpv: record.cpv() });
                }

                if package_changed {
                    stats.packages += 1;
                    flush_package(
                        &mut checks,
                        &category_buf,
                        package_start,
                        &ctx,
                        reporter,
                        &mut stats,
                    );
                    package_start = category_buf.len();
                    if !want_category && !want_repository {
                        category_buf.clear();
                        package_start = 0;
                    }
                }
                if category_changed {
                    stats.categories += 1;
                    flush_category(
                        &mut checks,
                        &mut category_buf,
                        &mut repository_buf,
                        want_repository,
                        &ctx,
                        reporter,
                        &mut stats,
                    );
                    package_start = 0;
                }
            }

            query_cache.advance(&record);
            dispatch(
                &mut checks,
                Scope::Version,
                FeedUnit::Version(&record),
                &ctx,
                reporter,
                &mut stats,
            );
            stats.records += 1;
            prev = Some((
                record.category.clone(),
                record.package.clone(),
                record.version.clone(),
            ));
            if buffering {
                category_buf.push(record);
            }
        }

        if prev.is_some() {
            stats.packages += 1;
            stats.categories += 1;
            flush_package(
                &mut checks,
                &category_buf,
                package_start,
                &ctx,
                reporter,
                &mut stats,
            );
            flush_category(
                &mut checks,
                &mut category_buf,
                &mut repository_buf,
                want_repository,
                &ctx,
                reporter,
                &mut stats,
            );
            if want_repository {
                dispatch(
                    &mut checks,
                    Scope::Repository,
                    FeedUnit::Repository(&repository_buf),
                    &ctx,
                    reporter,
                    &mut stats,
                );
            }
        }

        for running in &mut checks {
            run_stage(
                running,
                "finish",
                "repository",
                reporter,
                &mut stats,
                |check, batch| check.finish(&ctx, batch),
            );
        }

        log::info!(
            "scan complete: {} record(s) in {} package(s) across {} categor(ies), {} finding(s)",
            stats.records,
            stats.packages,
            stats.categories,
            stats.findings
        );
        Ok(stats)
    }
}

/// Feed the current package run to package-scope checks.
fn flush_package(
    checks: &mut [RunningCheck],
    category_buf: &[Record],
    package_start: usize,
    ctx: &ScanContext<'_>,
    reporter: &mut dyn Reporter,
    stats: &mut ScanStats,
) {
    if package_start < category_buf.len() {
        dispatch(
            checks,
            Scope::Package,
            FeedUnit::Package(&category_buf[package_start..]),
            ctx,
            reporter,
            stats,
        );
    }
}

/// Feed the completed category to category-scope checks, then either hand
/// its records to the repository buffer or drop them.
fn flush_category(
    checks: &mut [RunningCheck],
    category_buf: &mut Vec<Record>,
    repository_buf: &mut Vec<Record>,
    want_repository: bool,
    ctx: &ScanContext<'_>,
    reporter: &mut dyn Reporter,
    stats: &mut ScanStats,
) {
    if !category_buf.is_empty() {
        dispatch(
            checks,
            Scope::Category,
            FeedUnit::Category(category_buf),
            ctx,
            reporter,
            stats,
        );
    }
    if want_repository {
        repository_buf.append(category_buf);
    } else {
        category_buf.clear();
    }
}

fn dispatch(
    checks: &mut [RunningCheck],
    scope: Scope,
    unit: FeedUnit<'_>,
    ctx: &ScanContext<'_>,
    reporter: &mut dyn Reporter,
    stats: &mut ScanStats,
) {
    if unit.records().is_empty() {
        return;
    }
    let context = unit.context();
    for running in checks.iter_mut().filter(|c| c.scope == scope) {
        run_stage(running, "feed", &context, reporter, stats, |check, batch| {
            check.feed(unit, ctx, batch)
        });
    }
}

/// Run one lifecycle callback with fault isolation.
///
/// Findings the callback emitted are buffered and flushed only on success;
/// a feed unit is either completed or failed entirely.
fn run_stage<F>(
    running: &mut RunningCheck,
    stage: &str,
    context: &str,
    reporter: &mut dyn Reporter,
    stats: &mut ScanStats,
    f: F,
) where
    F: FnOnce(&mut dyn Check, &mut dyn Reporter) -> Result<()>,
{
    let mut batch: Vec<Finding> = Vec::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        f(running.check.as_mut(), &mut batch)
    }));
    let error = match outcome {
        Ok(Ok(())) => {
            stats.findings += batch.len();
            for finding in batch {
                reporter.report(finding);
            }
            return;
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };
    log::error!(
        "check '{}' failed in {stage} ({context}): {error}",
        running.name
    );
    stats.check_failures += 1;
    stats.findings += 1;
    reporter.report(Finding::CheckFailure {
        check: running.name.to_string(),
        stage: stage.to_string(),
        context: context.to_string(),
        error,
    });
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

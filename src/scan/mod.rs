//! Scope-based scan execution.
//!
//! The pipeline folds a pre-sorted record stream into nested groups at each
//! check's requested granularity and drives the check lifecycle:
//!
//! 1. `start()` once, before the first feed unit,
//! 2. `feed(unit)` once per feed unit,
//! 3. `finish()` once, after the last feed unit.
//!
//! Checks are invoked synchronously in registration order. A failing check
//! is isolated: its error becomes a [`crate::report::Finding::CheckFailure`]
//! and neither sibling checks nor subsequent feed units are affected.
//!
//! # Architecture
//!
//! - [`pipeline`]: the scope aggregator driving checks over the stream
//! - [`registry`]: the explicit check registration table
//! - [`addons`]: shared helper indexes injected into checks

pub mod addons;
pub mod pipeline;
pub mod registry;

use std::fmt;

use anyhow::Result;

use crate::cache::QueryCache;
use crate::record::{Record, Repository};
use crate::report::Reporter;

pub use addons::{AddonId, Addons, FlagIndex, LicenseIndex};
pub use pipeline::{ScanError, ScanStats, Scanner};
pub use registry::{CheckRegistry, ConfigError};

/// Aggregation granularity, totally ordered by containment
/// (version ⊂ package ⊂ category ⊂ repository).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// One record per feed unit
    Version,
    /// A maximal contiguous run of records sharing the package key
    Package,
    /// A maximal contiguous run of records sharing the category
    Category,
    /// The entire stream, materialized into one feed unit.
    ///
    /// Registering at this scope opts the check into the memory cost of
    /// holding every record; repository-wide aggregates should normally use
    /// the fold pattern over a narrower feed scope instead.
    Repository,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => write!(f, "version"),
            Self::Package => write!(f, "package"),
            Self::Category => write!(f, "category"),
            Self::Repository => write!(f, "repository"),
        }
    }
}

/// The batch of records a check receives at one `feed()` invocation, sized
/// per its declared scope.
#[derive(Debug, Clone, Copy)]
pub enum FeedUnit<'a> {
    Version(&'a Record),
    Package(&'a [Record]),
    Category(&'a [Record]),
    Repository(&'a [Record]),
}

impl<'a> FeedUnit<'a> {
    /// All records covered by this unit.
    #[must_use]
    pub fn records(&self) -> &'a [Record] {
        match self {
            Self::Version(record) => std::slice::from_ref(record),
            Self::Package(records) | Self::Category(records) | Self::Repository(records) => {
                records
            }
        }
    }

    /// Human-readable description of the unit, used in failure findings.
    #[must_use]
    pub fn context(&self) -> String {
        match self {
            Self::Version(record) => format!("version {record}"),
            Self::Package(records) => match records.first() {
                Some(first) => format!("package {}", first.cp()),
                None => "package <empty>".to_string(),
            },
            Self::Category(records) => match records.first() {
                Some(first) => format!("category {}", first.category),
                None => "category <empty>".to_string(),
            },
            Self::Repository(_) => "repository".to_string(),
        }
    }
}

/// Read-only scan environment handed to every lifecycle callback.
pub struct ScanContext<'a> {
    /// The repository under scan
    pub repo: &'a Repository,
    /// Shared transient memoization table
    pub query_cache: &'a QueryCache,
}

/// An analysis check driven by the pipeline.
///
/// Implementations accumulate whatever state they need across `feed` calls;
/// repository-wide aggregates use the fold pattern: seed an accumulator in
/// `start`, subtract matched items per `feed`, emit the residual in
/// `finish`.
pub trait Check {
    /// Stable check identity.
    fn name(&self) -> &'static str;

    /// Called once before the first feed unit.
    fn start(&mut self, _ctx: &ScanContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once per feed unit at the check's declared scope.
    fn feed(
        &mut self,
        unit: FeedUnit<'_>,
        ctx: &ScanContext<'_>,
        reporter: &mut dyn Reporter,
    ) -> Result<()>;

    /// Called once after the last feed unit.
    fn finish(&mut self, _ctx: &ScanContext<'_>, _reporter: &mut dyn Reporter) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_containment_order() {
        assert!(Scope::Version < Scope::Package);
        assert!(Scope::Package < Scope::Category);
        assert!(Scope::Category < Scope::Repository);
    }

    #[test]
    fn test_feed_unit_records() {
        let record = Record::new("a", "b", "1");
        let unit = FeedUnit::Version(&record);
        assert_eq!(unit.records().len(), 1);
        assert_eq!(unit.context(), "version a/b-1");

        let run = vec![Record::new("a", "b", "1"), Record::new("a", "b", "2")];
        let unit = FeedUnit::Package(&run);
        assert_eq!(unit.records().len(), 2);
        assert_eq!(unit.context(), "package a/b");
    }
}

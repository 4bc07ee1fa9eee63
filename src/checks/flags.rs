//! Unused flag-definition checks.
//!
//! Repository-wide aggregates over narrower feed units use the fold
//! pattern: seed an accumulator at `start()`, subtract matched items per
//! `feed()`, emit the residual at `finish()`. That keeps the whole
//! repository out of memory.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;

use crate::report::{Finding, Reporter};
use crate::scan::{Check, FeedUnit, FlagIndex, ScanContext};

/// Reports globally defined flags used by no record in the repository.
pub struct UnusedGlobalFlagsCheck {
    index: Arc<FlagIndex>,
    unused: BTreeSet<String>,
}

impl UnusedGlobalFlagsCheck {
    #[must_use]
    pub fn new(index: Arc<FlagIndex>) -> Self {
        Self {
            index,
            unused: BTreeSet::new(),
        }
    }
}

impl Check for UnusedGlobalFlagsCheck {
    fn name(&self) -> &'static str {
        "unused-global-flags"
    }

    fn start(&mut self, _ctx: &ScanContext<'_>) -> Result<()> {
        self.unused = self.index.global.clone();
        Ok(())
    }

    fn feed(
        &mut self,
        unit: FeedUnit<'_>,
        _ctx: &ScanContext<'_>,
        _reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let FeedUnit::Version(record) = unit else {
            anyhow::bail!("expected a version feed unit, got {}", unit.context());
        };
        if !self.unused.is_empty() {
            for flag in &record.flags {
                self.unused.remove(flag);
            }
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &ScanContext<'_>, reporter: &mut dyn Reporter) -> Result<()> {
        if !self.unused.is_empty() {
            reporter.report(Finding::unused_global_flags(
                self.unused.iter().cloned().collect(),
            ));
            self.unused.clear();
        }
        Ok(())
    }
}

/// Reports flags defined for a package but used by none of its records.
pub struct UnusedLocalFlagsCheck {
    index: Arc<FlagIndex>,
}

impl UnusedLocalFlagsCheck {
    #[must_use]
    pub fn new(index: Arc<FlagIndex>) -> Self {
        Self { index }
    }
}

impl Check for UnusedLocalFlagsCheck {
    fn name(&self) -> &'static str {
        "unused-local-flags"
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
        let index = Arc::clone(&self.index);
        let (category, package) = (first.category.clone(), first.package.clone());
        let declared: Arc<BTreeSet<String>> = ctx
            .query_cache
            .get_or_compute(&format!("local-flags:{}", first.cp()), move || {
                index
                    .local_flags(&category, &package)
                    .cloned()
                    .unwrap_or_default()
            });
        if declared.is_empty() {
            return Ok(());
        }
        let mut unused: BTreeSet<String> = declared.as_ref().clone();
        for record in records {
            for flag in &record.flags {
                unused.remove(flag);
            }
        }
        if !unused.is_empty() {
            reporter.report(Finding::unused_local_flags(
                &first.category,
                &first.package,
                unused.into_iter().collect(),
            ));
        }
        Ok(())
    }
}

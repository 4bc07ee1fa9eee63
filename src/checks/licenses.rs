//! Unused license-definition check.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;

use crate::report::{Finding, Reporter};
use crate::scan::{Check, FeedUnit, LicenseIndex, ScanContext};

/// Reports licenses the repository defines but no record references.
///
/// Same fold shape as the global-flag check: the accumulator is seeded from
/// the license index at `start()` and whittled down one record at a time.
pub struct UnusedLicensesCheck {
    index: Arc<LicenseIndex>,
    unused: BTreeSet<String>,
}

impl UnusedLicensesCheck {
    #[must_use]
    pub fn new(index: Arc<LicenseIndex>) -> Self {
        Self {
            index,
            unused: BTreeSet::new(),
        }
    }
}

impl Check for UnusedLicensesCheck {
    fn name(&self) -> &'static str {
        "unused-licenses"
    }

    fn start(&mut self, _ctx: &ScanContext<'_>) -> Result<()> {
        self.unused = self.index.known.clone();
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
            for license in &record.licenses {
                self.unused.remove(license);
            }
        }
        Ok(())
    }

    fn finish(&mut self, _ctx: &ScanContext<'_>, reporter: &mut dyn Reporter) -> Result<()> {
        if !self.unused.is_empty() {
            reporter.report(Finding::unused_licenses(
                self.unused.iter().cloned().collect(),
            ));
            self.unused.clear();
        }
        Ok(())
    }
}

//! Repolint - QA scanner for versioned package repositories
//!
//! Streams a pre-sorted record stream through scope-aware consistency
//! checks (checksum conflicts, ledger reconciliation, unused definitions),
//! with transient query caching and persisted derived indexes, reporting
//! structured findings.

pub mod cache;
pub mod checks;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod report;
pub mod scan;

//! The built-in check catalog.
//!
//! Checks implement [`crate::scan::Check`] and are wired into a
//! [`CheckRegistry`] by [`builtin_registry`], the single explicit
//! registration table executed at startup.
//!
//! # Catalog
//!
//! - [`distfiles::ChecksumConflictCheck`]: conflicting content-checksum
//!   declarations across records sharing a distfile
//! - [`distfiles::ManifestSyncCheck`]: reconciliation of the legacy
//!   per-package checksum ledger against the consolidated manifest
//! - [`flags::UnusedGlobalFlagsCheck`], [`flags::UnusedLocalFlagsCheck`]:
//!   flag definitions used by no record
//! - [`licenses::UnusedLicensesCheck`]: license definitions referenced by
//!   no record

pub mod distfiles;
pub mod flags;
pub mod licenses;

pub use distfiles::{ChecksumConflictCheck, ManifestSyncCheck};
pub use flags::{UnusedGlobalFlagsCheck, UnusedLocalFlagsCheck};
pub use licenses::UnusedLicensesCheck;

use crate::scan::{AddonId, CheckRegistry, ConfigError, Scope};

/// Build the registry of every built-in check.
///
/// # Errors
///
/// Returns [`ConfigError`] if the table is internally inconsistent
/// (duplicate identity or an addon dependency the registry cannot satisfy).
pub fn builtin_registry() -> Result<CheckRegistry, ConfigError> {
    let mut registry = CheckRegistry::new();
    registry.register(
        "conflicting-checksums",
        Scope::Version,
        &[],
        Box::new(|_| Ok(Box::new(ChecksumConflictCheck::new()))),
    )?;
    registry.register(
        "manifest-conflicts",
        Scope::Package,
        &[],
        Box::new(|_| Ok(Box::new(ManifestSyncCheck::new()))),
    )?;
    registry.register(
        "unused-global-flags",
        Scope::Version,
        &[AddonId::FlagIndex],
        Box::new(|addons| {
            Ok(Box::new(UnusedGlobalFlagsCheck::new(
                addons.require_flag_index()?,
            )))
        }),
    )?;
    registry.register(
        "unused-local-flags",
        Scope::Package,
        &[AddonId::FlagIndex],
        Box::new(|addons| {
            Ok(Box::new(UnusedLocalFlagsCheck::new(
                addons.require_flag_index()?,
            )))
        }),
    )?;
    registry.register(
        "unused-licenses",
        Scope::Version,
        &[AddonId::LicenseIndex],
        Box::new(|addons| {
            Ok(Box::new(UnusedLicensesCheck::new(
                addons.require_license_index()?,
            )))
        }),
    )?;
    Ok(registry)
}

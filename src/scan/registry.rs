//! Check registration table.
//!
//! Checks are registered explicitly at process start: identity, feed scope,
//! required addons and a constructor. Registration is validated eagerly -
//! unresolvable addon dependencies and duplicate identities fail fast with a
//! [`ConfigError`] before any feed unit is processed.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::cache::CacheRegistry;
use crate::config::ScanConfig;
use crate::record::Repository;

use super::addons::{AddonId, Addons};
use super::{Check, Scope};

/// Unsatisfiable scan setup; fatal before any feed unit is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("check '{check}' requires unavailable addon '{addon}'")]
    UnresolvableAddon { check: String, addon: AddonId },
    #[error("check '{0}' registered more than once")]
    DuplicateCheck(String),
    #[error("addon '{0}' was not constructed for this scan")]
    MissingAddon(AddonId),
}

/// Constructor invoked once per scan with the resolved addons.
pub type CheckFactory = Box<dyn Fn(&Addons) -> Result<Box<dyn Check>, ConfigError>>;

struct CheckEntry {
    name: &'static str,
    scope: Scope,
    required: &'static [AddonId],
    factory: CheckFactory,
}

pub(crate) struct RunningCheck {
    pub(crate) name: &'static str,
    pub(crate) scope: Scope,
    pub(crate) check: Box<dyn Check>,
}

/// Table of registered checks and the addon set available to them.
pub struct CheckRegistry {
    entries: Vec<CheckEntry>,
    available_addons: BTreeSet<AddonId>,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckRegistry {
    /// Empty registry with every addon available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            available_addons: [AddonId::FlagIndex, AddonId::LicenseIndex]
                .into_iter()
                .collect(),
        }
    }

    /// Empty registry with a restricted addon set. Used by embedders that
    /// disable helpers (and by tests exercising resolution failures).
    #[must_use]
    pub fn with_addons(available_addons: BTreeSet<AddonId>) -> Self {
        Self {
            entries: Vec::new(),
            available_addons,
        }
    }

    /// Register a check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnresolvableAddon`] if a required addon is not
    /// in the available set, [`ConfigError::DuplicateCheck`] on identity
    /// reuse.
    pub fn register(
        &mut self,
        name: &'static str,
        scope: Scope,
        required: &'static [AddonId],
        factory: CheckFactory,
    ) -> Result<(), ConfigError> {
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(ConfigError::DuplicateCheck(name.to_string()));
        }
        for addon in required {
            if !self.available_addons.contains(addon) {
                return Err(ConfigError::UnresolvableAddon {
                    check: name.to_string(),
                    addon: *addon,
                });
            }
        }
        self.entries.push(CheckEntry {
            name,
            scope,
            required,
            factory,
        });
        Ok(())
    }

    /// Number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered check names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Build the addons required by the registered checks.
    pub(crate) fn build_addons(&self, repo: &Repository, config: &ScanConfig) -> Addons {
        let required: BTreeSet<AddonId> = self
            .entries
            .iter()
            .flat_map(|entry| entry.required.iter().copied())
            .collect();
        let cache = config.cache_root.as_ref().map(CacheRegistry::new);
        Addons::build(repo, &required, cache.as_ref())
    }

    /// Instantiate every registered check with the resolved addons, in
    /// registration order.
    pub(crate) fn instantiate(&self, addons: &Addons) -> Result<Vec<RunningCheck>, ConfigError> {
        self.entries
            .iter()
            .map(|entry| {
                Ok(RunningCheck {
                    name: entry.name,
                    scope: entry.scope,
                    check: (entry.factory)(addons)?,
                })
            })
            .collect()
    }
}

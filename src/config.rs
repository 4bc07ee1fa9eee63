//! Scan configuration.
//!
//! The CLI/config layer supplies a handful of opaque settings the core
//! never interprets further: the query-cache granularity and the persisted
//! cache root. Cache-removal options (selection, dry-run, force) stay in
//! the CLI layer.

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::cache::CacheGranularity;

/// Configuration for one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// How often the transient query cache is cleared
    pub query_caching: CacheGranularity,
    /// Root directory for persisted caches; `None` disables persistence
    pub cache_root: Option<PathBuf>,
}

impl ScanConfig {
    /// Set the query-cache granularity.
    #[must_use]
    pub fn with_query_caching(mut self, granularity: CacheGranularity) -> Self {
        self.query_caching = granularity;
        self
    }

    /// Set the persisted-cache root.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Platform-specific default cache root.
    #[must_use]
    pub fn default_cache_root() -> Option<PathBuf> {
        ProjectDirs::from("com", "repolint", "repolint")
            .map(|dirs| dirs.cache_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.query_caching, CacheGranularity::Package);
        assert!(config.cache_root.is_none());
    }

    #[test]
    fn test_builders() {
        let config = ScanConfig::default()
            .with_query_caching(CacheGranularity::Category)
            .with_cache_root("/tmp/cache");
        assert_eq!(config.query_caching, CacheGranularity::Category);
        assert_eq!(config.cache_root, Some(PathBuf::from("/tmp/cache")));
    }
}

//! Command-line interface definitions.
//!
//! All CLI arguments, subcommands and options using the clap derive API,
//! with global options (verbosity, color) and subcommands for scanning and
//! cache maintenance.
//!
//! # Example
//!
//! ```bash
//! # Scan a repository description plus record stream
//! repolint scan --repo repo.json --records records.jsonl
//!
//! # JSON output for scripting
//! repolint scan --repo repo.json --records records.jsonl --output json
//!
//! # Clear the query cache per category instead of per package
//! repolint scan --repo repo.json --records records.jsonl --reset-caching-per category
//!
//! # Inspect and prune persisted caches
//! repolint cache list
//! repolint cache remove --type flags --dry-run
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::{CacheGranularity, CacheKind};

/// QA scanner for versioned package repositories.
///
/// Repolint streams pre-sorted package records through scope-aware
/// consistency checks and reports structured findings.
#[derive(Debug, Parser)]
#[command(name = "repolint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a repository's record stream
    Scan(ScanArgs),
    /// Inspect or remove persisted caches
    Cache(CacheArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Repository description file (JSON)
    #[arg(long, value_name = "FILE")]
    pub repo: PathBuf,

    /// Record stream file, one JSON record per line, pre-sorted by
    /// category/package/version
    #[arg(long, value_name = "FILE")]
    pub records: PathBuf,

    /// Control how often the query cache is cleared
    #[arg(long, value_enum, value_name = "SCOPE", default_value = "package")]
    pub reset_caching_per: GranularityArg,

    /// Persisted-cache directory (defaults to the platform cache dir)
    #[arg(long, value_name = "DIR", env = "REPOLINT_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Disable persisted caches for this scan
    #[arg(long)]
    pub no_cache: bool,

    /// Output format (plain for humans, json for scripting)
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

/// Cache maintenance operations.
#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// List existing cache files per type
    List {
        /// Persisted-cache directory (defaults to the platform cache dir)
        #[arg(long, value_name = "DIR", env = "REPOLINT_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
    },
    /// Remove cache files
    Remove {
        /// Cache types to remove (default: all)
        #[arg(long = "type", value_enum, value_delimiter = ',', value_name = "TYPE")]
        types: Vec<CacheTypeArg>,

        /// Show what would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Wipe the entire cache directory tree
        #[arg(long, conflicts_with_all = ["types", "dry_run"])]
        force: bool,

        /// Persisted-cache directory (defaults to the platform cache dir)
        #[arg(long, value_name = "DIR", env = "REPOLINT_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
    },
}

/// Query-cache clearing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Version,
    Package,
    Category,
}

impl From<GranularityArg> for CacheGranularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Version => Self::Version,
            GranularityArg::Package => Self::Package,
            GranularityArg::Category => Self::Category,
        }
    }
}

/// Reporter output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Persisted-cache types addressable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheTypeArg {
    Flags,
    Licenses,
}

impl From<CacheTypeArg> for CacheKind {
    fn from(arg: CacheTypeArg) -> Self {
        match arg {
            CacheTypeArg::Flags => Self::FlagIndex,
            CacheTypeArg::Licenses => Self::LicenseIndex,
        }
    }
}

//! Entry point for the repolint CLI application.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use repolint::cache::{CacheKind, CacheRegistry, CACHE_TYPES};
use repolint::checks::builtin_registry;
use repolint::cli::{CacheArgs, CacheCommands, Cli, Commands, OutputFormat, ScanArgs};
use repolint::config::ScanConfig;
use repolint::error::ExitCode;
use repolint::record::{JsonRecordSource, Record, Repository};
use repolint::report::{JsonReporter, PlainReporter};
use repolint::scan::{ScanStats, Scanner};

fn main() {
    let cli = Cli::parse();
    repolint::logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    match run(cli) {
        Ok(code) => process::exit(code.as_i32()),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(ExitCode::GeneralError.as_i32());
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Cache(args) => run_cache(args),
    }
}

fn run_scan(args: ScanArgs) -> Result<ExitCode> {
    let repo: Repository = {
        let file = File::open(&args.repo).with_context(|| {
            format!(
                "failed opening repository description '{}'",
                args.repo.display()
            )
        })?;
        serde_json::from_reader(BufReader::new(file)).with_context(|| {
            format!(
                "failed parsing repository description '{}'",
                args.repo.display()
            )
        })?
    };
    let records: Vec<Record> = JsonRecordSource::open(&args.records)
        .with_context(|| format!("failed opening record stream '{}'", args.records.display()))?
        .collect::<Result<_, _>>()
        .with_context(|| format!("failed reading record stream '{}'", args.records.display()))?;

    let registry = builtin_registry()?;
    let mut config = ScanConfig::default().with_query_caching(args.reset_caching_per.into());
    if !args.no_cache {
        if let Some(dir) = args.cache_dir.or_else(ScanConfig::default_cache_root) {
            config = config.with_cache_root(dir);
        }
    }
    let scanner = Scanner::new(registry, config);

    let stdout = io::stdout().lock();
    let (stats, errors) = match args.output {
        OutputFormat::Plain => {
            let mut reporter = PlainReporter::new(stdout);
            let stats = scanner.scan(&repo, records, &mut reporter)?;
            (stats, reporter.errors())
        }
        OutputFormat::Json => {
            let mut reporter = JsonReporter::new(stdout);
            let stats = scanner.scan(&repo, records, &mut reporter)?;
            (stats, reporter.errors())
        }
    };
    Ok(scan_exit_code(&stats, errors))
}

fn scan_exit_code(stats: &ScanStats, errors: usize) -> ExitCode {
    log::debug!(
        "{} finding(s), {} at error severity",
        stats.findings,
        errors
    );
    if errors > 0 {
        ExitCode::FindingsFound
    } else {
        ExitCode::Clean
    }
}

fn run_cache(args: CacheArgs) -> Result<ExitCode> {
    match args.command {
        CacheCommands::List { cache_dir } => {
            let registry = cache_registry(cache_dir)?;
            for (kind, paths) in registry.existing() {
                for path in paths {
                    println!("{kind}: {}", path.display());
                }
            }
            Ok(ExitCode::Clean)
        }
        CacheCommands::Remove {
            types,
            dry_run,
            force,
            cache_dir,
        } => {
            let registry = cache_registry(cache_dir)?;
            if force {
                registry.remove_all()?;
                log::info!("removed cache directory '{}'", registry.root().display());
                return Ok(ExitCode::Clean);
            }
            let selection: BTreeSet<CacheKind> = if types.is_empty() {
                CACHE_TYPES.iter().map(|descriptor| descriptor.kind).collect()
            } else {
                types.into_iter().map(Into::into).collect()
            };
            for path in registry.remove(&selection, dry_run)? {
                if dry_run {
                    println!("Would remove {}", path.display());
                } else {
                    println!("Removed {}", path.display());
                }
            }
            Ok(ExitCode::Clean)
        }
    }
}

fn cache_registry(cache_dir: Option<PathBuf>) -> Result<CacheRegistry> {
    let root = cache_dir
        .or_else(ScanConfig::default_cache_root)
        .context("unable to determine the cache directory")?;
    Ok(CacheRegistry::new(root))
}

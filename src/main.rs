//! Binary entry point for gtfsio.
//!
//! Converts feeds between directories and zip archives and reports on their
//! contents.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gtfsio::config::FeedConfig;
use gtfsio::observability;
use gtfsio::Feed;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// gtfsio - import and export multi-table delimited-text feeds.
#[derive(Parser)]
#[command(name = "gtfsio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "GTFSIO_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Field delimiter, overriding the configuration.
    #[arg(short, long, global = true)]
    delimiter: Option<char>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Load a feed and write it to another location.
    Convert {
        /// Source directory or zip archive.
        source: PathBuf,

        /// Destination directory, or zip archive when ending in `.zip`.
        destination: PathBuf,
    },

    /// Show the tables of a feed and what the import did.
    Inspect {
        /// Source directory or zip archive.
        source: PathBuf,
    },

    /// Print the order tables would be imported in.
    Order {
        /// Source directory or zip archive.
        source: PathBuf,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.delimiter) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_config(&config, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration, applying environment and command line overrides.
fn load_config(path: Option<&Path>, delimiter: Option<char>) -> Result<FeedConfig> {
    let config = match path {
        Some(path) => FeedConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FeedConfig::load_default(),
    };
    let config = config.with_env_overrides()?;

    match delimiter {
        Some(delimiter) => {
            let config = config.with_delimiter(delimiter);
            config.csv_options()?;
            Ok(config)
        },
        None => Ok(config),
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &FeedConfig) -> Result<()> {
    match command {
        Commands::Convert {
            source,
            destination,
        } => cmd_convert(&source, &destination, config),
        Commands::Inspect { source } => cmd_inspect(&source, config),
        Commands::Order { source } => cmd_order(&source, config),
    }
}

fn cmd_convert(source: &Path, destination: &Path, config: &FeedConfig) -> Result<()> {
    let feed = Feed::open_with_config(source, config)
        .with_context(|| format!("importing {}", source.display()))?;
    let report = feed
        .save(destination)
        .with_context(|| format!("saving {}", destination.display()))?;

    let rows: usize = report.tables.iter().map(|(_, rows)| rows).sum();
    println!(
        "Wrote {} tables ({rows} rows) to {}",
        report.tables.len(),
        destination.display()
    );
    if report.schema_document {
        println!("Wrote schema document {}", config.schema_document);
    }
    Ok(())
}

fn cmd_inspect(source: &Path, config: &FeedConfig) -> Result<()> {
    let feed = Feed::open_with_config(source, config)
        .with_context(|| format!("importing {}", source.display()))?;
    let report = feed.import_report();

    println!("Feed: {}", source.display());
    println!();
    println!("{:<28} {:>10} {:>8} {:>8}", "TABLE", "ROWS", "DROPPED", "NULLED");
    for (name, decoded) in &report.tables {
        println!(
            "{name:<28} {:>10} {:>8} {:>8}",
            decoded.rows_appended,
            decoded.rows_dropped(),
            decoded.nulled_durations
        );
        if !decoded.ignored_fields.is_empty() {
            println!("  ignored fields: {}", decoded.ignored_fields.join(", "));
        }
    }

    if report.seeded_rows > 0 {
        println!();
        println!("Seeded rows: {}", report.seeded_rows);
    }
    if let Some(merged) = &report.merged {
        println!(
            "Schema document: {} tables, {} columns, {} relations added",
            merged.tables_added, merged.columns_added, merged.relations_added
        );
    }
    if !report.skipped.is_empty() {
        println!("Skipped files: {}", report.skipped.join(", "));
    }
    Ok(())
}

fn cmd_order(source: &Path, config: &FeedConfig) -> Result<()> {
    let order = Feed::import_order(source, config)
        .with_context(|| format!("resolving {}", source.display()))?;
    for (position, name) in order.iter().enumerate() {
        println!("{:>3}. {name}", position + 1);
    }
    Ok(())
}

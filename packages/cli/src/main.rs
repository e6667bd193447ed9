#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the outage map toolchain.
//!
//! Parses utility snapshot files, compares consecutive snapshots to write
//! outage notifications, and exports outage history as CSV.

mod config;
mod pipeline;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use outage_map_notify::history::{HighImpactFilter, filter_high_impact};
use outage_map_outage_models::Utility;
use outage_map_source::parse_snapshot;
use outage_map_source::registry::{all_utilities, utility_definition};
use outage_map_source::snapshot::snapshot_time_from_filename;
use outage_map_spatial::{DEFAULT_ZIP_PROPERTY, ZipIndex, ZipWhitelist};

use crate::config::NotifierConfig;
use crate::pipeline::{
    NotifyOutcome, ZipFilter, run_dump, run_notify, run_summarize, write_records_csv,
    write_summary_csv,
};

/// Exit code when a directory holds fewer than two snapshots to compare.
const NOT_ENOUGH_SNAPSHOTS_EXIT_CODE: i32 = 3;

#[derive(Parser)]
#[command(name = "outage_map_cli", about = "Utility outage snapshot tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured utilities
    Utilities,
    /// Parse one snapshot file and print its outages as JSON
    Parse {
        /// Utility the snapshot belongs to (e.g., "scl")
        #[arg(short, long, value_parser = parse_utility)]
        utility: Utility,
        /// Snapshot file to parse
        #[arg(short, long)]
        file: PathBuf,
        /// Snapshot time (RFC 3339). Defaults to the time in the file name.
        #[arg(long, value_parser = parse_snapshot_time)]
        snapshot_time: Option<DateTime<Utc>>,
    },
    /// Compare consecutive snapshots and write notification files
    Notify {
        /// Utility whose snapshots to compare
        #[arg(short, long, value_parser = parse_utility)]
        utility: Utility,
        /// Directory containing the snapshot files
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,
        /// TOML file with thresholds. Overrides the threshold flags.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Minimum hours remaining until the restoration estimate
        #[arg(short = 'r', long, default_value = "0.0")]
        remaining_expected_length_threshold: f64,
        /// Minimum customers impacted
        #[arg(short, long, default_value = "100")]
        customer_threshold: u64,
        /// Customers impacted at which an outage is always notable
        #[arg(short = 'l', long, default_value = "1000")]
        large_outage_customer_threshold: u64,
        /// Minimum hours the outage has already lasted
        #[arg(short, long, default_value = "0.0")]
        elapsed_time_threshold: f64,
        /// `GeoJSON` zip code boundaries used to tag outages with a zip
        #[arg(long)]
        zip_boundaries: Option<PathBuf>,
        /// Feature property holding the zip code in `--zip-boundaries`
        #[arg(long, default_value = DEFAULT_ZIP_PROPERTY)]
        zip_property: String,
        /// File of zip codes (one per line) to restrict notifications to.
        /// Requires `--zip-boundaries`.
        #[arg(long, requires = "zip_boundaries")]
        zip_whitelist: Option<PathBuf>,
        /// Directory notification files are written to
        #[arg(long, default_value = ".")]
        notification_output_dir: PathBuf,
    },
    /// Summarize every outage seen across a directory of snapshots as CSV
    Summarize {
        /// Utility whose snapshots to summarize
        #[arg(short, long, value_parser = parse_utility)]
        utility: Utility,
        /// Directory containing the snapshot files
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,
        /// CSV output path. Prints to stdout if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keep outages already present in the first snapshot or still
        /// present in the last
        #[arg(long)]
        include_edges: bool,
        /// Only keep large, long-running outages
        #[arg(long)]
        high_impact: bool,
    },
    /// Write every outage of every snapshot in a directory as CSV rows
    Dump {
        /// Utility whose snapshots to dump
        #[arg(short, long, value_parser = parse_utility)]
        utility: Utility,
        /// Directory containing the snapshot files
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,
        /// CSV output path
        #[arg(short, long, default_value = "outage_updates.csv")]
        output: PathBuf,
        /// Only read the two most recent snapshots
        #[arg(short, long)]
        latest: bool,
    },
}

fn parse_utility(s: &str) -> Result<Utility, String> {
    s.parse().map_err(|_| {
        let known: Vec<String> = Utility::all().iter().map(ToString::to_string).collect();
        format!("unknown utility '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_snapshot_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time '{s}': {e}"))
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Utilities => {
            println!("{:<10} {:<45} {:<22} SUFFIX", "ID", "NAME", "FORMAT");
            println!("{}", "-".repeat(100));
            for def in all_utilities() {
                println!(
                    "{:<10} {:<45} {:<22} {}",
                    def.utility, def.name, def.feed_format, def.snapshot_suffix
                );
            }
        }
        Commands::Parse {
            utility,
            file,
            snapshot_time,
        } => {
            let snapshot_time = match snapshot_time {
                Some(t) => t,
                None => {
                    let file_name = file
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| format!("Not a file: {}", file.display()))?;
                    let suffix = utility_definition(utility).snapshot_suffix;
                    snapshot_time_from_filename(&file_name, &suffix)?
                }
            };

            let raw = std::fs::read_to_string(&file)?;
            let records = parse_snapshot(utility, &raw, snapshot_time);
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Notify {
            utility,
            directory,
            config,
            remaining_expected_length_threshold,
            customer_threshold,
            large_outage_customer_threshold,
            elapsed_time_threshold,
            zip_boundaries,
            zip_property,
            zip_whitelist,
            notification_output_dir,
        } => {
            log::info!("Starting notifier for utility {utility}");

            let notifier_config = match config {
                Some(path) => NotifierConfig::load(&path)?,
                None => NotifierConfig {
                    remaining_expected_length_threshold,
                    customer_threshold,
                    large_outage_customer_threshold,
                    elapsed_time_threshold,
                },
            };
            notifier_config.log();

            let zip_filter = match zip_boundaries {
                Some(path) => Some(ZipFilter {
                    index: ZipIndex::load(&path, &zip_property)?,
                    whitelist: zip_whitelist
                        .as_deref()
                        .map(ZipWhitelist::load)
                        .transpose()?,
                }),
                None => None,
            };

            let outcome = run_notify(
                utility,
                &directory,
                &notifier_config.thresholds(),
                zip_filter.as_ref(),
                &notification_output_dir,
            )?;

            match outcome {
                NotifyOutcome::NotEnoughSnapshots { found } => {
                    log::warn!("Found {found} snapshot(s), not enough to compare. Exiting.");
                    std::process::exit(NOT_ENOUGH_SNAPSHOTS_EXIT_CODE);
                }
                NotifyOutcome::Compared {
                    comparisons,
                    written,
                } => {
                    log::info!(
                        "Notifier complete: {comparisons} comparisons, {} notifications written",
                        written.len()
                    );
                }
            }
        }
        Commands::Summarize {
            utility,
            directory,
            output,
            include_edges,
            high_impact,
        } => {
            let mut summaries = run_summarize(utility, &directory, !include_edges)?;
            if high_impact {
                summaries = filter_high_impact(&summaries, &HighImpactFilter::default());
                log::info!("{} high impact outages", summaries.len());
            }

            match output {
                Some(path) => {
                    write_summary_csv(&summaries, std::fs::File::create(&path)?)?;
                    log::info!(
                        "Wrote {} outage summaries to {}",
                        summaries.len(),
                        path.display()
                    );
                }
                None => write_summary_csv(&summaries, std::io::stdout().lock())?,
            }
        }
        Commands::Dump {
            utility,
            directory,
            output,
            latest,
        } => {
            let records = run_dump(utility, &directory, latest)?;
            if records.is_empty() {
                log::warn!("No outage data found in {}", directory.display());
            } else {
                write_records_csv(&records, std::fs::File::create(&output)?)?;
                log::info!(
                    "Aggregated {} outage updates into {}",
                    records.len(),
                    output.display()
                );
            }
        }
    }

    Ok(())
}

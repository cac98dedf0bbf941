#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fv_extent::{check_bounds, merge_extents, parse_report};
use fv_harness::{
    MergeSummary, RunSummary, SystemExecutor, TrialInput, TrialLog, VerifyConfig,
    partition_size_sectors, run_trial,
};
use fv_types::PartitionBounds;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fragverify",
    version,
    about = "Validate filefrag extent reports against raw device content"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check mounted files against the raw device backing their filesystem.
    Verify {
        /// Raw device (or image) holding the filesystem.
        #[arg(long)]
        device: PathBuf,
        /// Files to check, as seen through the mounted filesystem.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Label used in results; defaults to the device name.
        #[arg(long)]
        label: Option<String>,
        /// Partition size in 512-byte sectors; looked up when omitted.
        #[arg(long)]
        partition_sectors: Option<u64>,
        /// Bytes compared at each end of the file.
        #[arg(long)]
        compare_bytes: Option<usize>,
        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
        /// Write the per-step trial log as NDJSON.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Parse and merge an extent report without touching any device.
    Parse {
        /// Report file; `-` or omitted reads stdin.
        report: Option<PathBuf>,
        /// Also check the merged extents against this partition size.
        #[arg(long)]
        partition_sectors: Option<u64>,
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    init_tracing();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Returns `false` when a check failed.
fn run() -> Result<bool> {
    match Cli::parse().command {
        Command::Verify {
            device,
            files,
            label,
            partition_sectors,
            compare_bytes,
            config,
            json,
            log,
        } => {
            let mut config = match config {
                Some(path) => VerifyConfig::load(&path)?,
                None => VerifyConfig::default(),
            };
            if let Some(compare_bytes) = compare_bytes {
                config.compare_bytes = compare_bytes;
            }
            let label = label.unwrap_or_else(|| device_label(&device));
            verify(
                &device,
                &files,
                &label,
                partition_sectors,
                &config,
                json,
                log.as_deref(),
            )
        }
        Command::Parse {
            report,
            partition_sectors,
            json,
        } => parse(report.as_deref(), partition_sectors, json),
    }
}

fn device_label(device: &Path) -> String {
    device
        .file_name()
        .map_or_else(|| device.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn partition_bounds(sectors: u64) -> Result<PartitionBounds> {
    PartitionBounds::new(sectors).context("invalid --partition-sectors")
}

fn verify(
    device: &Path,
    files: &[PathBuf],
    label: &str,
    partition_sectors: Option<u64>,
    config: &VerifyConfig,
    json: bool,
    log_path: Option<&Path>,
) -> Result<bool> {
    let exec = SystemExecutor;
    let partition = match partition_sectors {
        Some(sectors) => partition_bounds(sectors)?,
        None => partition_size_sectors(&exec, &config.sysfs_root, device)
            .with_context(|| format!("failed to determine size of {}", device.display()))?,
    };

    info!(
        device = %device.display(),
        size_sectors = partition.size_sectors,
        files = files.len(),
        compare_bytes = config.compare_bytes,
        "starting verification"
    );

    let mut log = TrialLog::new();
    let mut outcomes = Vec::with_capacity(files.len());
    let mut fatal = None;
    for file in files {
        let input = TrialInput {
            label: label.to_owned(),
            file: file.clone(),
            device: device.to_path_buf(),
            partition,
        };
        match run_trial(&exec, &input, config, &mut log) {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                fatal = Some(
                    anyhow::Error::new(err)
                        .context(format!("trial for {} aborted", file.display())),
                );
                break;
            }
        }
    }

    if let Some(path) = log_path {
        log.write_to(path)?;
    }
    if let Some(err) = fatal {
        return Err(err);
    }

    let summary = RunSummary::from_outcomes(outcomes);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize run summary")?
        );
    } else {
        for outcome in &summary.outcomes {
            println!("{}: {}", outcome.file, outcome.result_line());
        }
        println!(
            "{} trials: {} passed, {} failed, {} skipped, {} inconclusive",
            summary.trials, summary.passed, summary.failed, summary.skipped, summary.inconclusive
        );
    }
    Ok(!summary.has_failures())
}

#[derive(Serialize)]
struct ParseOutput {
    merge: MergeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<fv_extent::BoundsCheck>,
}

fn parse(report: Option<&Path>, partition_sectors: Option<u64>, json: bool) -> Result<bool> {
    let text = match report {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report {}", path.display()))?,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read report from stdin")?;
            text
        }
    };

    let merged = merge_extents(&parse_report(&text));
    if merged.is_empty() {
        bail!("no extents found in report");
    }
    let bounds = partition_sectors
        .map(partition_bounds)
        .transpose()?
        .map(|partition| check_bounds(&merged.extents, partition));
    let output = ParseOutput {
        merge: MergeSummary::from(&merged),
        bounds,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serialize parse output")?
        );
    } else {
        for extent in &output.merge.extents {
            println!("{extent}");
        }
        println!(
            "extents: {} -> {}, sectors: {} -> {}",
            output.merge.before_count,
            output.merge.after_count,
            output.merge.before_sectors,
            output.merge.after_sectors
        );
        if let Some(bounds) = &output.bounds {
            println!(
                "bounds: max_end={} size={} {}",
                bounds.max_end,
                bounds.size_sectors,
                if bounds.holds() { "ok" } else { "VIOLATED" }
            );
        }
    }
    Ok(output.bounds.is_none_or(|b| b.holds()))
}

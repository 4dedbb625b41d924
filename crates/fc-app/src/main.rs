use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fc_core::{ExtractConfig, Extractor, RunOutcome, RunSummary};

#[derive(Parser)]
#[command(name = "firmcarve")]
#[command(about = "Carve keys, certificates, credentials and partitions out of firmware images", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an image for key, certificate and credential signatures
    Scan {
        /// Image to scan
        input: PathBuf,

        /// Extra pattern definitions (JSON)
        #[arg(long = "patterns")]
        pattern_file: Option<PathBuf>,

        /// Only use patterns from --patterns
        #[arg(long)]
        no_builtin: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Decode a partition table and extract every partition
    Partitions {
        /// Image holding the table and the partitions
        input: PathBuf,

        /// Table start offset (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_offset)]
        start: u64,

        /// Table end offset, exclusive (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_offset)]
        end: u64,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (JSON); flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run on a single thread
    #[arg(long)]
    sequential: bool,

    /// Write a JSON run summary here
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl CommonArgs {
    fn resolve(&self) -> Result<ExtractConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractConfig::load(path)?,
            None => ExtractConfig::default(),
        };
        if let Some(output) = &self.output {
            config.output_dir = Some(output.clone());
        }
        if self.sequential {
            config.parallel = false;
        }
        log::debug!("Settings: {:?}", config);
        Ok(config)
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal offset.
fn parse_offset(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{}': {}", s, e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(cli.command) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<RunOutcome> {
    match command {
        Commands::Scan { input, pattern_file, no_builtin, common } => {
            let mut config = common.resolve()?;
            if pattern_file.is_some() {
                config.pattern_file = pattern_file;
            }
            if no_builtin {
                config.builtin_patterns = false;
            }

            let summary = Extractor::new(config)
                .scan_file(&input)
                .with_context(|| format!("Scan of {} failed", input.display()))?;

            for artifact in &summary.artifacts {
                println!(
                    "Saved {} data at offset {} to {}",
                    artifact.label,
                    artifact.offset,
                    artifact.destination.display()
                );
            }
            if summary.outcome() == RunOutcome::NothingFound {
                println!("No patterns found.");
            }
            finish(&summary, common.summary.as_deref())
        }
        Commands::Partitions { input, start, end, common } => {
            let summary = Extractor::new(common.resolve()?)
                .extract_partition_table(&input, start, end)
                .with_context(|| format!("Partition extraction from {} failed", input.display()))?;

            for artifact in &summary.artifacts {
                println!("Extracted {} to {}", artifact.label, artifact.destination.display());
            }
            if summary.outcome() == RunOutcome::NothingFound {
                println!("No partition entries found.");
            }
            finish(&summary, common.summary.as_deref())
        }
    }
}

/// Report skipped items, save the summary if asked, and print the totals.
fn finish(summary: &RunSummary, summary_path: Option<&Path>) -> Result<RunOutcome> {
    for issue in &summary.issues {
        eprintln!("Skipped: {}", issue);
    }

    if let Some(path) = summary_path {
        summary
            .save(path)
            .with_context(|| format!("Failed to save run summary to {}", path.display()))?;
        log::info!("Run summary written to {}", path.display());
    }

    let outcome = summary.outcome();
    if let RunOutcome::Extracted(count) = outcome {
        if let Some(dir) = &summary.output_dir {
            println!("{} artifact(s) written to {}", count, dir.display());
        }
    }
    Ok(outcome)
}

//! Run sequencing: load input, scan or parse, extract, report.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};
use crate::extract::{ExtractionReport, ExtractionWriter};
use crate::input::InputImage;
use crate::partition;
use crate::scanner;
use crate::types::{ExtractedArtifact, FileRegion};

/// What a run looked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Scan,
    Partitions { start: u64, end: u64 },
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// At least one candidate was found; holds the number of files written.
    Extracted(usize),
    /// No match or partition entry was found. Nothing was written.
    NothingFound,
}

/// Record of one run, suitable for `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub mode: RunMode,
    /// None when nothing was found and no directory was created.
    pub output_dir: Option<PathBuf>,
    /// Matches or decoded entries, before extraction.
    pub candidates: usize,
    pub artifacts: Vec<ExtractedArtifact>,
    /// Per-item problems: rejected records, out-of-range entries, collisions, write failures.
    pub issues: Vec<String>,
}

impl RunSummary {
    fn empty(input: &Path, mode: RunMode) -> Self {
        Self {
            input: input.to_path_buf(),
            mode,
            output_dir: None,
            candidates: 0,
            artifacts: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.candidates == 0 {
            RunOutcome::NothingFound
        } else {
            RunOutcome::Extracted(self.artifacts.len())
        }
    }

    /// Write the summary as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ExtractError::Write {
            path: path.to_path_buf(),
            source: io::Error::from(e),
        })?;
        std::fs::write(path, content).map_err(|source| ExtractError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn absorb(&mut self, output_dir: &Path, report: ExtractionReport) {
        self.output_dir = Some(output_dir.to_path_buf());
        self.artifacts = report.artifacts;
        self.issues.extend(report.failures.iter().map(|e| e.to_string()));
    }
}

/// Runs extraction jobs with a fixed configuration.
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Scan `input` for every registered pattern and write each match.
    ///
    /// The pattern registry is built first, so bad definitions fail before the input is read.
    pub fn scan_file(&self, input: &Path) -> Result<RunSummary> {
        let registry = self.config.registry()?;
        log::debug!("Registry ready: {} pattern(s)", registry.len());

        let image = InputImage::open(input)?;
        log::info!("Scanning {} ({} bytes)", input.display(), image.len());

        let matches = if self.config.parallel {
            scanner::scan_parallel(image.bytes(), &registry)
        } else {
            scanner::scan(image.bytes(), &registry)
        };

        let mut summary = RunSummary::empty(input, RunMode::Scan);
        summary.candidates = matches.len();
        if matches.is_empty() {
            log::info!("No patterns found in {}", input.display());
            return Ok(summary);
        }

        let output_dir = self.config.scan_output_dir();
        let writer = ExtractionWriter::create(&output_dir)?.with_parallel(self.config.parallel);
        let report = writer.extract_matches(image.bytes(), &matches);
        summary.absorb(&output_dir, report);

        log::info!(
            "Extracted {} of {} match(es) to {}",
            summary.artifacts.len(),
            summary.candidates,
            output_dir.display()
        );
        Ok(summary)
    }

    /// Decode the partition table in `[start, end)` of `input` and write each partition.
    ///
    /// The range is clamped to the file. `start > end` is rejected before the file is opened.
    pub fn extract_partition_table(&self, input: &Path, start: u64, end: u64) -> Result<RunSummary> {
        if start > end {
            return Err(ExtractError::InvalidRange { start, end });
        }

        let image = InputImage::open(input)?;
        let table = image.slice(FileRegion::between(start, end));
        log::info!(
            "Reading partition table of {} at {:#x}..{:#x} ({} bytes available)",
            input.display(),
            start,
            end,
            table.len()
        );

        let parsed = if self.config.parallel {
            partition::parse_parallel(table)
        } else {
            partition::parse(table)
        };

        let mut summary = RunSummary::empty(input, RunMode::Partitions { start, end });
        summary.candidates = parsed.len();
        summary.issues.extend(parsed.rejected.iter().map(|e| e.to_string()));
        if parsed.is_empty() {
            log::info!("No partition entries found in {}", input.display());
            return Ok(summary);
        }

        let output_dir = self.config.partition_output_dir();
        let writer = ExtractionWriter::create(&output_dir)?.with_parallel(self.config.parallel);
        let report = writer.extract_partitions(image.bytes(), &parsed.entries);
        summary.absorb(&output_dir, report);

        log::info!(
            "Extracted {} of {} partition(s) to {}",
            summary.artifacts.len(),
            summary.candidates,
            output_dir.display()
        );
        Ok(summary)
    }
}

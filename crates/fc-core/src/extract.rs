//! Persisting matches and partitions as standalone files.
//!
//! Every artifact lands in `{label}_{index}_{offset}.bin` inside the output
//! directory. Names are reserved under a lock before any bytes are written,
//! and files are opened create-new, so nothing is ever overwritten.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{ExtractError, Result};
use crate::partition::PartitionEntry;
use crate::scanner::Match;
use crate::types::{ExtractedArtifact, FileRegion, SourceKind};

/// Label used for partitions whose name field is blank.
pub const UNNAMED_PARTITION: &str = "partition";

/// Artifacts written by one batch, plus the items that were skipped.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub artifacts: Vec<ExtractedArtifact>,
    pub failures: Vec<ExtractError>,
}

impl ExtractionReport {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.failures.is_empty()
    }
}

/// A slice waiting to be written.
struct Job<'a> {
    kind: SourceKind,
    label: String,
    index: usize,
    offset: u64,
    bytes: &'a [u8],
}

/// Sole writer to an output directory.
pub struct ExtractionWriter {
    output_dir: PathBuf,
    reserved: Mutex<HashSet<PathBuf>>,
    parallel: bool,
}

impl ExtractionWriter {
    /// Create `output_dir` (and parents) if needed. Nothing is written on failure.
    pub fn create(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir).map_err(|source| ExtractError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        log::debug!("Output directory ready: {}", output_dir.display());

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            reserved: Mutex::new(HashSet::new()),
            parallel: false,
        })
    }

    /// Write files on rayon workers once their names are reserved.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination path for an artifact.
    pub fn destination(&self, label: &str, index: usize, offset: u64) -> PathBuf {
        self.output_dir.join(format!("{}_{}_{}.bin", label, index, offset))
    }

    /// Write every match. Sequence numbers restart at 1 for each pattern.
    pub fn extract_matches(&self, buffer: &[u8], matches: &[Match<'_>]) -> ExtractionReport {
        let mut counters = HashMap::new();
        let jobs = matches
            .iter()
            .map(|m| match_job(buffer, m, &mut counters))
            .collect();
        self.run(jobs)
    }

    /// Write every partition that fits inside `buffer`; the rest fail with `OutOfRange`.
    pub fn extract_partitions(&self, buffer: &[u8], entries: &[PartitionEntry]) -> ExtractionReport {
        let mut counters = HashMap::new();
        let jobs = entries
            .iter()
            .map(|entry| partition_job(buffer, entry, &mut counters))
            .collect();
        self.run(jobs)
    }

    fn run(&self, jobs: Vec<Result<Job<'_>>>) -> ExtractionReport {
        let results: Vec<Result<ExtractedArtifact>> = if self.parallel {
            jobs.into_par_iter().map(|job| job.and_then(|j| self.write_job(j))).collect()
        } else {
            jobs.into_iter().map(|job| job.and_then(|j| self.write_job(j))).collect()
        };

        let mut report = ExtractionReport::default();
        for result in results {
            match result {
                Ok(artifact) => {
                    log::info!(
                        "Saved {} data at offset {} to {}",
                        artifact.label,
                        artifact.offset,
                        artifact.destination.display()
                    );
                    report.artifacts.push(artifact);
                }
                Err(err) => {
                    log::warn!("Skipped artifact: {}", err);
                    report.failures.push(err);
                }
            }
        }
        report
    }

    fn write_job(&self, job: Job<'_>) -> Result<ExtractedArtifact> {
        let path = self.destination(&job.label, job.index, job.offset);
        self.reserve(&path)?;
        write_with_retry(&path, job.bytes)?;

        Ok(ExtractedArtifact {
            source_kind: job.kind,
            label: job.label,
            index: job.index,
            offset: job.offset,
            length: job.bytes.len() as u64,
            destination: path,
        })
    }

    /// Claim `path` for this writer. Fails if it is already claimed or on disk.
    fn reserve(&self, path: &Path) -> Result<()> {
        let mut reserved = self.reserved.lock();
        if reserved.contains(path) || path.exists() {
            return Err(ExtractError::OutputCollision { path: path.to_path_buf() });
        }
        reserved.insert(path.to_path_buf());
        Ok(())
    }
}

fn match_job<'a>(buffer: &'a [u8], m: &Match<'_>, counters: &mut HashMap<String, usize>) -> Result<Job<'a>> {
    let bytes = buffer.get(m.start..m.end).ok_or_else(|| ExtractError::OutOfRange {
        label: m.pattern.to_string(),
        offset: m.start as u64,
        size: m.len() as u64,
        len: buffer.len() as u64,
    })?;
    let label = sanitize_label(m.pattern, m.pattern);
    Ok(Job {
        kind: SourceKind::Pattern,
        index: next_index(counters, &label),
        label,
        offset: m.start as u64,
        bytes,
    })
}

fn partition_job<'a>(
    buffer: &'a [u8],
    entry: &PartitionEntry,
    counters: &mut HashMap<String, usize>,
) -> Result<Job<'a>> {
    let region = entry.region();
    let bytes = slice_region(buffer, region).ok_or_else(|| ExtractError::OutOfRange {
        label: entry.name.clone(),
        offset: region.offset,
        size: region.length,
        len: buffer.len() as u64,
    })?;
    let label = sanitize_label(&entry.name, UNNAMED_PARTITION);
    Ok(Job {
        kind: SourceKind::Partition,
        index: next_index(counters, &label),
        label,
        offset: region.offset,
        bytes,
    })
}

fn next_index(counters: &mut HashMap<String, usize>, label: &str) -> usize {
    let counter = counters.entry(label.to_string()).or_insert(0);
    *counter += 1;
    *counter
}

fn slice_region(buffer: &[u8], region: FileRegion) -> Option<&[u8]> {
    if !region.fits_within(buffer.len() as u64) {
        return None;
    }
    buffer.get(region.offset as usize..region.end() as usize)
}

/// Make `label` safe to use as a file name prefix.
///
/// Keeps `[A-Za-z0-9._-]`; every other character, and every `..`, becomes `_`.
pub fn sanitize_label(label: &str, fallback: &str) -> String {
    let clean: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect::<String>()
        .replace("..", "_");
    if clean.is_empty() {
        fallback.to_string()
    } else {
        clean
    }
}

fn write_with_retry(path: &Path, bytes: &[u8]) -> Result<()> {
    match write_new(path, bytes) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(ExtractError::OutputCollision { path: path.to_path_buf() })
        }
        Err(first) => {
            log::warn!("Write to {} failed ({}), retrying once", path.display(), first);
            write_new(path, bytes).map_err(|source| ExtractError::Write {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Create `path` (must not exist) and write `bytes`. A partial file is removed on failure.
fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(bytes).and_then(|()| file.flush());
    if written.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Could not remove partial file {}: {}", path.display(), e);
        }
    }
    written
}

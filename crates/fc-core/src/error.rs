//! Error taxonomy for extraction runs.
//!
//! Pre-flight errors (bad input path, bad pattern definitions, unusable output
//! directory) abort a run. Everything else is per-item: the offending entry or
//! artifact is skipped and the error lands in the run summary.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while scanning, parsing or extracting.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The source file is missing or unreadable.
    #[error("cannot read input {}: {source}", path.display())]
    FatalInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The partition table range is inverted.
    #[error("invalid table range {start:#x}..{end:#x}")]
    InvalidRange { start: u64, end: u64 },

    /// A pattern definition violates the token grammar.
    #[error("invalid pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    /// A pattern definition file could not be read or parsed.
    #[error("pattern file {}: {message}", path.display())]
    PatternFile { path: PathBuf, message: String },

    /// A configuration file could not be read or parsed.
    #[error("config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// A partition record could not be decoded.
    #[error("partition entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },

    /// A partition (or match) points past the end of the source buffer.
    #[error("'{label}' at {offset:#x} (+{size:#x}) exceeds input length {len:#x}")]
    OutOfRange {
        label: String,
        offset: u64,
        size: u64,
        len: u64,
    },

    /// The destination file name is already taken.
    #[error("refusing to overwrite {}", path.display())]
    OutputCollision { path: PathBuf },

    /// The output directory could not be created.
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an artifact failed, even after a retry.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn invalid_pattern(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ExtractError::InvalidPattern {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_entry(index: usize, reason: impl Into<String>) -> Self {
        ExtractError::InvalidEntry {
            index,
            reason: reason.into(),
        }
    }

    /// True for errors that abort the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractError::FatalInput { .. }
                | ExtractError::InvalidRange { .. }
                | ExtractError::InvalidPattern { .. }
                | ExtractError::PatternFile { .. }
                | ExtractError::Config { .. }
                | ExtractError::OutputDir { .. }
        )
    }
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_has_hex_offsets() {
        let err = ExtractError::OutOfRange {
            label: "rootfs".to_string(),
            offset: 0x1000,
            size: 0x200,
            len: 0x800,
        };
        let msg = err.to_string();
        assert!(msg.contains("rootfs"));
        assert!(msg.contains("0x1000"));
        assert!(msg.contains("0x800"));
    }

    #[test]
    fn fatal_classification() {
        assert!(ExtractError::invalid_pattern("X", "empty").is_fatal());
        assert!(ExtractError::InvalidRange { start: 8, end: 4 }.is_fatal());
        assert!(!ExtractError::invalid_entry(3, "bad utf-8").is_fatal());
        assert!(!ExtractError::OutputCollision { path: PathBuf::from("a.bin") }.is_fatal());
    }
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A byte range within a file, defined by offset and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRegion {
    pub offset: u64,
    pub length: u64,
}

impl FileRegion {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Region covering `[start, end)`. An inverted range yields an empty region at `start`.
    pub fn between(start: u64, end: u64) -> Self {
        Self::new(start, end.saturating_sub(start))
    }

    /// Returns the exclusive end offset of this region.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Returns true if this region overlaps with `other`.
    pub fn overlaps(&self, other: &FileRegion) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// Returns true if the whole region lies inside a buffer of `len` bytes.
    pub fn fits_within(&self, len: u64) -> bool {
        self.offset
            .checked_add(self.length)
            .is_some_and(|end| end <= len)
    }
}

/// Which producer an artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Content-addressed signature match.
    Pattern,
    /// Offset-addressed partition table entry.
    Partition,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Pattern => "pattern",
            SourceKind::Partition => "partition",
        }
    }
}

/// A slice of the input that has been persisted to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedArtifact {
    pub source_kind: SourceKind,
    /// Pattern name or partition name.
    pub label: String,
    /// 1-based sequence number among artifacts sharing `label`.
    pub index: usize,
    pub offset: u64,
    pub length: u64,
    pub destination: PathBuf,
}

impl ExtractedArtifact {
    pub fn region(&self) -> FileRegion {
        FileRegion::new(self.offset, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_span_end() {
        let kernel = FileRegion::new(0x4000, 0x20000);
        assert_eq!(kernel.end(), 0x24000);
        assert_eq!(FileRegion::new(u32::MAX as u64, u32::MAX as u64).end(), 0x1_FFFF_FFFE);
    }

    #[test]
    fn huge_span_end_saturates() {
        assert_eq!(FileRegion::new(u64::MAX - 1, 8).end(), u64::MAX);
    }

    #[test]
    fn file_region_between_inverted_is_empty() {
        let r = FileRegion::between(0x40, 0x10);
        assert_eq!(r.offset, 0x40);
        assert_eq!(r.length, 0);
    }

    #[test]
    fn file_region_overlaps_nested() {
        // a DER body nested inside a PEM block
        let pem = FileRegion::new(0, 100);
        let der = FileRegion::new(30, 20);
        assert!(pem.overlaps(&der));
        assert!(der.overlaps(&pem));
    }

    #[test]
    fn back_to_back_partitions_do_not_overlap() {
        let boot = FileRegion::between(0, 0x4000);
        let kernel = FileRegion::between(0x4000, 0x24000);
        assert!(!boot.overlaps(&kernel));
        assert!(!kernel.overlaps(&boot));
    }

    #[test]
    fn fits_within_exact_end() {
        assert!(FileRegion::new(0x100, 0x40).fits_within(0x140));
        assert!(!FileRegion::new(0x100, 0x41).fits_within(0x140));
    }

    #[test]
    fn fits_within_rejects_overflow() {
        assert!(!FileRegion::new(u64::MAX, 2).fits_within(u64::MAX));
    }

    #[test]
    fn source_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SourceKind::Partition).unwrap();
        assert_eq!(json, "\"partition\"");
    }
}

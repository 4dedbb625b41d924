use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{ExtractError, Result};
use crate::types::FileRegion;

/// Read-only view of the blob being carved.
///
/// Backed by a memory map so multi-hundred-megabyte images are shared with
/// scanner workers without copying. The map is never written to.
pub struct InputImage {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl InputImage {
    /// Open and memory-map a file.
    pub fn open(path: &Path) -> Result<Self> {
        let fatal = |source| ExtractError::FatalInput {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(fatal)?;
        let len = file.metadata().map_err(fatal)?.len();

        if len == 0 {
            return Ok(Self { path: path.to_path_buf(), mmap: None });
        }

        // SAFETY: the file must not be modified externally while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(fatal)?;

        Ok(Self { path: path.to_path_buf(), mmap: Some(mmap) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole file contents.
    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Total file size in bytes.
    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// Byte slice for `region`, truncated at end of file.
    /// Returns an empty slice if the region starts past the end.
    pub fn slice(&self, region: FileRegion) -> &[u8] {
        let data = self.bytes();
        let start = region.offset.min(data.len() as u64) as usize;
        let end = region.end().min(data.len() as u64) as usize;

        if start >= end {
            return &[];
        }

        &data[start..end]
    }
}

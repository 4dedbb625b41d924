//! Fixed-layout partition table decoding.
//!
//! Each record is 32 bytes:
//!
//! | bytes    | field                                   |
//! |----------|-----------------------------------------|
//! | `0..4`   | reserved                                |
//! | `4..8`   | offset, u32 little-endian               |
//! | `8..12`  | size, u32 little-endian                 |
//! | `12..28` | name, UTF-8, NUL padded                 |
//! | `28..32` | reserved                                |
//!
//! A trailing fragment shorter than a record marks the end of the table.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::types::FileRegion;

/// Size of one partition record.
pub const ENTRY_SIZE: usize = 32;

const OFFSET_FIELD: std::ops::Range<usize> = 4..8;
const SIZE_FIELD: std::ops::Range<usize> = 8..12;
const NAME_FIELD: std::ops::Range<usize> = 12..28;

/// One named region of the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// Slot in the table, counting rejected records.
    pub index: usize,
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

impl PartitionEntry {
    /// Decode one 32-byte record.
    pub fn decode(index: usize, record: &[u8]) -> Result<Self> {
        if record.len() < ENTRY_SIZE {
            return Err(ExtractError::invalid_entry(
                index,
                format!("record is {} bytes, expected {}", record.len(), ENTRY_SIZE),
            ));
        }

        let offset = read_u32_le(&record[OFFSET_FIELD]);
        let size = read_u32_le(&record[SIZE_FIELD]);
        let name = std::str::from_utf8(&record[NAME_FIELD])
            .map_err(|e| ExtractError::invalid_entry(index, format!("name is not valid UTF-8: {}", e)))?
            .trim_matches('\0')
            .to_string();

        Ok(Self { index, name, offset, size })
    }

    /// Byte span this partition claims in the source image.
    pub fn region(&self) -> FileRegion {
        FileRegion::new(self.offset as u64, self.size as u64)
    }
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decoded table: entries in table order plus the records that were skipped.
#[derive(Debug, Default)]
pub struct PartitionTable {
    pub entries: Vec<PartitionEntry>,
    pub rejected: Vec<ExtractError>,
}

impl PartitionTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn collect(decoded: impl IntoIterator<Item = Result<PartitionEntry>>) -> Self {
        let mut table = PartitionTable::default();
        for result in decoded {
            match result {
                Ok(entry) => table.entries.push(entry),
                Err(err) => {
                    log::warn!("Skipping partition record: {}", err);
                    table.rejected.push(err);
                }
            }
        }
        table
    }
}

/// Parse a partition table, record by record.
pub fn parse(table: &[u8]) -> PartitionTable {
    PartitionTable::collect(
        table
            .chunks_exact(ENTRY_SIZE)
            .enumerate()
            .map(|(i, record)| PartitionEntry::decode(i, record)),
    )
}

/// Same as [`parse`], decoding records on rayon workers. Table order is kept.
pub fn parse_parallel(table: &[u8]) -> PartitionTable {
    let decoded: Vec<Result<PartitionEntry>> = table
        .par_chunks_exact(ENTRY_SIZE)
        .enumerate()
        .map(|(i, record)| PartitionEntry::decode(i, record))
        .collect();
    PartitionTable::collect(decoded)
}

/// Encode an entry as a 32-byte record. Names longer than 16 bytes are truncated.
pub fn encode_entry(name: &str, offset: u32, size: u32) -> [u8; ENTRY_SIZE] {
    let mut record = [0u8; ENTRY_SIZE];
    record[OFFSET_FIELD].copy_from_slice(&offset.to_le_bytes());
    record[SIZE_FIELD].copy_from_slice(&size.to_le_bytes());
    let name = name.as_bytes();
    let n = name.len().min(NAME_FIELD.len());
    record[NAME_FIELD.start..NAME_FIELD.start + n].copy_from_slice(&name[..n]);
    record
}

pub mod types;
pub mod error;
pub mod input;
pub mod registry;
pub mod builtin_patterns;
pub mod definitions;
pub mod scanner;
pub mod partition;
pub mod extract;
pub mod pairing;
pub mod config;
pub mod orchestrator;

pub use types::*;
pub use error::{ExtractError, Result};
pub use input::InputImage;
pub use registry::{
    ByteClass, ByteMatcher, Pattern, PatternKind, PatternSpec, RegistryBuilder, SignatureRegistry,
};
pub use builtin_patterns::{builtin_patterns, CERTIFICATE_PATTERNS};
pub use definitions::{load_patterns_from_file, load_patterns_from_json, PatternDef, TokenDef};
pub use scanner::{scan, scan_parallel, scan_pattern, Match};
pub use partition::{encode_entry, parse, parse_parallel, PartitionEntry, PartitionTable, ENTRY_SIZE};
pub use extract::{sanitize_label, ExtractionReport, ExtractionWriter};
pub use pairing::{pair_certificates, KeyLookup, KeyPairing};
pub use config::ExtractConfig;
pub use orchestrator::{Extractor, RunMode, RunOutcome, RunSummary};

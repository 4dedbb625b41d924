//! Cross-referencing extracted certificates against candidate private keys.
//!
//! Parsing certificates and computing public-key fingerprints belongs to a
//! crypto library, and locating key files belongs to the caller. Both are
//! injected: a fingerprint function over raw artifact bytes, and a
//! [`KeyLookup`] mapping a fingerprint to a key source.
//!
//! ```
//! use std::path::{Path, PathBuf};
//! use fc_core::{pair_certificates, ExtractedArtifact, SourceKind};
//!
//! let image = b"....[ab12]....";
//! let artifacts = vec![ExtractedArtifact {
//!     source_kind: SourceKind::Pattern,
//!     label: "CERTIFICATE_DER".to_string(),
//!     index: 1,
//!     offset: 4,
//!     length: 6,
//!     destination: PathBuf::from("secrets/CERTIFICATE_DER_1_4.bin"),
//! }];
//!
//! // Stands in for hashing the certificate's public key.
//! let fingerprint = |der: &[u8]| Some(String::from_utf8_lossy(der).into_owned());
//! let lookup = |fp: &str| (fp == "[ab12]").then(|| PathBuf::from("pemkeys/device.pem"));
//!
//! let pairings = pair_certificates(&artifacts, image, fingerprint, &lookup);
//! assert_eq!(pairings[0].key_path(), Some(Path::new("pemkeys/device.pem")));
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builtin_patterns::CERTIFICATE_PATTERNS;
use crate::types::{ExtractedArtifact, SourceKind};

/// Finds the key whose public half has a given fingerprint.
pub trait KeyLookup {
    fn find_key(&self, fingerprint: &str) -> Option<PathBuf>;
}

impl<F> KeyLookup for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn find_key(&self, fingerprint: &str) -> Option<PathBuf> {
        self(fingerprint)
    }
}

/// Result of looking up one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPairing {
    pub certificate: PathBuf,
    pub offset: u64,
    /// None when the certificate bytes could not be fingerprinted.
    pub fingerprint: Option<String>,
    pub key: Option<PathBuf>,
}

impl KeyPairing {
    pub fn is_paired(&self) -> bool {
        self.key.is_some()
    }

    pub fn key_path(&self) -> Option<&Path> {
        self.key.as_deref()
    }
}

/// Look up a key for every certificate artifact, in artifact order.
///
/// `buffer` is the source image the artifacts were cut from.
pub fn pair_certificates<F, L>(
    artifacts: &[ExtractedArtifact],
    buffer: &[u8],
    fingerprint: F,
    lookup: &L,
) -> Vec<KeyPairing>
where
    F: Fn(&[u8]) -> Option<String>,
    L: KeyLookup + ?Sized,
{
    artifacts
        .iter()
        .filter(|a| a.source_kind == SourceKind::Pattern && CERTIFICATE_PATTERNS.contains(&a.label.as_str()))
        .map(|artifact| {
            let region = artifact.region();
            let fp = buffer
                .get(region.offset as usize..region.end() as usize)
                .and_then(&fingerprint);
            let key = fp.as_deref().and_then(|f| lookup.find_key(f));
            if key.is_none() {
                log::debug!("No key found for certificate at offset {}", artifact.offset);
            }
            KeyPairing {
                certificate: artifact.destination.clone(),
                offset: artifact.offset,
                fingerprint: fp,
                key,
            }
        })
        .collect()
}

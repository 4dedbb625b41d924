use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::definitions::load_patterns_from_file;
use crate::error::{ExtractError, Result};
use crate::registry::{RegistryBuilder, SignatureRegistry};

/// Default output directory for signature scans.
pub const DEFAULT_SCAN_DIR: &str = "secrets";
/// Default output directory for partition extraction.
pub const DEFAULT_PARTITION_DIR: &str = "partitions";

/// Settings for an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Where artifacts are written. Falls back to a per-mode default.
    pub output_dir: Option<PathBuf>,
    /// Scan patterns, decode records and write files on rayon workers.
    pub parallel: bool,
    /// Include the built-in key/certificate/credential patterns.
    pub builtin_patterns: bool,
    /// Extra pattern definitions (JSON), appended after the built-ins.
    pub pattern_file: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            parallel: true,
            builtin_patterns: true,
            pattern_file: None,
        }
    }
}

impl ExtractConfig {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Config {
            path: path.to_path_buf(),
            message: format!("failed to read file: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| ExtractError::Config {
            path: path.to_path_buf(),
            message: format!("failed to parse JSON: {}", e),
        })
    }

    pub fn scan_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_SCAN_DIR))
    }

    pub fn partition_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_PARTITION_DIR))
    }

    /// Build the pattern registry these settings describe.
    pub fn registry(&self) -> Result<SignatureRegistry> {
        let mut builder = if self.builtin_patterns {
            RegistryBuilder::from_builtins()
        } else {
            RegistryBuilder::new()
        };

        if let Some(path) = &self.pattern_file {
            let defs = load_patterns_from_file(path)?;
            log::debug!("Loaded {} pattern definition(s) from {}", defs.len(), path.display());
            builder.register_defs(&defs)?;
        }

        if builder.is_empty() {
            return Err(ExtractError::invalid_pattern("<registry>", "no patterns to scan for"));
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ExtractConfig::default();
        assert!(config.parallel);
        assert!(config.builtin_patterns);
        assert_eq!(config.scan_output_dir(), PathBuf::from("secrets"));
        assert_eq!(config.partition_output_dir(), PathBuf::from("partitions"));
        assert_eq!(config.registry().unwrap().len(), 10);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ExtractConfig = serde_json::from_str(r#"{"output_dir": "/tmp/out"}"#).unwrap();
        assert!(config.parallel);
        assert_eq!(config.scan_output_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn load_reports_bad_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"[1, 2").unwrap();
        let err = ExtractConfig::load(f.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Config { .. }));
    }

    #[test]
    fn custom_patterns_without_builtins() {
        let mut patterns = tempfile::NamedTempFile::new().unwrap();
        patterns
            .write_all(br#"[{"name": "SSID", "tokens": [{"literal": "ssid="}, {"run": {"ranges": [[0, 32]], "negate": true}}]}]"#)
            .unwrap();
        let config = ExtractConfig {
            builtin_patterns: false,
            pattern_file: Some(patterns.path().to_path_buf()),
            ..ExtractConfig::default()
        };
        let registry = config.registry().unwrap();
        assert_eq!(registry.names(), vec!["SSID"]);
    }

    #[test]
    fn empty_registry_is_rejected() {
        let config = ExtractConfig { builtin_patterns: false, ..ExtractConfig::default() };
        let err = config.registry().unwrap_err();
        assert!(err.is_fatal());
    }
}

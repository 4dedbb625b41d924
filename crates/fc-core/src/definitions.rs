//! User-supplied pattern definitions in JSON.
//!
//! ```json
//! [
//!   { "name": "API_TOKEN", "tokens": [ {"literal": "token="}, {"run": {"ranges": [[0, 32]], "negate": true}} ] },
//!   { "name": "UBOOT_ENV", "tokens": [ {"hex": "626f6f74636d64"}, "lazy", {"hex": "0000"} ] }
//! ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};
use crate::registry::{ByteClass, ByteMatcher, PatternSpec, RegistryBuilder};

/// A named pattern as written in a definitions file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDef {
    pub name: String,
    pub tokens: Vec<TokenDef>,
}

/// One token of a pattern definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenDef {
    /// Any bytes up to the following literal.
    Lazy,
    /// Text, matched byte for byte.
    Literal(String),
    /// Hex digits, matched byte for byte.
    Hex(String),
    /// This many wildcard bytes.
    Any(usize),
    /// A single byte from a class.
    Class(ClassDef),
    /// One or more bytes from a class.
    Run(RunDef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Inclusive `[lo, hi]` pairs.
    pub ranges: Vec<[u8; 2]>,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDef {
    pub ranges: Vec<[u8; 2]>,
    #[serde(default)]
    pub negate: bool,
    #[serde(default = "default_run_min")]
    pub min: usize,
}

fn default_run_min() -> usize {
    1
}

impl PatternDef {
    /// Lower the definition into a token sequence.
    pub fn to_spec(&self) -> Result<PatternSpec> {
        let mut spec = PatternSpec::new();
        for token in &self.tokens {
            spec = match token {
                TokenDef::Lazy => spec.lazy(),
                TokenDef::Literal(text) => spec.literal(text.as_bytes()),
                TokenDef::Hex(digits) => spec.literal(&decode_hex(&self.name, digits)?),
                TokenDef::Any(count) => spec.any(*count),
                TokenDef::Class(def) => {
                    spec.push(ByteMatcher::Class(build_class(&self.name, &def.ranges, def.negate)?))
                }
                TokenDef::Run(def) => spec.run(build_class(&self.name, &def.ranges, def.negate)?, def.min),
            };
        }
        Ok(spec)
    }
}

fn build_class(name: &str, ranges: &[[u8; 2]], negate: bool) -> Result<ByteClass> {
    let mut class = ByteClass::empty();
    for &[lo, hi] in ranges {
        if lo > hi {
            return Err(ExtractError::invalid_pattern(
                name,
                format!("byte range [{:#04x}, {:#04x}] is inverted", lo, hi),
            ));
        }
        class = class.with_range(lo, hi);
    }
    Ok(if negate { class.negated() } else { class })
}

fn decode_hex(name: &str, digits: &str) -> Result<Vec<u8>> {
    let clean: Vec<u8> = digits.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if clean.len() % 2 != 0 {
        return Err(ExtractError::invalid_pattern(name, format!("odd-length hex literal '{}'", digits)));
    }
    clean
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16);
            let lo = (pair[1] as char).to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                _ => Err(ExtractError::invalid_pattern(
                    name,
                    format!("invalid hex digits in '{}'", digits),
                )),
            }
        })
        .collect()
}

/// Parse pattern definitions from a JSON string.
pub fn load_patterns_from_json(json: &str) -> serde_json::Result<Vec<PatternDef>> {
    serde_json::from_str(json)
}

/// Parse pattern definitions from a JSON file.
pub fn load_patterns_from_file(path: &Path) -> Result<Vec<PatternDef>> {
    let content = std::fs::read_to_string(path).map_err(|e| ExtractError::PatternFile {
        path: path.to_path_buf(),
        message: format!("failed to read file: {}", e),
    })?;
    load_patterns_from_json(&content).map_err(|e| ExtractError::PatternFile {
        path: path.to_path_buf(),
        message: format!("failed to parse JSON: {}", e),
    })
}

impl RegistryBuilder {
    /// Register every definition, stopping at the first invalid one.
    pub fn register_defs(&mut self, defs: &[PatternDef]) -> Result<()> {
        for def in defs {
            let spec = def.to_spec()?;
            self.register(&def.name, spec)?;
        }
        Ok(())
    }
}

//! Named byte-pattern definitions.
//!
//! Patterns are an explicit token grammar rather than regular expressions:
//! exact bytes, single-byte classes, greedy class runs, and a lazy
//! "any bytes until the next literal" span that crosses line boundaries.

use crate::builtin_patterns::builtin_patterns;
use crate::error::{ExtractError, Result};

/// A set of acceptable byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteClass {
    bits: [u64; 4],
}

impl ByteClass {
    /// Class matching no byte. Add ranges with [`ByteClass::with_range`].
    pub const fn empty() -> Self {
        Self { bits: [0; 4] }
    }

    /// Class matching every byte (`[\x00-\xff]`).
    pub const fn any() -> Self {
        Self { bits: [u64::MAX; 4] }
    }

    /// Class matching `lo..=hi`.
    pub fn range(lo: u8, hi: u8) -> Self {
        Self::empty().with_range(lo, hi)
    }

    pub fn with_range(mut self, lo: u8, hi: u8) -> Self {
        for b in lo..=hi {
            self.bits[(b >> 6) as usize] |= 1u64 << (b & 63);
        }
        self
    }

    /// Complement of this class (`[^...]`).
    pub fn negated(self) -> Self {
        Self { bits: self.bits.map(|w| !w) }
    }

    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.bits[(byte >> 6) as usize] & (1u64 << (byte & 63)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }
}

/// One element of a pattern's token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteMatcher {
    /// Exactly this byte.
    Exact(u8),
    /// Any single byte from the class.
    Class(ByteClass),
    /// `min` or more bytes from the class, longest first.
    Run { class: ByteClass, min: usize },
    /// Any bytes, shortest extension, up to the literal that follows.
    LazyUntil,
}

impl ByteMatcher {
    /// Smallest number of bytes this token can consume.
    pub fn min_width(&self) -> usize {
        match self {
            ByteMatcher::Exact(_) | ByteMatcher::Class(_) => 1,
            ByteMatcher::Run { min, .. } => *min,
            ByteMatcher::LazyUntil => 0,
        }
    }
}

/// Shape of a pattern, derived from its tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Exact bytes only.
    Literal,
    /// Contains byte classes or class runs.
    Bracketed,
    /// Contains a lazy span.
    Greedy,
}

impl PatternKind {
    fn of(tokens: &[ByteMatcher]) -> Self {
        if tokens.iter().any(|t| matches!(t, ByteMatcher::LazyUntil)) {
            PatternKind::Greedy
        } else if tokens.iter().any(|t| matches!(t, ByteMatcher::Class(_) | ByteMatcher::Run { .. })) {
            PatternKind::Bracketed
        } else {
            PatternKind::Literal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::Literal => "literal",
            PatternKind::Bracketed => "bracketed",
            PatternKind::Greedy => "greedy",
        }
    }
}

/// Chained builder for a token sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSpec {
    tokens: Vec<ByteMatcher>,
}

impl PatternSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append exact bytes.
    pub fn literal(mut self, bytes: &[u8]) -> Self {
        self.tokens.extend(bytes.iter().map(|&b| ByteMatcher::Exact(b)));
        self
    }

    /// Append `count` wildcard bytes.
    pub fn any(self, count: usize) -> Self {
        self.class(ByteClass::any(), count)
    }

    /// Append `count` single-byte class tokens.
    pub fn class(mut self, class: ByteClass, count: usize) -> Self {
        self.tokens.extend(std::iter::repeat(ByteMatcher::Class(class)).take(count));
        self
    }

    pub fn run(mut self, class: ByteClass, min: usize) -> Self {
        self.tokens.push(ByteMatcher::Run { class, min });
        self
    }

    pub fn lazy(mut self) -> Self {
        self.tokens.push(ByteMatcher::LazyUntil);
        self
    }

    pub fn push(mut self, token: ByteMatcher) -> Self {
        self.tokens.push(token);
        self
    }

    pub fn tokens(&self) -> &[ByteMatcher] {
        &self.tokens
    }
}

impl From<Vec<ByteMatcher>> for PatternSpec {
    fn from(tokens: Vec<ByteMatcher>) -> Self {
        Self { tokens }
    }
}

/// A validated, named pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    name: String,
    kind: PatternKind,
    tokens: Vec<ByteMatcher>,
}

impl Pattern {
    /// Validate `spec` and build a pattern from it.
    pub fn new(name: &str, spec: PatternSpec) -> Result<Self> {
        validate(name, spec.tokens())?;
        Ok(Self::assemble(name, spec))
    }

    /// Build without validation. Only for definitions known to be well formed.
    pub(crate) fn assemble(name: &str, spec: PatternSpec) -> Self {
        Self {
            name: name.to_string(),
            kind: PatternKind::of(&spec.tokens),
            tokens: spec.tokens,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn tokens(&self) -> &[ByteMatcher] {
        &self.tokens
    }

    /// Leading run of exact bytes, used to skip between candidate starts.
    pub fn literal_prefix(&self) -> Vec<u8> {
        self.tokens
            .iter()
            .map_while(|t| match t {
                ByteMatcher::Exact(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// Fewest bytes any match of this pattern can span.
    pub fn min_len(&self) -> usize {
        self.tokens.iter().map(ByteMatcher::min_width).sum()
    }
}

fn validate(name: &str, tokens: &[ByteMatcher]) -> Result<()> {
    if name.is_empty() {
        return Err(ExtractError::invalid_pattern(name, "pattern name is empty"));
    }
    if tokens.is_empty() {
        return Err(ExtractError::invalid_pattern(name, "token sequence is empty"));
    }

    for (i, token) in tokens.iter().enumerate() {
        match token {
            ByteMatcher::LazyUntil => match tokens.get(i + 1) {
                Some(ByteMatcher::Exact(_)) => {}
                Some(_) => {
                    return Err(ExtractError::invalid_pattern(
                        name,
                        format!("lazy span at token {} must be followed by a literal byte", i),
                    ))
                }
                None => {
                    return Err(ExtractError::invalid_pattern(
                        name,
                        "lazy span has no terminating literal",
                    ))
                }
            },
            ByteMatcher::Run { class, min } => {
                if *min == 0 {
                    return Err(ExtractError::invalid_pattern(
                        name,
                        format!("run at token {} must match at least one byte", i),
                    ));
                }
                if class.is_empty() {
                    return Err(ExtractError::invalid_pattern(
                        name,
                        format!("run at token {} has an empty byte class", i),
                    ));
                }
            }
            ByteMatcher::Class(class) if class.is_empty() => {
                return Err(ExtractError::invalid_pattern(
                    name,
                    format!("class at token {} has an empty byte class", i),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Collects patterns before freezing them into a [`SignatureRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    patterns: Vec<Pattern>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the built-in key, certificate and credential patterns.
    pub fn from_builtins() -> Self {
        Self { patterns: builtin_patterns() }
    }

    /// Validate and append a pattern. Names must be unique.
    pub fn register(&mut self, name: &str, spec: PatternSpec) -> Result<&Pattern> {
        if self.patterns.iter().any(|p| p.name == name) {
            return Err(ExtractError::invalid_pattern(name, "name already registered"));
        }
        let pattern = Pattern::new(name, spec)?;
        self.patterns.push(pattern);
        Ok(&self.patterns[self.patterns.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn build(self) -> SignatureRegistry {
        SignatureRegistry { patterns: self.patterns }
    }
}

/// Immutable, ordered set of patterns to scan for.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    patterns: Vec<Pattern>,
}

impl SignatureRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry holding only the built-in patterns.
    pub fn builtin() -> Self {
        RegistryBuilder::from_builtins().build()
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    /// Patterns in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn names(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl<'a> IntoIterator for &'a SignatureRegistry {
    type Item = &'a Pattern;
    type IntoIter = std::slice::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_class_ranges_and_negation() {
        let control = ByteClass::range(0x00, 0x20);
        assert!(control.contains(0x00));
        assert!(control.contains(b' '));
        assert!(!control.contains(b'!'));

        let printable = control.negated();
        assert!(printable.contains(b's'));
        assert!(printable.contains(0xFF));
        assert!(!printable.contains(b'\n'));
    }

    #[test]
    fn byte_class_any_covers_all_bytes() {
        let any = ByteClass::any();
        assert!((0..=255u8).all(|b| any.contains(b)));
        assert!(ByteClass::empty().is_empty());
    }

    #[test]
    fn kind_is_derived_from_tokens() {
        let lit = Pattern::new("LIT", PatternSpec::new().literal(b"pwd=")).unwrap();
        assert_eq!(lit.kind(), PatternKind::Literal);

        let der = Pattern::new("DER", PatternSpec::new().literal(&[0x30, 0x82]).any(2)).unwrap();
        assert_eq!(der.kind(), PatternKind::Bracketed);

        let pem = Pattern::new("PEM", PatternSpec::new().literal(b"<").lazy().literal(b">")).unwrap();
        assert_eq!(pem.kind(), PatternKind::Greedy);
    }

    #[test]
    fn register_rejects_empty_tokens() {
        let mut builder = SignatureRegistry::builder();
        let err = builder.register("EMPTY", PatternSpec::new()).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPattern { .. }));
    }

    #[test]
    fn register_rejects_trailing_lazy() {
        let mut builder = SignatureRegistry::builder();
        let err = builder
            .register("OPEN", PatternSpec::new().literal(b"BEGIN").lazy())
            .unwrap_err();
        assert!(err.to_string().contains("no terminating literal"));
    }

    #[test]
    fn register_rejects_lazy_followed_by_class() {
        let mut builder = SignatureRegistry::builder();
        let spec = PatternSpec::new().literal(b"a").lazy().any(1);
        assert!(builder.register("BAD", spec).is_err());
    }

    #[test]
    fn register_rejects_zero_min_run() {
        let mut builder = SignatureRegistry::builder();
        let spec = PatternSpec::new().literal(b"k=").run(ByteClass::any(), 0);
        assert!(builder.register("ZERO", spec).is_err());
    }

    #[test]
    fn register_rejects_duplicate_name() {
        let mut builder = SignatureRegistry::builder();
        builder.register("A", PatternSpec::new().literal(b"a")).unwrap();
        let err = builder.register("A", PatternSpec::new().literal(b"b")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn registry_keeps_registration_order() {
        let mut builder = SignatureRegistry::builder();
        builder.register("Z", PatternSpec::new().literal(b"z")).unwrap();
        builder.register("A", PatternSpec::new().literal(b"a")).unwrap();
        let registry = builder.build();
        assert_eq!(registry.names(), vec!["Z", "A"]);
        assert!(registry.get("A").is_some());
        assert!(registry.get("B").is_none());
    }

    #[test]
    fn literal_prefix_stops_at_first_non_exact() {
        let p = Pattern::new("DER", PatternSpec::new().literal(&[0x30, 0x82]).any(2).literal(&[0x02])).unwrap();
        assert_eq!(p.literal_prefix(), vec![0x30, 0x82]);
        assert_eq!(p.min_len(), 5);
    }
}

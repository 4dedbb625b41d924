//! Built-in key, certificate and credential patterns.

use crate::registry::{ByteClass, Pattern, PatternSpec};

/// Names of the patterns that carry X.509 certificates.
pub const CERTIFICATE_PATTERNS: &[&str] = &["CERTIFICATE_PEM", "CERTIFICATE_DER"];

/// All built-in patterns, in scan order.
pub fn builtin_patterns() -> Vec<Pattern> {
    vec![
        pem_block("RSA_PRIVATE_KEY_PEM", "RSA PRIVATE KEY"),
        pem_block("RSA_PUBLIC_KEY_PEM", "RSA PUBLIC KEY"),
        pem_block("EC_PRIVATE_KEY_PEM", "EC PRIVATE KEY"),
        pem_block("CERTIFICATE_PEM", "CERTIFICATE"),
        private_key_der(),
        public_key_der(),
        certificate_der(),
        credential("PASSWORD", b"password="),
        credential("PASSWD", b"passwd="),
        credential("PWD", b"pwd="),
    ]
}

/// `-----BEGIN <label>-----` through the nearest `-----END <label>-----`.
fn pem_block(name: &str, label: &str) -> Pattern {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);
    Pattern::assemble(
        name,
        PatternSpec::new().literal(begin.as_bytes()).lazy().literal(end.as_bytes()),
    )
}

/// SEQUENCE with a two-byte length, then INTEGER 0 (version) and the next INTEGER.
fn private_key_der() -> Pattern {
    Pattern::assemble(
        "PRIVATE_KEY_DER",
        sequence_header().literal(&[0x02, 0x01, 0x00, 0x02]),
    )
}

/// SubjectPublicKeyInfo with the rsaEncryption OID and NULL parameters.
fn public_key_der() -> Pattern {
    Pattern::assemble(
        "PUBLIC_KEY_DER",
        sequence_header().literal(&[
            0x30, 0x0D, 0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01, 0x05,
            0x00, 0x03,
        ]),
    )
}

/// Certificate SEQUENCE, TBSCertificate SEQUENCE, explicit v3 version tag, serial INTEGER.
fn certificate_der() -> Pattern {
    Pattern::assemble(
        "CERTIFICATE_DER",
        sequence_header()
            .literal(&[0x30, 0x82])
            .any(2)
            .literal(&[0xA0, 0x03, 0x02, 0x01, 0x02, 0x02]),
    )
}

/// `30 82 ?? ??`. The length bytes are not checked against the structure.
fn sequence_header() -> PatternSpec {
    PatternSpec::new().literal(&[0x30, 0x82]).any(2)
}

/// `<key>=` followed by one or more bytes above 0x20.
fn credential(name: &str, key: &[u8]) -> Pattern {
    Pattern::assemble(
        name,
        PatternSpec::new()
            .literal(key)
            .run(ByteClass::range(0x00, 0x20).negated(), 1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ByteMatcher, PatternKind};

    #[test]
    fn builtins_pass_validation() {
        for pattern in builtin_patterns() {
            let rebuilt = Pattern::new(pattern.name(), pattern.tokens().to_vec().into());
            assert!(rebuilt.is_ok(), "{} failed validation", pattern.name());
        }
    }

    #[test]
    fn builtin_order_and_names() {
        let names: Vec<String> = builtin_patterns().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "RSA_PRIVATE_KEY_PEM",
                "RSA_PUBLIC_KEY_PEM",
                "EC_PRIVATE_KEY_PEM",
                "CERTIFICATE_PEM",
                "PRIVATE_KEY_DER",
                "PUBLIC_KEY_DER",
                "CERTIFICATE_DER",
                "PASSWORD",
                "PASSWD",
                "PWD",
            ]
        );
    }

    #[test]
    fn pem_patterns_are_greedy() {
        let patterns = builtin_patterns();
        for p in &patterns[..4] {
            assert_eq!(p.kind(), PatternKind::Greedy);
            assert!(p.literal_prefix().starts_with(b"-----BEGIN "));
        }
    }

    #[test]
    fn certificate_der_layout() {
        let patterns = builtin_patterns();
        let cert = patterns.iter().find(|p| p.name() == "CERTIFICATE_DER").unwrap();
        assert_eq!(cert.kind(), PatternKind::Bracketed);
        assert_eq!(cert.tokens().len(), 14);
        assert_eq!(cert.literal_prefix(), vec![0x30, 0x82]);
        assert_eq!(cert.tokens()[8], ByteMatcher::Exact(0xA0));
    }

    #[test]
    fn public_key_der_is_twenty_bytes() {
        let patterns = builtin_patterns();
        let public = patterns.iter().find(|p| p.name() == "PUBLIC_KEY_DER").unwrap();
        assert_eq!(public.min_len(), 20);
    }

    #[test]
    fn credential_tail_excludes_space() {
        let patterns = builtin_patterns();
        let pwd = patterns.iter().find(|p| p.name() == "PWD").unwrap();
        match pwd.tokens().last() {
            Some(ByteMatcher::Run { class, min }) => {
                assert_eq!(*min, 1);
                assert!(!class.contains(b' '));
                assert!(!class.contains(0x00));
                assert!(class.contains(b'!'));
            }
            other => panic!("unexpected tail {:?}", other),
        }
    }
}

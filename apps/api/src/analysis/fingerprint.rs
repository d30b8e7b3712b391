//! Content fingerprints used as dedup keys for analyses.
//!
//! Text is normalized (trimmed, lower-cased) before digesting so incidental
//! whitespace or case differences map to the same key.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Opaque, comparable digest of normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest algorithm backing a [`Fingerprinter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Sha256,
    /// Degraded, reversible encoding used when no digest is available.
    Encoded,
}

/// Computes fingerprints with a configured digest.
///
/// Unknown digest names degrade to [`DigestKind::Encoded`] instead of failing:
/// dedup gets weaker but callers keep working.
#[derive(Debug)]
pub struct Fingerprinter {
    kind: DigestKind,
    warned: AtomicBool,
}

impl Fingerprinter {
    pub fn new(kind: DigestKind) -> Self {
        Self {
            kind,
            warned: AtomicBool::new(false),
        }
    }

    /// Resolves a digest by name ("sha256", case-insensitive).
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Self::new(DigestKind::Sha256),
            other => {
                warn!(
                    "Digest '{other}' is not available; falling back to encoded fingerprints"
                );
                Self::new(DigestKind::Encoded)
            }
        }
    }

    pub fn kind(&self) -> DigestKind {
        self.kind
    }

    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        match self.kind {
            DigestKind::Sha256 => fingerprint(text),
            DigestKind::Encoded => {
                if !self.warned.swap(true, Ordering::Relaxed) {
                    warn!("Using degraded encoded fingerprints; cache keys are not digests");
                }
                encoded_fingerprint(text)
            }
        }
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DigestKind::Sha256)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// SHA-256 of the normalized text as 64 lowercase hex characters.
pub fn fingerprint(text: &str) -> Fingerprint {
    let digest = Sha256::digest(normalize(text).as_bytes());
    Fingerprint(hex::encode(digest))
}

/// Base64 of the normalized text with every non-alphanumeric character removed.
pub fn encoded_fingerprint(text: &str) -> Fingerprint {
    let encoded = STANDARD.encode(normalize(text).as_bytes());
    Fingerprint(encoded.chars().filter(|c| c.is_ascii_alphanumeric()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let text = "Experienced engineer with 8 years of Rust";
        assert_eq!(fingerprint(text), fingerprint(text));
    }

    #[test]
    fn test_fingerprint_ignores_whitespace_and_case() {
        assert_eq!(fingerprint(" Foo "), fingerprint("foo"));
        assert_eq!(fingerprint("\n\tFOO\n"), fingerprint("foo"));
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = fingerprint("foo");
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            fp.as_str(),
            "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
        );
    }

    #[test]
    fn test_different_text_differs() {
        assert_ne!(fingerprint("foo"), fingerprint("bar"));
    }

    #[test]
    fn test_inner_whitespace_is_significant() {
        assert_ne!(fingerprint("foo bar"), fingerprint("foobar"));
    }

    #[test]
    fn test_encoded_fallback_is_deterministic_and_alphanumeric() {
        let a = encoded_fingerprint("  Hello, World? ");
        let b = encoded_fingerprint("hello, world?");
        assert_eq!(a, b);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        // "hello" -> "aGVsbG8="
        assert_eq!(encoded_fingerprint("Hello").as_str(), "aGVsbG8");
    }

    #[test]
    fn test_unknown_digest_degrades_to_encoding() {
        let fingerprinter = Fingerprinter::from_name("blake9");
        assert_eq!(fingerprinter.kind(), DigestKind::Encoded);
        assert_eq!(
            fingerprinter.fingerprint("Foo"),
            encoded_fingerprint("foo")
        );
    }

    #[test]
    fn test_named_sha256_matches_free_function() {
        let fingerprinter = Fingerprinter::from_name("SHA256");
        assert_eq!(fingerprinter.kind(), DigestKind::Sha256);
        assert_eq!(fingerprinter.fingerprint("foo"), fingerprint("foo"));
    }
}

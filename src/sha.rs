//! Short keyed digest guarding inbound tokens.
//!
//! A job's SHA is the first [`SHA_LENGTH`] hex characters of
//! SHA-256(token + secret). Anyone holding the secret can mint a matching
//! SHA for any token; nobody else can, so a serving layer that demands a
//! valid SHA only runs pipelines its own application signed. Eight
//! characters is deliberate: enough to stop URL tampering, short enough
//! to keep URLs readable.

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Hex characters kept from the full digest.
pub const SHA_LENGTH: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShaError {
    #[error("no SHA given")]
    MissingSha,
    #[error("incorrect SHA: {0}")]
    IncorrectSha(String),
}

/// Keyed digest of a serialized token.
pub fn token_sha(token: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(secret.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..SHA_LENGTH].to_string()
}

/// Check a caller-supplied SHA against the expected one for a token.
/// An absent or empty candidate is its own error so callers can
/// distinguish "forgot the SHA" from "wrong SHA".
pub fn validate_sha(token: &str, secret: &str, candidate: Option<&str>) -> Result<(), ShaError> {
    let candidate = match candidate {
        Some(c) if !c.is_empty() => c,
        _ => return Err(ShaError::MissingSha),
    };
    let expected = token_sha(token, secret);
    if candidate == expected {
        Ok(())
    } else {
        warn!(candidate, "rejected token with a wrong SHA");
        Err(ShaError::IncorrectSha(candidate.to_string()))
    }
}

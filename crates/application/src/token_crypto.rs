use std::fmt::Write;

use handoff_core::{AppError, AppResult};
use sha2::{Digest, Sha256};

/// Generates `byte_len` cryptographically random bytes rendered as lowercase hex.
pub(crate) fn random_hex(byte_len: usize) -> AppResult<String> {
    let mut bytes = vec![0u8; byte_len];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to gather randomness: {error}")))?;

    Ok(to_hex(&bytes))
}

/// Generates an opaque credential and its SHA-256 hash.
///
/// Returns `(raw_credential_hex, sha256_hash_hex)`.
pub(crate) fn generate_credential(byte_len: usize) -> AppResult<(String, String)> {
    let raw = random_hex(byte_len)?;
    let hash = hash_credential(&raw);
    Ok((raw, hash))
}

/// Computes the SHA-256 hash of a credential for storage and lookup.
pub(crate) fn hash_credential(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    to_hex(&digest)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::{generate_credential, hash_credential, random_hex};

    #[test]
    fn credentials_are_fixed_length_hex() {
        let raw = random_hex(16).unwrap_or_default();
        assert_eq!(raw.len(), 32);
        assert!(raw.bytes().all(|byte| byte.is_ascii_hexdigit()));
    }

    #[test]
    fn stored_hash_matches_lookup_hash() {
        let (raw, hash) = generate_credential(24).unwrap_or_default();
        assert_eq!(raw.len(), 48);
        assert_eq!(hash, hash_credential(&raw));
        assert_ne!(raw, hash);
    }

    #[test]
    fn consecutive_credentials_differ() {
        assert_ne!(random_hex(16).ok(), random_hex(16).ok());
    }
}

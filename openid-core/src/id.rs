//! Random identifier generation
//!
//! Identifiers are URL-safe base64 without padding and carry at least 96 bits of
//! entropy. They are used for token ids and, by the software authenticator, for
//! challenges and credential ids.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

use crate::{Error, error::CryptoError};

const MIN_ENTROPY_BYTES: usize = 12;

/// Fill a fresh buffer of `len` bytes from the operating system RNG
pub fn random_bytes(len: usize) -> Result<Vec<u8>, Error> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::Random(e.to_string()))?;
    Ok(bytes)
}

/// Generate a prefixed ID of the form `{prefix}_{random}` with 96 bits of entropy
pub fn generate_prefixed_id(prefix: &str) -> Result<String, Error> {
    let bytes = random_bytes(MIN_ENTROPY_BYTES)?;
    Ok(format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes)))
}

/// Validate that a prefixed ID has the expected prefix and enough entropy
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= MIN_ENTROPY_BYTES,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prefixed_id() {
        let id = generate_prefixed_id("jti").unwrap();
        assert!(id.starts_with("jti_"));
        // 12 bytes encodes to 16 base64 characters
        assert_eq!(id.len(), "jti_".len() + 16);
        assert!(validate_prefixed_id(&id, "jti"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = generate_prefixed_id("jti").unwrap();
        let b = generate_prefixed_id("jti").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_prefixed_id_rejects() {
        assert!(!validate_prefixed_id("jti_short", "jti"));
        assert!(!validate_prefixed_id("tok_AAAAAAAAAAAAAAAA", "jti"));
        assert!(!validate_prefixed_id("jtiAAAAAAAAAAAAAAAA", "jti"));
        assert!(!validate_prefixed_id("jti_!!!!!!!!!!!!!!!!", "jti"));
    }

    #[test]
    fn test_random_bytes_len() {
        assert_eq!(random_bytes(32).unwrap().len(), 32);
    }
}

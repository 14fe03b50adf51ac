//! Stored passkey credentials
//!
//! Binary fields (credential id, public key, AAGUID) are persisted as URL-safe
//! base64 without padding. Transports are kept as a sorted, de-duplicated list and
//! flattened to a comma separated string by relational backends.
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Error, error::PasskeyError};

/// A registered authenticator bound to an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeyCredential {
    /// Row id assigned by the backend
    pub id: i64,
    pub account_id: AccountId,
    pub credential_id: String,
    /// Opaque verifier-specific key material
    pub public_key: String,
    pub attestation_type: String,
    pub aaguid: String,
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub clone_warning: bool,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl PasskeyCredential {
    pub fn credential_id_bytes(&self) -> Result<Vec<u8>, Error> {
        decode_binary("credential_id", &self.credential_id)
    }

    pub fn public_key_bytes(&self) -> Result<Vec<u8>, Error> {
        decode_binary("public_key", &self.public_key)
    }

    pub fn aaguid_bytes(&self) -> Result<Vec<u8>, Error> {
        decode_binary("aaguid", &self.aaguid)
    }

    /// Whether this credential was issued under the given raw credential id
    pub fn matches(&self, raw_credential_id: &[u8]) -> bool {
        self.credential_id == encode_binary(raw_credential_id)
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id,
            credential_id: self.credential_id.clone(),
            remark: self.remark.clone(),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            clone_warning: self.clone_warning,
            sign_count: self.sign_count,
            transports: self.transports.clone(),
        }
    }
}

/// A freshly verified credential about to be upserted
#[derive(Debug, Clone)]
pub struct NewPasskeyCredential {
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub aaguid: Vec<u8>,
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub remark: Option<String>,
}

impl NewPasskeyCredential {
    pub fn encoded_credential_id(&self) -> String {
        encode_binary(&self.credential_id)
    }

    pub fn encoded_public_key(&self) -> String {
        encode_binary(&self.public_key)
    }

    pub fn encoded_aaguid(&self) -> String {
        encode_binary(&self.aaguid)
    }
}

/// What the account owner sees when listing their passkeys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: i64,
    pub credential_id: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub clone_warning: bool,
    pub sign_count: u32,
    pub transports: Vec<String>,
}

/// Result of comparing an asserted signature counter with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterCheck {
    /// Counter to persist after this login
    pub sign_count: u32,
    pub clone_warning: bool,
    /// The authenticator reported a counter that did not advance
    pub regressed: bool,
}

impl CounterCheck {
    /// Apply the sign counter policy.
    ///
    /// A pair of zero counters means the authenticator does not implement counters.
    /// A counter that fails to advance past a non-zero stored value marks the
    /// credential as possibly cloned; the stored value is kept and the login is
    /// still accepted.
    pub fn evaluate(stored_count: u32, clone_warning: bool, new_count: u32) -> Self {
        if stored_count == 0 && new_count == 0 {
            return Self {
                sign_count: 0,
                clone_warning,
                regressed: false,
            };
        }

        if new_count > stored_count {
            return Self {
                sign_count: new_count,
                clone_warning,
                regressed: false,
            };
        }

        Self {
            sign_count: stored_count,
            clone_warning: true,
            regressed: true,
        }
    }
}

pub fn encode_binary(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a stored base64url field; failures are fatal for the ceremony
pub fn decode_binary(field: &str, value: &str) -> Result<Vec<u8>, Error> {
    BASE64_URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| PasskeyError::InvalidCredentialData(format!("{field}: {e}")).into())
}

/// Trim, drop empties, sort and de-duplicate a transport list
pub fn normalize_transports<I, S>(transports: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = transports
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

pub fn join_transports(transports: &[String]) -> String {
    normalize_transports(transports).join(",")
}

pub fn split_transports(joined: &str) -> Vec<String> {
    normalize_transports(joined.split(','))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_both_zero_keeps_flag() {
        let check = CounterCheck::evaluate(0, false, 0);
        assert_eq!(check.sign_count, 0);
        assert!(!check.clone_warning);
        assert!(!check.regressed);

        let check = CounterCheck::evaluate(0, true, 0);
        assert!(check.clone_warning);
        assert!(!check.regressed);
    }

    #[test]
    fn test_counter_advances() {
        let check = CounterCheck::evaluate(5, false, 6);
        assert_eq!(check.sign_count, 6);
        assert!(!check.clone_warning);

        let check = CounterCheck::evaluate(0, false, 1);
        assert_eq!(check.sign_count, 1);
        assert!(!check.clone_warning);
    }

    #[test]
    fn test_counter_advance_keeps_recorded_warning() {
        let check = CounterCheck::evaluate(5, true, 9);
        assert_eq!(check.sign_count, 9);
        assert!(check.clone_warning);
        assert!(!check.regressed);
    }

    #[test]
    fn test_counter_regression_flags_clone() {
        let check = CounterCheck::evaluate(10, false, 10);
        assert!(check.clone_warning);
        assert!(check.regressed);
        assert_eq!(check.sign_count, 10);

        let check = CounterCheck::evaluate(10, false, 3);
        assert!(check.clone_warning);
        assert_eq!(check.sign_count, 10);

        let check = CounterCheck::evaluate(10, false, 0);
        assert!(check.clone_warning);
    }

    #[test]
    fn test_transport_normalization() {
        assert_eq!(
            split_transports(" usb,internal,, usb ,hybrid"),
            vec!["hybrid", "internal", "usb"]
        );
        assert!(split_transports("").is_empty());
        assert_eq!(
            join_transports(&["usb".to_string(), "internal".to_string()]),
            "internal,usb"
        );
    }

    #[test]
    fn test_decode_binary_rejects_garbage() {
        let err = decode_binary("public_key", "not*base64").unwrap_err();
        assert!(matches!(
            err,
            Error::Passkey(PasskeyError::InvalidCredentialData(_))
        ));
        assert_eq!(decode_binary("aaguid", "").unwrap(), Vec::<u8>::new());
    }
}

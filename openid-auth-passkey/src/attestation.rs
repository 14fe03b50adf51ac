//! Metadata read straight from a CBOR attestation object
use ciborium::{de::from_reader, value::Value};
use openid_core::{Error, error::PasskeyError};

/// Flag bit signalling attested credential data in authenticator data
const FLAG_ATTESTED_CREDENTIAL: u8 = 0x40;
const AAGUID_OFFSET: usize = 37;
const AAGUID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationMetadata {
    /// Attestation statement format, e.g. `none` or `packed`
    pub format: String,
    /// 16 byte authenticator model id; all zeroes when the authenticator hides it
    pub aaguid: Vec<u8>,
}

impl AttestationMetadata {
    pub fn parse(attestation_object: &[u8]) -> Result<Self, Error> {
        let value: Value = from_reader(attestation_object)
            .map_err(|e| malformed(format!("invalid CBOR: {e}")))?;
        let map = value
            .as_map()
            .ok_or_else(|| malformed("attestation object is not a map"))?;

        let field = |name: &str| {
            map.iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v)
        };

        let format = field("fmt")
            .and_then(Value::as_text)
            .ok_or_else(|| malformed("missing fmt"))?
            .to_string();
        let auth_data = field("authData")
            .and_then(Value::as_bytes)
            .ok_or_else(|| malformed("missing authData"))?;

        Ok(Self {
            format,
            aaguid: aaguid(auth_data),
        })
    }
}

fn aaguid(auth_data: &[u8]) -> Vec<u8> {
    let attested = auth_data
        .get(32)
        .is_some_and(|flags| flags & FLAG_ATTESTED_CREDENTIAL != 0);

    match auth_data.get(AAGUID_OFFSET..AAGUID_OFFSET + AAGUID_LEN) {
        Some(aaguid) if attested => aaguid.to_vec(),
        _ => vec![0; AAGUID_LEN],
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    PasskeyError::VerificationFailed(format!("malformed attestation object: {}", reason.into()))
        .into()
}

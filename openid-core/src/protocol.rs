//! WebAuthn JSON wire types
//!
//! These mirror the `PublicKeyCredentialCreationOptions` / `RequestOptions`
//! dictionaries handed to `navigator.credentials` and the JSON encoding of the
//! credentials it returns. Binary members are base64url strings. Members the
//! ceremonies do not interpret are preserved in `extra`.
use base64::{
    Engine,
    prelude::{BASE64_STANDARD, BASE64_URL_SAFE, BASE64_URL_SAFE_NO_PAD},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, error::PasskeyError};

pub const PUBLIC_KEY_TYPE: &str = "public-key";
pub const USER_VERIFICATION_PREFERRED: &str = "preferred";
/// No attestation statement is requested
pub const ATTESTATION_NONE: &str = "none";
pub const CLIENT_DATA_CREATE: &str = "webauthn.create";
pub const CLIENT_DATA_GET: &str = "webauthn.get";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    pub challenge: String,
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    #[serde(default)]
    pub pub_key_cred_params: Vec<CredentialParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_credentials: Option<Vec<CredentialDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Vec<CredentialDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestOptions {
    pub fn allowed_ids(&self) -> Vec<String> {
        self.allow_credentials
            .iter()
            .flatten()
            .map(|d| d.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub alg: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

impl CredentialDescriptor {
    pub fn public_key(id: impl Into<String>, transports: Vec<String>) -> Self {
        Self {
            kind: PUBLIC_KEY_TYPE.to_string(),
            id: id.into(),
            transports: (!transports.is_empty()).then_some(transports),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<String>,
    #[serde(default)]
    pub require_resident_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
}

impl AuthenticatorSelection {
    /// Platform authenticator holding a discoverable credential, UV preferred
    pub fn platform_passkey() -> Self {
        Self {
            authenticator_attachment: Some("platform".to_string()),
            resident_key: Some("required".to_string()),
            require_resident_key: true,
            user_verification: Some(USER_VERIFICATION_PREFERRED.to_string()),
        }
    }
}

/// Browser response to `navigator.credentials.create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type", default = "public_key_type")]
    pub kind: String,
    pub response: AttestationResponse,
    #[serde(default)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    pub attestation_object: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

/// Browser response to `navigator.credentials.get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type", default = "public_key_type")]
    pub kind: String,
    pub response: AuthenticatorAssertion,
    #[serde(default)]
    pub extensions: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertion {
    pub authenticator_data: String,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

fn public_key_type() -> String {
    PUBLIC_KEY_TYPE.to_string()
}

/// The fields of `clientDataJSON` the ceremonies look at
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientData {
    #[serde(rename = "type")]
    pub kind: String,
    pub challenge: String,
    pub origin: String,
}

impl ClientData {
    pub fn parse(encoded: &str) -> Result<Self, Error> {
        let raw = decode_client_binary("clientDataJSON", encoded)?;
        serde_json::from_slice(&raw).map_err(|e| {
            PasskeyError::VerificationFailed(format!("malformed clientDataJSON: {e}")).into()
        })
    }
}

impl RegistrationResponse {
    pub fn raw_credential_id(&self) -> Result<Vec<u8>, Error> {
        decode_client_binary("rawId", &self.raw_id)
    }

    pub fn client_data(&self) -> Result<ClientData, Error> {
        ClientData::parse(&self.response.client_data_json)
    }

    pub fn transports(&self) -> Vec<String> {
        self.response.transports.clone().unwrap_or_default()
    }
}

impl AssertionResponse {
    pub fn raw_credential_id(&self) -> Result<Vec<u8>, Error> {
        decode_client_binary("rawId", &self.raw_id)
    }

    pub fn client_data(&self) -> Result<ClientData, Error> {
        ClientData::parse(&self.response.client_data_json)
    }

    /// The user handle, when the authenticator returned a non-empty one
    pub fn user_handle(&self) -> Result<Option<Vec<u8>>, Error> {
        match self.response.user_handle.as_deref() {
            None | Some("") => Ok(None),
            Some(handle) => decode_client_binary("userHandle", handle).map(Some),
        }
    }
}

/// Decode a base64 field sent by a client.
///
/// Browsers and client libraries disagree on padding and alphabet, so URL-safe
/// (padded or not) and standard alphabets are all accepted.
pub fn decode_client_binary(field: &str, value: &str) -> Result<Vec<u8>, Error> {
    BASE64_URL_SAFE_NO_PAD
        .decode(value)
        .or_else(|_| BASE64_URL_SAFE.decode(value))
        .or_else(|_| BASE64_STANDARD.decode(value))
        .map_err(|e| PasskeyError::VerificationFailed(format!("{field} is not base64: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::encode_binary;

    #[test]
    fn test_creation_options_keep_unknown_members() {
        let json = serde_json::json!({
            "challenge": "Y2hhbGxlbmdl",
            "rp": {"id": "example.com", "name": "Example"},
            "user": {"id": "AAAA", "name": "alice", "displayName": "alice@example.com"},
            "pubKeyCredParams": [{"type": "public-key", "alg": -7}],
            "timeout": 60000,
            "excludeCredentials": null,
            "extensions": {"credProps": true}
        });
        let options: CreationOptions = serde_json::from_value(json).unwrap();
        assert_eq!(options.rp.id, "example.com");
        assert_eq!(options.user.display_name, "alice@example.com");
        assert!(options.exclude_credentials.is_none());
        assert_eq!(
            options.extra.get("extensions"),
            Some(&serde_json::json!({"credProps": true}))
        );

        let out = serde_json::to_value(&options).unwrap();
        assert_eq!(out["extensions"]["credProps"], true);
        assert!(out.get("attestation").is_none());
    }

    #[test]
    fn test_request_options_allowed_ids() {
        let options = RequestOptions {
            challenge: "c".to_string(),
            timeout: None,
            rp_id: Some("example.com".to_string()),
            allow_credentials: Some(vec![
                CredentialDescriptor::public_key("a", vec![]),
                CredentialDescriptor::public_key("b", vec!["usb".to_string()]),
            ]),
            user_verification: None,
            extra: Map::new(),
        };
        assert_eq!(options.allowed_ids(), vec!["a", "b"]);

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["rpId"], "example.com");
        assert!(json["allowCredentials"][0].get("transports").is_none());
        assert_eq!(json["allowCredentials"][1]["transports"][0], "usb");
    }

    #[test]
    fn test_client_data_parse() {
        let client_data = serde_json::json!({
            "type": "webauthn.get",
            "challenge": "abc",
            "origin": "https://example.com",
            "crossOrigin": false
        });
        let encoded = encode_binary(client_data.to_string().as_bytes());
        let parsed = ClientData::parse(&encoded).unwrap();
        assert_eq!(parsed.kind, "webauthn.get");
        assert_eq!(parsed.challenge, "abc");

        assert!(matches!(
            ClientData::parse("e30").unwrap_err(),
            Error::Passkey(PasskeyError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_empty_user_handle_is_none() {
        let response: AssertionResponse = serde_json::from_value(serde_json::json!({
            "id": "AQID",
            "rawId": "AQID",
            "type": "public-key",
            "response": {
                "authenticatorData": "",
                "clientDataJSON": "",
                "signature": "",
                "userHandle": ""
            }
        }))
        .unwrap();
        assert_eq!(response.user_handle().unwrap(), None);
        assert_eq!(response.raw_credential_id().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_client_binary_accepts_padding() {
        assert_eq!(decode_client_binary("x", "AQI=").unwrap(), vec![1, 2]);
        assert_eq!(decode_client_binary("x", "AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode_client_binary("x", "-_8").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_client_binary("x", "+/8=").unwrap(), vec![0xfb, 0xff]);
    }
}

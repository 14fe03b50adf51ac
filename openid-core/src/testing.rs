//! Software authenticator for exercising the ceremonies without a browser
//!
//! [`SoftAuthenticator`] produces registration and assertion responses in the
//! WebAuthn JSON shape. [`SoftVerifier`] accepts them, checking the client data
//! type, challenge and origin, the relying party hash, the allow list and a keyed
//! digest standing in for the signature. The digest is not cryptographically
//! secure; this module only exists for tests.
use serde::{Deserialize, Serialize};
use serde_json::{Map, json};

use crate::{
    AccountId, ChallengeSession, Error, PasskeyIdentity, RelyingParty,
    credential::encode_binary,
    error::PasskeyError,
    id::random_bytes,
    protocol::{
        AssertionResponse, AttestationResponse, AuthenticatorAssertion, CLIENT_DATA_CREATE,
        CLIENT_DATA_GET, ClientData, CreationOptions, CredentialDescriptor, CredentialParameters,
        PUBLIC_KEY_TYPE,
        RegistrationResponse, RelyingPartyEntity, RequestOptions, UserEntity,
        decode_client_binary,
    },
    verifier::{
        AuthenticationStart, PasskeyVerifier, RegistrationStart, VerifiedAssertion,
        VerifiedCredential,
    },
};

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;
const AUTH_DATA_LEN: usize = 37;

/// Attestation object emitted by the software authenticator
#[derive(Debug, Serialize, Deserialize)]
struct SoftAttestation {
    public_key: String,
    sign_count: u32,
    aaguid: String,
}

/// Deterministic 32 byte digest over the concatenated parts
pub fn soft_digest(parts: &[&[u8]]) -> Vec<u8> {
    const PRIME: u64 = 0x0100_0000_01b3;
    let mut out = [0u8; 32];
    let mut acc: u64 = 0xcbf2_9ce4_8422_2325;

    for (i, byte) in parts.iter().flat_map(|p| p.iter()).enumerate() {
        acc = (acc ^ u64::from(*byte)).wrapping_mul(PRIME);
        out[i % 32] ^= (acc >> 24) as u8;
    }
    for (lane, slot) in out.iter_mut().enumerate() {
        acc = (acc ^ lane as u64).wrapping_mul(PRIME);
        *slot ^= (acc >> 32) as u8;
    }
    out.to_vec()
}

/// A platform authenticator holding a single credential
#[derive(Debug, Clone)]
pub struct SoftAuthenticator {
    rp_id: String,
    origin: String,
    credential_id: Vec<u8>,
    key: Vec<u8>,
    aaguid: Vec<u8>,
    counter: u32,
    counter_step: u32,
    next_counter: Option<u32>,
    user_handle: Option<Vec<u8>>,
    send_user_handle: bool,
}

impl SoftAuthenticator {
    pub fn new(relying_party: &RelyingParty) -> Result<Self, Error> {
        Ok(Self {
            rp_id: relying_party.id.clone(),
            origin: relying_party.origin_str(),
            credential_id: random_bytes(16)?,
            key: random_bytes(32)?,
            aaguid: vec![0xad; 16],
            counter: 0,
            counter_step: 1,
            next_counter: None,
            user_handle: None,
            send_user_handle: true,
        })
    }

    /// Report a different origin in client data, as a phishing page would
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Amount the counter advances per assertion; zero models counterless authenticators
    pub fn with_counter_step(mut self, step: u32) -> Self {
        self.counter_step = step;
        self
    }

    /// Leave the user handle out of assertions
    pub fn without_user_handle(mut self) -> Self {
        self.send_user_handle = false;
        self
    }

    /// Override the user handle returned in assertions
    pub fn with_user_handle(mut self, handle: Vec<u8>) -> Self {
        self.user_handle = Some(handle);
        self
    }

    /// Make the next assertion report exactly this counter
    pub fn set_next_counter(&mut self, counter: u32) {
        self.next_counter = Some(counter);
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    pub fn encoded_credential_id(&self) -> String {
        encode_binary(&self.credential_id)
    }

    pub fn public_key(&self) -> &[u8] {
        &self.key
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Answer `navigator.credentials.create`
    pub fn register(&mut self, options: &CreationOptions) -> Result<RegistrationResponse, Error> {
        if self.user_handle.is_none() {
            self.user_handle = Some(decode_client_binary("user.id", &options.user.id)?);
        }
        self.rp_id = options.rp.id.clone();

        let client_data = self.client_data(CLIENT_DATA_CREATE, &options.challenge);
        let attestation = serde_json::to_vec(&SoftAttestation {
            public_key: encode_binary(&self.key),
            sign_count: self.counter,
            aaguid: encode_binary(&self.aaguid),
        })
        .map_err(|e| PasskeyError::Ceremony(e.to_string()))?;

        Ok(RegistrationResponse {
            id: self.encoded_credential_id(),
            raw_id: self.encoded_credential_id(),
            kind: PUBLIC_KEY_TYPE.to_string(),
            response: AttestationResponse {
                attestation_object: encode_binary(&attestation),
                client_data_json: encode_binary(client_data.as_bytes()),
                transports: Some(vec!["internal".to_string(), "hybrid".to_string()]),
            },
            extensions: Map::new(),
        })
    }

    /// Answer `navigator.credentials.get`, advancing the signature counter
    pub fn assert(&mut self, options: &RequestOptions) -> Result<AssertionResponse, Error> {
        self.counter = match self.next_counter.take() {
            Some(counter) => counter,
            None => self.counter.saturating_add(self.counter_step),
        };

        let mut auth_data = soft_digest(&[self.rp_id.as_bytes()]);
        auth_data.push(FLAG_USER_PRESENT | FLAG_USER_VERIFIED);
        auth_data.extend_from_slice(&self.counter.to_be_bytes());

        let client_data = self.client_data(CLIENT_DATA_GET, &options.challenge);
        let signature = soft_digest(&[&self.key, &auth_data, client_data.as_bytes()]);

        let user_handle = self
            .user_handle
            .as_deref()
            .filter(|_| self.send_user_handle)
            .map(encode_binary);

        Ok(AssertionResponse {
            id: self.encoded_credential_id(),
            raw_id: self.encoded_credential_id(),
            kind: PUBLIC_KEY_TYPE.to_string(),
            response: AuthenticatorAssertion {
                authenticator_data: encode_binary(&auth_data),
                client_data_json: encode_binary(client_data.as_bytes()),
                signature: encode_binary(&signature),
                user_handle,
            },
            extensions: Map::new(),
        })
    }

    fn client_data(&self, kind: &str, challenge: &str) -> String {
        json!({
            "type": kind,
            "challenge": challenge,
            "origin": self.origin,
            "crossOrigin": false,
        })
        .to_string()
    }
}

/// Verifier that understands [`SoftAuthenticator`] responses
#[derive(Debug, Clone)]
pub struct SoftVerifier {
    relying_party: RelyingParty,
}

impl SoftVerifier {
    pub fn new(relying_party: RelyingParty) -> Self {
        Self { relying_party }
    }

    fn new_challenge() -> Result<String, Error> {
        Ok(encode_binary(&random_bytes(32)?))
    }

    fn check_client_data(
        &self,
        client_data: &ClientData,
        kind: &str,
        session: &ChallengeSession,
    ) -> Result<(), Error> {
        if client_data.kind != kind {
            return Err(rejected(format!("unexpected client data type {}", client_data.kind)));
        }
        if client_data.challenge != session.challenge {
            return Err(rejected("challenge mismatch"));
        }
        if client_data.origin != self.relying_party.origin_str() {
            return Err(rejected(format!("unexpected origin {}", client_data.origin)));
        }
        Ok(())
    }

    fn request_options(&self, challenge: String, allow: Vec<CredentialDescriptor>) -> RequestOptions {
        RequestOptions {
            challenge,
            timeout: None,
            rp_id: Some(self.relying_party.id.clone()),
            allow_credentials: Some(allow),
            user_verification: None,
            extra: Map::new(),
        }
    }
}

fn rejected(reason: impl Into<String>) -> Error {
    PasskeyError::VerificationFailed(reason.into()).into()
}

impl PasskeyVerifier for SoftVerifier {
    fn start_registration(&self, identity: &PasskeyIdentity) -> Result<RegistrationStart, Error> {
        let challenge = Self::new_challenge()?;
        let descriptors = identity.descriptors();
        let options = CreationOptions {
            challenge: challenge.clone(),
            rp: RelyingPartyEntity {
                id: self.relying_party.id.clone(),
                name: self.relying_party.name.clone(),
            },
            user: UserEntity {
                id: encode_binary(identity.user_handle().as_bytes()),
                name: identity.name(),
                display_name: identity.display_name(),
            },
            pub_key_cred_params: vec![
                CredentialParameters {
                    kind: PUBLIC_KEY_TYPE.to_string(),
                    alg: -7,
                },
                CredentialParameters {
                    kind: PUBLIC_KEY_TYPE.to_string(),
                    alg: -257,
                },
            ],
            timeout: None,
            exclude_credentials: (!descriptors.is_empty()).then_some(descriptors),
            authenticator_selection: None,
            attestation: None,
            extra: Map::new(),
        };

        Ok(RegistrationStart {
            options,
            state: json!({ "challenge": challenge }),
        })
    }

    fn finish_registration(
        &self,
        _identity: &PasskeyIdentity,
        response: &RegistrationResponse,
        session: &ChallengeSession,
    ) -> Result<VerifiedCredential, Error> {
        self.check_client_data(&response.client_data()?, CLIENT_DATA_CREATE, session)?;

        let raw = decode_client_binary("attestationObject", &response.response.attestation_object)?;
        let attestation: SoftAttestation = serde_json::from_slice(&raw)
            .map_err(|e| rejected(format!("malformed attestation object: {e}")))?;

        Ok(VerifiedCredential {
            credential_id: response.raw_credential_id()?,
            public_key: decode_client_binary("publicKey", &attestation.public_key)?,
            attestation_type: "none".to_string(),
            aaguid: decode_client_binary("aaguid", &attestation.aaguid)?,
            sign_count: attestation.sign_count,
            transports: response.transports(),
        })
    }

    fn start_authentication(
        &self,
        identity: &PasskeyIdentity,
    ) -> Result<AuthenticationStart, Error> {
        let challenge = Self::new_challenge()?;
        Ok(AuthenticationStart {
            options: self.request_options(challenge.clone(), identity.descriptors()),
            state: json!({ "challenge": challenge }),
        })
    }

    fn start_discoverable_authentication(&self) -> Result<AuthenticationStart, Error> {
        let challenge = Self::new_challenge()?;
        Ok(AuthenticationStart {
            options: self.request_options(challenge.clone(), Vec::new()),
            state: json!({ "challenge": challenge }),
        })
    }

    fn finish_authentication(
        &self,
        identity: &PasskeyIdentity,
        response: &AssertionResponse,
        session: &ChallengeSession,
    ) -> Result<VerifiedAssertion, Error> {
        self.check_client_data(&response.client_data()?, CLIENT_DATA_GET, session)?;

        let raw_id = response.raw_credential_id()?;
        let key = identity
            .find_credential(&raw_id)
            .ok_or_else(|| rejected("credential is not registered"))?;
        if !session.allows(&raw_id) {
            return Err(rejected("credential is not in the allow list"));
        }

        if let Some(handle) = response.user_handle()? {
            if AccountId::from_user_handle(&handle) != Some(identity.account_id()) {
                return Err(rejected("user handle does not match the credential owner"));
            }
        }

        let auth_data = decode_client_binary("authenticatorData", &response.response.authenticator_data)?;
        if auth_data.len() < AUTH_DATA_LEN {
            return Err(rejected("authenticator data too short"));
        }
        if auth_data[..32] != soft_digest(&[self.relying_party.id.as_bytes()])[..] {
            return Err(rejected("relying party id hash mismatch"));
        }
        let flags = auth_data[32];
        if flags & FLAG_USER_PRESENT == 0 {
            return Err(rejected("user not present"));
        }

        let client_data_json = decode_client_binary("clientDataJSON", &response.response.client_data_json)?;
        let signature = decode_client_binary("signature", &response.response.signature)?;
        if signature != soft_digest(&[&key.public_key, &auth_data, &client_data_json]) {
            return Err(rejected("signature mismatch"));
        }

        let mut counter = [0u8; 4];
        counter.copy_from_slice(&auth_data[33..AUTH_DATA_LEN]);

        Ok(VerifiedAssertion {
            credential_id: raw_id,
            sign_count: u32::from_be_bytes(counter),
            user_verified: flags & FLAG_USER_VERIFIED != 0,
        })
    }
}

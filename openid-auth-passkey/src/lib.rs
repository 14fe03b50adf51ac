//! [`PasskeyVerifier`] backed by webauthn-rs
//!
//! Stored key material is the serde JSON of a webauthn-rs [`Passkey`]. Ceremony
//! state (`RegistrationState`, `AuthenticationState`) travels through the
//! challenge session as JSON.
//!
//! The ceremonies advertise user verification as "preferred", so every
//! challenge is built on [`WebauthnCore`] with that policy. webauthn-rs' own
//! passkey helpers always demand verification.
//!
//! Before a login, stored credentials are relaxed to match: the counter is reset
//! to zero so webauthn-rs does not refuse a counter that failed to advance, and
//! the remembered registration policy is cleared so a credential enrolled with
//! verification can still log in without it. The ceremonies apply their own
//! counter policy afterwards.
mod attestation;

pub use attestation::AttestationMetadata;

use openid_core::{
    AccountId, CeremonyKind, ChallengeSession, Error, PasskeyIdentity, RelyingParty,
    error::PasskeyError,
    protocol::{
        AssertionResponse, CreationOptions, RegistrationResponse, RequestOptions,
        decode_client_binary,
    },
    verifier::{
        AuthenticationStart, PasskeyVerifier, RegistrationStart, VerifiedAssertion,
        VerifiedCredential,
    },
};
use serde_json::Value;
use webauthn_rs::{DEFAULT_AUTHENTICATOR_TIMEOUT, WebauthnBuilder, prelude::Passkey};
use webauthn_rs_core::{
    WebauthnCore,
    error::WebauthnError,
    proto::{AuthenticationResult, AuthenticationState, Credential, CredentialID, RegistrationState},
};
use webauthn_rs_proto::{
    AttestationConveyancePreference, AuthenticatorAttachment, COSEAlgorithm,
    PublicKeyCredential, RegisterPublicKeyCredential, RequestRegistrationExtensions,
    UserVerificationPolicy,
};

/// User verification policy of every ceremony this verifier starts
const USER_VERIFICATION: UserVerificationPolicy = UserVerificationPolicy::Preferred;

pub struct WebauthnVerifier {
    core: WebauthnCore,
}

impl WebauthnVerifier {
    pub fn new(relying_party: &RelyingParty) -> Result<Self, Error> {
        // Rejects an rp id that is not a suffix of the origin's host
        WebauthnBuilder::new(&relying_party.id, &relying_party.origin).map_err(ceremony)?;

        let core = WebauthnCore::new_unsafe_experts_only(
            &relying_party.name,
            &relying_party.id,
            vec![relying_party.origin.clone()],
            DEFAULT_AUTHENTICATOR_TIMEOUT,
            None,
            None,
        );
        Ok(Self { core })
    }

    fn start_login(&self, credentials: Vec<Credential>) -> Result<AuthenticationStart, Error> {
        let builder = self
            .core
            .new_challenge_authenticate_builder(credentials, Some(USER_VERIFICATION))
            .map_err(ceremony)?
            .allow_backup_eligible_upgrade(true);
        let (challenge, state) = self
            .core
            .generate_challenge_authenticate(builder)
            .map_err(ceremony)?;

        let options: RequestOptions = public_key_options(&challenge)?;
        Ok(AuthenticationStart {
            options,
            state: state_to(&state)?,
        })
    }

    fn finish_login(
        &self,
        identity: &PasskeyIdentity,
        credential: &PublicKeyCredential,
        session: &ChallengeSession,
    ) -> Result<AuthenticationResult, Error> {
        let mut state: AuthenticationState = state_from(session)?;
        if session.kind == CeremonyKind::DiscoverableLogin {
            // Nothing was known at begin; the owner's keys are known now
            state.set_allowed_credentials(stored_credentials(identity)?);
        }

        self.core
            .authenticate_credential(credential, &state)
            .map_err(rejected)
    }
}

fn ceremony(e: WebauthnError) -> Error {
    PasskeyError::Ceremony(e.to_string()).into()
}

fn rejected(e: WebauthnError) -> Error {
    PasskeyError::VerificationFailed(e.to_string()).into()
}

/// webauthn-rs wraps options in `{"publicKey": ...}`
fn public_key_options<T: serde::Serialize, U: serde::de::DeserializeOwned>(
    challenge: &T,
) -> Result<U, Error> {
    let mut value = serde_json::to_value(challenge)
        .map_err(|e| PasskeyError::Ceremony(e.to_string()))?;
    let inner = value
        .get_mut("publicKey")
        .map(Value::take)
        .ok_or_else(|| PasskeyError::Ceremony("options without publicKey".to_string()))?;
    serde_json::from_value(inner).map_err(|e| PasskeyError::Ceremony(e.to_string()).into())
}

fn state_to<T: serde::Serialize>(state: &T) -> Result<Value, Error> {
    serde_json::to_value(state).map_err(|e| PasskeyError::Ceremony(e.to_string()).into())
}

fn state_from<T: serde::de::DeserializeOwned>(session: &ChallengeSession) -> Result<T, Error> {
    serde_json::from_value(session.state.clone()).map_err(|e| {
        PasskeyError::VerificationFailed(format!("unusable ceremony state: {e}")).into()
    })
}

/// Client responses are re-read as webauthn-rs types; a shape mismatch is a rejection
fn response_as<T: serde::Serialize, U: serde::de::DeserializeOwned>(response: &T) -> Result<U, Error> {
    serde_json::to_value(response)
        .and_then(serde_json::from_value)
        .map_err(|e| PasskeyError::VerificationFailed(format!("malformed response: {e}")).into())
}

/// The credential as webauthn-rs should see it during a login
fn login_credential(passkey: Passkey) -> Credential {
    let mut credential = Credential::from(passkey);
    credential.counter = 0;
    credential.user_verified = false;
    credential.registration_policy = USER_VERIFICATION;
    credential
}

fn stored_credentials(identity: &PasskeyIdentity) -> Result<Vec<Credential>, Error> {
    identity
        .credentials()
        .iter()
        .map(|key| {
            let passkey: Passkey = serde_json::from_slice(&key.public_key).map_err(|e| {
                PasskeyError::InvalidCredentialData(format!("public_key: {e}"))
            })?;
            Ok(login_credential(passkey))
        })
        .collect()
}

fn credential_id_bytes(id: &CredentialID) -> Vec<u8> {
    AsRef::<[u8]>::as_ref(id).to_vec()
}

impl PasskeyVerifier for WebauthnVerifier {
    fn start_registration(&self, identity: &PasskeyIdentity) -> Result<RegistrationStart, Error> {
        let exclude: Vec<CredentialID> = identity
            .credentials()
            .iter()
            .map(|key| CredentialID::from(key.id.clone()))
            .collect();

        let builder = self
            .core
            .new_challenge_register_builder(
                identity.user_handle().as_bytes(),
                &identity.name(),
                &identity.display_name(),
            )
            .map_err(ceremony)?
            .attestation(AttestationConveyancePreference::None)
            .credential_algorithms(COSEAlgorithm::secure_algs())
            .require_resident_key(true)
            .authenticator_attachment(Some(AuthenticatorAttachment::Platform))
            .user_verification_policy(USER_VERIFICATION)
            .reject_synchronised_authenticators(false)
            .exclude_credentials((!exclude.is_empty()).then_some(exclude))
            .extensions(Some(RequestRegistrationExtensions::default()));

        let (challenge, state) = self
            .core
            .generate_challenge_register(builder)
            .map_err(ceremony)?;

        let options: CreationOptions = public_key_options(&challenge)?;
        Ok(RegistrationStart {
            options,
            state: state_to(&state)?,
        })
    }

    fn finish_registration(
        &self,
        _identity: &PasskeyIdentity,
        response: &RegistrationResponse,
        session: &ChallengeSession,
    ) -> Result<VerifiedCredential, Error> {
        let state: RegistrationState = state_from(session)?;
        let credential: RegisterPublicKeyCredential = response_as(response)?;

        let registered = self
            .core
            .register_credential(&credential, &state, None)
            .map_err(rejected)?;

        let raw_attestation =
            decode_client_binary("attestationObject", &response.response.attestation_object)?;
        let metadata = AttestationMetadata::parse(&raw_attestation)?;

        tracing::debug!(
            format = %metadata.format,
            user_verified = registered.user_verified,
            "webauthn-rs accepted attestation"
        );

        let credential_id = credential_id_bytes(&registered.cred_id);
        let sign_count = registered.counter;
        let public_key = serde_json::to_vec(&Passkey::from(registered))
            .map_err(|e| PasskeyError::Ceremony(e.to_string()))?;

        Ok(VerifiedCredential {
            credential_id,
            public_key,
            attestation_type: metadata.format,
            aaguid: metadata.aaguid,
            sign_count,
            transports: response.transports(),
        })
    }

    fn start_authentication(
        &self,
        identity: &PasskeyIdentity,
    ) -> Result<AuthenticationStart, Error> {
        self.start_login(stored_credentials(identity)?)
    }

    fn start_discoverable_authentication(&self) -> Result<AuthenticationStart, Error> {
        self.start_login(Vec::new())
    }

    fn finish_authentication(
        &self,
        identity: &PasskeyIdentity,
        response: &AssertionResponse,
        session: &ChallengeSession,
    ) -> Result<VerifiedAssertion, Error> {
        if let Some(handle) = response.user_handle()? {
            if AccountId::from_user_handle(&handle) != Some(identity.account_id()) {
                return Err(PasskeyError::VerificationFailed(
                    "user handle does not match the credential owner".to_string(),
                )
                .into());
            }
        }

        if session.kind == CeremonyKind::Registration {
            return Err(PasskeyError::SessionNotFound.into());
        }
        let credential: PublicKeyCredential = response_as(response)?;
        let result = self.finish_login(identity, &credential, session)?;

        tracing::debug!(
            account_id = %identity.account_id(),
            counter = result.counter(),
            user_verified = result.user_verified(),
            "webauthn-rs accepted assertion"
        );

        Ok(VerifiedAssertion {
            credential_id: credential_id_bytes(result.cred_id()),
            sign_count: result.counter(),
            user_verified: result.user_verified(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
    use openid_core::{
        Account, SessionIdentity,
        protocol::{AttestationResponse, AuthenticatorAssertion},
    };

    fn verifier() -> WebauthnVerifier {
        let rp = RelyingParty::from_public_url("OpenID", "https://id.example.com").unwrap();
        WebauthnVerifier::new(&rp).unwrap()
    }

    fn identity() -> PasskeyIdentity {
        PasskeyIdentity::new(Account::new(1, "alice", "alice@example.com"), &[]).unwrap()
    }

    fn session(kind: CeremonyKind, challenge: &str, state: Value) -> ChallengeSession {
        ChallengeSession::new(
            kind,
            SessionIdentity::Account(AccountId::new(1)),
            challenge,
            state,
            chrono::Duration::minutes(5),
        )
    }

    #[test]
    fn test_registration_options() {
        let start = verifier().start_registration(&identity()).unwrap();

        assert!(!start.options.challenge.is_empty());
        assert_eq!(start.options.rp.id, "id.example.com");
        assert_eq!(start.options.rp.name, "OpenID");
        assert_eq!(start.options.user.name, "alice");
        assert_eq!(
            start.options.user.id,
            BASE64_URL_SAFE_NO_PAD.encode(AccountId::new(1).user_handle().as_bytes())
        );
        assert!(!start.options.pub_key_cred_params.is_empty());
        assert!(start.state.is_object());
    }

    #[test]
    fn test_ceremony_state_matches_advertised_user_verification() {
        let verifier = verifier();

        let registration = verifier.start_registration(&identity()).unwrap();
        let selection = registration.options.authenticator_selection.unwrap();
        assert_eq!(selection.user_verification.as_deref(), Some("preferred"));
        assert_eq!(registration.state["policy"], "preferred");

        let discoverable = verifier.start_discoverable_authentication().unwrap();
        assert_eq!(discoverable.options.user_verification.as_deref(), Some("preferred"));
        assert_eq!(discoverable.state["policy"], "preferred");
    }

    #[test]
    fn test_discoverable_options_allow_any_credential() {
        let start = verifier().start_discoverable_authentication().unwrap();

        assert!(!start.options.challenge.is_empty());
        assert_eq!(start.options.rp_id.as_deref(), Some("id.example.com"));
        assert!(start.options.allowed_ids().is_empty());
    }

    #[test]
    fn test_garbage_registration_is_rejected() {
        let verifier = verifier();
        let start = verifier.start_registration(&identity()).unwrap();
        let session = session(CeremonyKind::Registration, &start.options.challenge, start.state);

        let response = RegistrationResponse {
            id: "Y3JlZA".to_string(),
            raw_id: "Y3JlZA".to_string(),
            kind: "public-key".to_string(),
            response: AttestationResponse {
                attestation_object: BASE64_URL_SAFE_NO_PAD.encode(b"junk"),
                client_data_json: BASE64_URL_SAFE_NO_PAD.encode(b"{}"),
                transports: None,
            },
            extensions: Default::default(),
        };

        let err = verifier
            .finish_registration(&identity(), &response, &session)
            .unwrap_err();
        assert!(matches!(err, Error::Passkey(PasskeyError::VerificationFailed(_))));
    }

    #[test]
    fn test_garbage_assertion_is_rejected() {
        let verifier = verifier();
        let start = verifier.start_discoverable_authentication().unwrap();
        let session = session(
            CeremonyKind::DiscoverableLogin,
            &start.options.challenge,
            start.state,
        );

        let response = AssertionResponse {
            id: "Y3JlZA".to_string(),
            raw_id: "Y3JlZA".to_string(),
            kind: "public-key".to_string(),
            response: AuthenticatorAssertion {
                authenticator_data: BASE64_URL_SAFE_NO_PAD.encode([0u8; 37]),
                client_data_json: BASE64_URL_SAFE_NO_PAD.encode(b"{}"),
                signature: BASE64_URL_SAFE_NO_PAD.encode([0u8; 64]),
                user_handle: None,
            },
            extensions: Default::default(),
        };

        let err = verifier
            .finish_authentication(&identity(), &response, &session)
            .unwrap_err();
        assert!(matches!(err, Error::Passkey(PasskeyError::VerificationFailed(_))));
    }

    #[test]
    fn test_foreign_user_handle_is_rejected() {
        let verifier = verifier();
        let start = verifier.start_discoverable_authentication().unwrap();
        let session = session(
            CeremonyKind::DiscoverableLogin,
            &start.options.challenge,
            start.state,
        );

        let response = AssertionResponse {
            id: "Y3JlZA".to_string(),
            raw_id: "Y3JlZA".to_string(),
            kind: "public-key".to_string(),
            response: AuthenticatorAssertion {
                authenticator_data: BASE64_URL_SAFE_NO_PAD.encode([0u8; 37]),
                client_data_json: BASE64_URL_SAFE_NO_PAD.encode(b"{}"),
                signature: BASE64_URL_SAFE_NO_PAD.encode([0u8; 64]),
                user_handle: Some(
                    BASE64_URL_SAFE_NO_PAD.encode(AccountId::new(2).user_handle().as_bytes()),
                ),
            },
            extensions: Default::default(),
        };

        let err = verifier
            .finish_authentication(&identity(), &response, &session)
            .unwrap_err();
        match err {
            Error::Passkey(PasskeyError::VerificationFailed(reason)) => {
                assert!(reason.contains("user handle"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unusable_state_is_rejected() {
        let verifier = verifier();
        let session = session(CeremonyKind::Login, "abc", serde_json::json!({ "nope": 1 }));
        let response = AssertionResponse {
            id: "Y3JlZA".to_string(),
            raw_id: "Y3JlZA".to_string(),
            kind: "public-key".to_string(),
            response: AuthenticatorAssertion {
                authenticator_data: BASE64_URL_SAFE_NO_PAD.encode([0u8; 37]),
                client_data_json: BASE64_URL_SAFE_NO_PAD.encode(b"{}"),
                signature: BASE64_URL_SAFE_NO_PAD.encode([0u8; 64]),
                user_handle: None,
            },
            extensions: Default::default(),
        };

        let err = verifier
            .finish_authentication(&identity(), &response, &session)
            .unwrap_err();
        assert!(matches!(err, Error::Passkey(PasskeyError::VerificationFailed(_))));
    }
}

//! The seam between the ceremonies and a WebAuthn verification library
//!
//! Implementations build protocol options and check cryptographic responses.
//! They never touch storage: the ceremonies load and persist everything and own
//! the sign counter policy, so a verifier must not reject an assertion just
//! because its counter did not advance.
use crate::{
    ChallengeSession, Error, PasskeyIdentity,
    protocol::{AssertionResponse, CreationOptions, RegistrationResponse, RequestOptions},
};

/// Options to send to the client plus the state needed to finish the ceremony
#[derive(Debug, Clone)]
pub struct RegistrationStart {
    pub options: CreationOptions,
    pub state: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AuthenticationStart {
    pub options: RequestOptions,
    pub state: serde_json::Value,
}

/// A verified attestation, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub credential_id: Vec<u8>,
    /// Key material in whatever form this verifier needs back at login time
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub aaguid: Vec<u8>,
    pub sign_count: u32,
    pub transports: Vec<String>,
}

/// A verified assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    pub credential_id: Vec<u8>,
    /// Counter reported by the authenticator in this assertion
    pub sign_count: u32,
    pub user_verified: bool,
}

/// Response problems (challenge, origin, signature, unknown key) must be reported
/// as `PasskeyError::VerificationFailed`.
pub trait PasskeyVerifier: Send + Sync + 'static {
    fn start_registration(&self, identity: &PasskeyIdentity) -> Result<RegistrationStart, Error>;

    fn finish_registration(
        &self,
        identity: &PasskeyIdentity,
        response: &RegistrationResponse,
        session: &ChallengeSession,
    ) -> Result<VerifiedCredential, Error>;

    fn start_authentication(&self, identity: &PasskeyIdentity)
    -> Result<AuthenticationStart, Error>;

    /// Options with an empty allow list, for usernameless login
    fn start_discoverable_authentication(&self) -> Result<AuthenticationStart, Error>;

    /// Check an assertion for either login flavour; `session.kind` tells them apart
    fn finish_authentication(
        &self,
        identity: &PasskeyIdentity,
        response: &AssertionResponse,
        session: &ChallengeSession,
    ) -> Result<VerifiedAssertion, Error>;
}

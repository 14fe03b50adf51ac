//! Core of the openid passkey subsystem
//!
//! This crate contains the passwordless (WebAuthn) registration and
//! authentication ceremonies, the pending-challenge session lifecycle, credential
//! persistence traits and the sign counter bookkeeping used to spot cloned
//! authenticators.
//!
//! Storage backends implement the traits in [`repositories`]; a WebAuthn library
//! is plugged in through [`PasskeyVerifier`]. See [`PasskeyService`] for the entry
//! point request handlers call.
//!
//! Cryptographic verification of attestations and assertions is delegated to the
//! verifier. The ceremonies own session handling, identity resolution and the
//! counter policy.
pub mod account;
pub mod challenge;
pub mod config;
pub mod credential;
pub mod error;
pub mod id;
pub mod identity;
pub mod protocol;
pub mod repositories;
pub mod services;
pub mod token;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use account::{Account, AccountId, NewAccount};
pub use challenge::{CeremonyKind, ChallengeSession, SessionIdentity, SessionKey};
pub use config::{PasskeyConfig, RelyingParty};
pub use credential::{CounterCheck, CredentialSummary, NewPasskeyCredential, PasskeyCredential};
pub use error::{Error, PasskeyError, StorageError};
pub use identity::{PasskeyIdentity, RegisteredKey};
pub use services::{AuthenticationService, PasskeyService, RegistrationService};
pub use token::{JwtConfig, JwtTokenIssuer, TokenIssuer};
pub use verifier::PasskeyVerifier;

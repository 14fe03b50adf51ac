//! Service layer for the passkey ceremonies
//!
//! [`RegistrationService`] enrols new authenticators, [`AuthenticationService`]
//! runs targeted and discoverable logins, and [`PasskeyService`] puts both behind
//! the single entry point request handlers use.

pub mod authentication;
pub mod passkey;
pub mod registration;

pub use authentication::AuthenticationService;
pub use passkey::PasskeyService;
pub use registration::RegistrationService;

use crate::{
    ChallengeSession, Error, SessionKey, challenge::CeremonyKind, error::PasskeyError,
    protocol::decode_client_binary, repositories::ChallengeStore,
};

/// Load the pending session a complete step answers.
///
/// Missing, expired and wrong-kind sessions all surface as `SessionNotFound`, and
/// so does a response signed over a different challenge: a later begin replaced
/// the session that response was made for.
async fn load_session<S: ChallengeStore + ?Sized>(
    store: &S,
    key: &SessionKey,
    kind: CeremonyKind,
    client_challenge: &str,
) -> Result<ChallengeSession, Error> {
    let session = match store.get(key).await? {
        Some(session) if session.kind == kind && !session.is_expired() => session,
        _ => {
            tracing::debug!(key = %key, "No pending passkey session");
            return Err(PasskeyError::SessionNotFound.into());
        }
    };

    if !same_challenge(&session.challenge, client_challenge) {
        tracing::debug!(key = %key, "Response answers a superseded passkey session");
        return Err(PasskeyError::SessionNotFound.into());
    }
    Ok(session)
}

/// Compare challenges by their bytes so padding or alphabet differences in the
/// client's encoding do not matter.
fn same_challenge(stored: &str, client: &str) -> bool {
    if stored == client {
        return true;
    }
    match (
        decode_client_binary("challenge", stored),
        decode_client_binary("challenge", client),
    ) {
        (Ok(stored), Ok(client)) => stored == client,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountId, SessionIdentity, repositories::InMemoryChallengeStore};
    use chrono::Duration;

    #[test]
    fn test_same_challenge_ignores_encoding() {
        assert!(same_challenge("-_8", "-_8"));
        assert!(same_challenge("-_8", "+/8="));
        assert!(same_challenge("AQI", "AQI="));
        assert!(!same_challenge("AQI", "AQM"));
        assert!(!same_challenge("AQI", "not base64!"));
    }

    #[tokio::test]
    async fn test_load_session_rejects_other_challenge() {
        let store = InMemoryChallengeStore::new();
        let key = SessionKey::login(&AccountId::new(1));
        let session = ChallengeSession::new(
            CeremonyKind::Login,
            SessionIdentity::Account(AccountId::new(1)),
            "AQI",
            serde_json::Value::Null,
            Duration::minutes(5),
        );
        store.set(&key, &session, Duration::minutes(5)).await.unwrap();

        let loaded = load_session(&store, &key, CeremonyKind::Login, "AQI")
            .await
            .unwrap();
        assert_eq!(loaded, session);

        let err = load_session(&store, &key, CeremonyKind::Login, "AQM")
            .await
            .unwrap_err();
        assert!(err.is_session_not_found());

        let err = load_session(&store, &key, CeremonyKind::Registration, "AQI")
            .await
            .unwrap_err();
        assert!(err.is_session_not_found());

        // A rejected response leaves the pending session in place
        assert_eq!(store.len(), 1);
    }
}

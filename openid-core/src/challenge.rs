//! Pending ceremony state
//!
//! Every begin step writes one [`ChallengeSession`] under a [`SessionKey`]; the
//! matching complete step reads it back and deletes it once the credential write
//! has succeeded. Targeted ceremonies are keyed by account id, discoverable
//! logins by the challenge itself because no account is known yet.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, credential::encode_binary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    Registration,
    Login,
    DiscoverableLogin,
}

impl CeremonyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CeremonyKind::Registration => "register",
            CeremonyKind::Login => "login",
            CeremonyKind::DiscoverableLogin => "discoverable",
        }
    }
}

/// Key under which a pending session is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn registration(account_id: &AccountId) -> Self {
        Self::for_account(CeremonyKind::Registration, account_id)
    }

    pub fn login(account_id: &AccountId) -> Self {
        Self::for_account(CeremonyKind::Login, account_id)
    }

    pub fn discoverable(challenge: &str) -> Self {
        SessionKey(format!(
            "passkey:{}:{challenge}",
            CeremonyKind::DiscoverableLogin.as_str()
        ))
    }

    fn for_account(kind: CeremonyKind, account_id: &AccountId) -> Self {
        SessionKey(format!("passkey:{}:{account_id}", kind.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a pending session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum SessionIdentity {
    Account(AccountId),
    /// Discoverable login: identity is resolved from the assertion later
    Challenge(String),
}

/// State of an in-flight ceremony
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSession {
    pub kind: CeremonyKind,
    pub identity: SessionIdentity,
    /// Base64url challenge sent to the client
    pub challenge: String,
    /// Base64url credential ids the client may answer with; empty means any
    #[serde(default)]
    pub allowed_credentials: Vec<String>,
    /// Verifier-specific ceremony state
    pub state: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeSession {
    pub fn new(
        kind: CeremonyKind,
        identity: SessionIdentity,
        challenge: impl Into<String>,
        state: serde_json::Value,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            kind,
            identity,
            challenge: challenge.into(),
            allowed_credentials: Vec::new(),
            state,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn with_allowed_credentials(mut self, allowed: Vec<String>) -> Self {
        self.allowed_credentials = allowed;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn allows(&self, raw_credential_id: &[u8]) -> bool {
        if self.allowed_credentials.is_empty() {
            return true;
        }
        let encoded = encode_binary(raw_credential_id);
        self.allowed_credentials.iter().any(|c| *c == encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_namespaces() {
        let id = AccountId::new(7);
        assert_eq!(SessionKey::registration(&id).as_str(), "passkey:register:7");
        assert_eq!(SessionKey::login(&id).as_str(), "passkey:login:7");
        assert_eq!(
            SessionKey::discoverable("abc").as_str(),
            "passkey:discoverable:abc"
        );
        // A challenge that looks like an account id never collides with a targeted key
        assert_ne!(SessionKey::discoverable("7"), SessionKey::login(&id));
    }

    #[test]
    fn test_allow_list() {
        let session = ChallengeSession::new(
            CeremonyKind::Login,
            SessionIdentity::Account(AccountId::new(1)),
            "c",
            serde_json::Value::Null,
            Duration::minutes(5),
        );
        assert!(session.allows(b"anything"));

        let session = session.with_allowed_credentials(vec![encode_binary(b"cred-1")]);
        assert!(session.allows(b"cred-1"));
        assert!(!session.allows(b"cred-2"));
    }

    #[test]
    fn test_expiry() {
        let session = ChallengeSession::new(
            CeremonyKind::Registration,
            SessionIdentity::Account(AccountId::new(1)),
            "c",
            serde_json::Value::Null,
            Duration::minutes(5),
        );
        assert!(!session.is_expired());

        let expired = ChallengeSession::new(
            CeremonyKind::Registration,
            SessionIdentity::Account(AccountId::new(1)),
            "c",
            serde_json::Value::Null,
            Duration::seconds(-1),
        );
        assert!(expired.is_expired());
    }

    #[test]
    fn test_session_serializes() {
        let session = ChallengeSession::new(
            CeremonyKind::DiscoverableLogin,
            SessionIdentity::Challenge("abc".to_string()),
            "abc",
            serde_json::json!({"k": 1}),
            Duration::minutes(5),
        );
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"discoverable_login\""));
        let back: ChallengeSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}

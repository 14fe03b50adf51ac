//! Accounts as seen by the passkey subsystem
//!
//! Accounts are owned by the surrounding account management service. The passkey
//! ceremonies only need to read the handful of fields below:
//!
//! | Field      | Type        | Description                                   |
//! | ---------- | ----------- | --------------------------------------------- |
//! | `id`       | `AccountId` | Numeric primary key of the account.           |
//! | `username` | `String`    | Login name, used as the credential user name. |
//! | `email`    | `String`    | Preferred display name when present.          |
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numeric identifier of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        AccountId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// The opaque user handle bound into every credential created for this account.
    ///
    /// The high half of the UUID is always zero and the low half is the account id,
    /// so the handle round-trips through [`AccountId::from_user_handle`].
    pub fn user_handle(&self) -> Uuid {
        Uuid::from_u64_pair(0, self.0 as u64)
    }

    /// Recover an account id from a user handle returned by an authenticator.
    ///
    /// Accepts the 16 byte handle produced by [`AccountId::user_handle`] as well as
    /// a decimal account id string, which older registrations carry.
    pub fn from_user_handle(handle: &[u8]) -> Option<Self> {
        if let Ok(uuid) = Uuid::from_slice(handle) {
            let (high, low) = uuid.as_u64_pair();
            if high == 0 {
                return i64::try_from(low).ok().filter(|id| *id > 0).map(AccountId);
            }
        }

        std::str::from_utf8(handle)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(AccountId)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        AccountId(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
        }
    }

    /// Name shown by authenticators: the username, or the id when the username is blank
    pub fn credential_name(&self) -> String {
        if self.username.trim().is_empty() {
            self.id.to_string()
        } else {
            self.username.clone()
        }
    }

    /// Display name shown by authenticators: the email, falling back to [`Account::credential_name`]
    pub fn display_name(&self) -> String {
        if self.email.trim().is_empty() {
            self.credential_name()
        } else {
            self.email.clone()
        }
    }
}

/// Input for seeding an account into a backend
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
}

impl NewAccount {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_handle_round_trip() {
        let id = AccountId::new(42);
        let handle = id.user_handle();
        assert_eq!(AccountId::from_user_handle(handle.as_bytes()), Some(id));
    }

    #[test]
    fn test_legacy_decimal_user_handle() {
        assert_eq!(AccountId::from_user_handle(b"17"), Some(AccountId::new(17)));
        assert_eq!(AccountId::from_user_handle(b"abc"), None);
        assert_eq!(AccountId::from_user_handle(b"0"), None);
        assert_eq!(AccountId::from_user_handle(b"-3"), None);
        // 16 ASCII digits are also a valid UUID byte length
        assert_eq!(
            AccountId::from_user_handle(b"1000000000000001"),
            Some(AccountId::new(1_000_000_000_000_001))
        );
    }

    #[test]
    fn test_foreign_uuid_handle_is_rejected() {
        let foreign = Uuid::from_u64_pair(7, 1);
        assert_eq!(AccountId::from_user_handle(foreign.as_bytes()), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let account = Account::new(1, "alice", "alice@example.com");
        assert_eq!(account.credential_name(), "alice");
        assert_eq!(account.display_name(), "alice@example.com");

        let account = Account::new(2, "bob", "");
        assert_eq!(account.display_name(), "bob");

        let account = Account::new(3, " ", "");
        assert_eq!(account.credential_name(), "3");
        assert_eq!(account.display_name(), "3");
    }
}

use async_trait::async_trait;

use crate::{AccountId, Error, NewPasskeyCredential, PasskeyCredential};

/// Bookkeeping written after a successful assertion
#[derive(Debug, Clone)]
pub struct PasskeyUsage {
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub clone_warning: bool,
}

/// Persistence of passkey credentials
///
/// `(account_id, credential_id)` is unique and `credential_id` is unique across all
/// accounts. Writes must be single-row atomic operations keyed by that pair.
#[async_trait]
pub trait PasskeyRepository: Send + Sync + 'static {
    /// All credentials of an account, oldest first
    async fn list_by_account(&self, account_id: &AccountId)
    -> Result<Vec<PasskeyCredential>, Error>;

    /// Insert a credential, or refresh its metadata when the account already owns it.
    ///
    /// A recorded clone warning is never cleared and the stored sign counter never
    /// goes down. A credential id owned by another account is a constraint violation.
    async fn upsert(
        &self,
        account_id: &AccountId,
        credential: NewPasskeyCredential,
    ) -> Result<PasskeyCredential, Error>;

    /// Record a successful login and stamp `last_used_at`.
    ///
    /// Fails with `PasskeyError::CredentialNotFound` if the account does not own the credential.
    async fn update_after_auth(
        &self,
        account_id: &AccountId,
        credential_id: &str,
        usage: PasskeyUsage,
    ) -> Result<PasskeyCredential, Error>;

    /// Owner lookup for discoverable logins that carry no usable user handle
    async fn find_owner_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<(AccountId, PasskeyCredential)>, Error>;

    /// Delete a credential owned by the account.
    ///
    /// Fails with `PasskeyError::CredentialNotFound`, leaving storage untouched, when
    /// the account does not own the credential.
    async fn delete(&self, account_id: &AccountId, credential_id: &str) -> Result<(), Error>;
}

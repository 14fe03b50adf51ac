use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    Account, AccountId, ChallengeSession, Error, NewPasskeyCredential, PasskeyCredential,
    SessionKey,
    repositories::{
        AccountRepository, ChallengeStore, PasskeyRepository, PasskeyUsage, RepositoryProvider,
    },
};

/// Adapter that wraps a RepositoryProvider and exposes its account repository
pub struct AccountRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AccountRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AccountRepository for AccountRepositoryAdapter<R> {
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_id(id).await
    }
}

pub struct PasskeyRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> PasskeyRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> PasskeyRepository for PasskeyRepositoryAdapter<R> {
    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<PasskeyCredential>, Error> {
        self.provider.passkey().list_by_account(account_id).await
    }

    async fn upsert(
        &self,
        account_id: &AccountId,
        credential: NewPasskeyCredential,
    ) -> Result<PasskeyCredential, Error> {
        self.provider.passkey().upsert(account_id, credential).await
    }

    async fn update_after_auth(
        &self,
        account_id: &AccountId,
        credential_id: &str,
        usage: PasskeyUsage,
    ) -> Result<PasskeyCredential, Error> {
        self.provider
            .passkey()
            .update_after_auth(account_id, credential_id, usage)
            .await
    }

    async fn find_owner_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<(AccountId, PasskeyCredential)>, Error> {
        self.provider
            .passkey()
            .find_owner_by_credential_id(credential_id)
            .await
    }

    async fn delete(&self, account_id: &AccountId, credential_id: &str) -> Result<(), Error> {
        self.provider.passkey().delete(account_id, credential_id).await
    }
}

pub struct ChallengeStoreAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> ChallengeStoreAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> ChallengeStore for ChallengeStoreAdapter<R> {
    async fn set(
        &self,
        key: &SessionKey,
        session: &ChallengeSession,
        ttl: Duration,
    ) -> Result<(), Error> {
        self.provider.challenge().set(key, session, ttl).await
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<ChallengeSession>, Error> {
        self.provider.challenge().get(key).await
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), Error> {
        self.provider.challenge().delete(key).await
    }
}

//! In-process backends built on `DashMap`
//!
//! Useful for tests and single-node deployments. Every write touches exactly one
//! map entry under its shard lock, which keeps upserts atomic per credential id.
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Account, AccountId, ChallengeSession, Error, NewAccount, NewPasskeyCredential,
    PasskeyCredential, SessionKey,
    credential::normalize_transports,
    error::{PasskeyError, StorageError},
    repositories::{
        AccountRepository, AccountRepositoryProvider, ChallengeStore, ChallengeStoreProvider,
        PasskeyRepository, PasskeyRepositoryProvider, PasskeyUsage, RepositoryProvider,
    },
};

#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: DashMap<AccountId, Account>,
    next_id: AtomicI64,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, account: NewAccount) -> Account {
        let id = AccountId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let account = Account::new(id, account.username, account.email);
        self.accounts.insert(id, account.clone());
        account
    }

    /// Insert an account with a caller-chosen id, replacing any existing one
    pub fn insert(&self, account: Account) {
        self.next_id.fetch_max(account.id.as_i64(), Ordering::SeqCst);
        self.accounts.insert(account.id, account);
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        Ok(self.accounts.get(id).map(|a| a.value().clone()))
    }
}

/// Credentials keyed by their base64url credential id
#[derive(Debug, Default)]
pub struct InMemoryPasskeyRepository {
    credentials: DashMap<String, PasskeyCredential>,
    next_id: AtomicI64,
}

impl InMemoryPasskeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasskeyRepository for InMemoryPasskeyRepository {
    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<PasskeyCredential>, Error> {
        let mut credentials: Vec<PasskeyCredential> = self
            .credentials
            .iter()
            .filter(|c| c.account_id == *account_id)
            .map(|c| c.value().clone())
            .collect();
        credentials.sort_by_key(|c| (c.created_at, c.id));
        Ok(credentials)
    }

    async fn upsert(
        &self,
        account_id: &AccountId,
        credential: NewPasskeyCredential,
    ) -> Result<PasskeyCredential, Error> {
        let now = Utc::now();
        let key = credential.encoded_credential_id();
        let public_key = credential.encoded_public_key();
        let aaguid = credential.encoded_aaguid();

        match self.credentials.entry(key) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if existing.account_id != *account_id {
                    return Err(StorageError::Constraint(
                        "credential_id is registered to another account".to_string(),
                    )
                    .into());
                }
                existing.public_key = public_key;
                existing.attestation_type = credential.attestation_type;
                existing.aaguid = aaguid;
                existing.sign_count = existing.sign_count.max(credential.sign_count);
                existing.transports = normalize_transports(credential.transports);
                if credential.remark.is_some() {
                    existing.remark = credential.remark;
                }
                existing.updated_at = now;
                Ok(existing.clone())
            }
            Entry::Vacant(entry) => {
                let record = PasskeyCredential {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    account_id: *account_id,
                    credential_id: entry.key().clone(),
                    public_key,
                    attestation_type: credential.attestation_type,
                    aaguid,
                    sign_count: credential.sign_count,
                    transports: normalize_transports(credential.transports),
                    clone_warning: false,
                    remark: credential.remark,
                    created_at: now,
                    updated_at: now,
                    last_used_at: None,
                };
                entry.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn update_after_auth(
        &self,
        account_id: &AccountId,
        credential_id: &str,
        usage: PasskeyUsage,
    ) -> Result<PasskeyCredential, Error> {
        let mut entry = self
            .credentials
            .get_mut(credential_id)
            .filter(|c| c.account_id == *account_id)
            .ok_or(PasskeyError::CredentialNotFound)?;

        let now = Utc::now();
        entry.sign_count = usage.sign_count;
        entry.clone_warning = usage.clone_warning;
        entry.transports = normalize_transports(usage.transports);
        entry.last_used_at = Some(now);
        entry.updated_at = now;
        Ok(entry.clone())
    }

    async fn find_owner_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<(AccountId, PasskeyCredential)>, Error> {
        Ok(self
            .credentials
            .get(credential_id)
            .map(|c| (c.account_id, c.value().clone())))
    }

    async fn delete(&self, account_id: &AccountId, credential_id: &str) -> Result<(), Error> {
        self.credentials
            .remove_if(credential_id, |_, c| c.account_id == *account_id)
            .map(|_| ())
            .ok_or_else(|| PasskeyError::CredentialNotFound.into())
    }
}

/// Pending sessions with a per-entry deadline
#[derive(Debug, Default)]
pub struct InMemoryChallengeStore {
    sessions: DashMap<String, (ChallengeSession, DateTime<Utc>)>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, (_, deadline)| *deadline > now);
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn set(
        &self,
        key: &SessionKey,
        session: &ChallengeSession,
        ttl: Duration,
    ) -> Result<(), Error> {
        self.sessions
            .insert(key.to_string(), (session.clone(), Utc::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<ChallengeSession>, Error> {
        let now = Utc::now();
        let found = self.sessions.get(key.as_str()).map(|e| e.value().clone());

        match found {
            Some((session, deadline)) if deadline > now => Ok(Some(session)),
            Some(_) => {
                self.sessions
                    .remove_if(key.as_str(), |_, (_, deadline)| *deadline <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), Error> {
        self.sessions.remove(key.as_str());
        Ok(())
    }
}

/// All in-memory backends behind one [`RepositoryProvider`]
#[derive(Debug, Default)]
pub struct InMemoryRepositoryProvider {
    account: InMemoryAccountRepository,
    passkey: InMemoryPasskeyRepository,
    challenge: InMemoryChallengeStore,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepositoryProvider for InMemoryRepositoryProvider {
    type AccountRepo = InMemoryAccountRepository;

    fn account(&self) -> &Self::AccountRepo {
        &self.account
    }
}

impl PasskeyRepositoryProvider for InMemoryRepositoryProvider {
    type PasskeyRepo = InMemoryPasskeyRepository;

    fn passkey(&self) -> &Self::PasskeyRepo {
        &self.passkey
    }
}

impl ChallengeStoreProvider for InMemoryRepositoryProvider {
    type ChallengeStore = InMemoryChallengeStore;

    fn challenge(&self) -> &Self::ChallengeStore {
        &self.challenge
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

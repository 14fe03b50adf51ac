//! SQLite backend for the openid passkey repositories
//!
//! ```rust,ignore
//! let provider = SqliteRepositoryProvider::connect("sqlite://openid.db").await?;
//! provider.migrate().await?;
//! ```
pub mod migrations;
pub mod repositories;

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use openid_core::{
    Error,
    error::StorageError,
    map_connection_err,
    repositories::{
        AccountRepositoryProvider, ChallengeStoreProvider, PasskeyRepositoryProvider,
        RepositoryProvider,
    },
};
use openid_migration::MigrationManager;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub use repositories::{SqliteAccountRepository, SqliteChallengeStore, SqlitePasskeyRepository};

/// Repository provider implementation for SQLite
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    account: Arc<SqliteAccountRepository>,
    passkey: Arc<SqlitePasskeyRepository>,
    challenge: Arc<SqliteChallengeStore>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let account = Arc::new(SqliteAccountRepository::new(pool.clone()));
        let passkey = Arc::new(SqlitePasskeyRepository::new(pool.clone()));
        let challenge = Arc::new(SqliteChallengeStore::new(pool.clone()));

        Self {
            pool,
            account,
            passkey,
            challenge,
        }
    }

    /// Open a pool for `url`, creating the database file when it does not exist
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = map_connection_err!(SqliteConnectOptions::from_str(url))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = map_connection_err!(
            SqlitePoolOptions::new().connect_with(options).await
        )?;

        tracing::debug!(url = %url, "Connected to SQLite");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl AccountRepositoryProvider for SqliteRepositoryProvider {
    type AccountRepo = SqliteAccountRepository;

    fn account(&self) -> &Self::AccountRepo {
        &self.account
    }
}

impl PasskeyRepositoryProvider for SqliteRepositoryProvider {
    type PasskeyRepo = SqlitePasskeyRepository;

    fn passkey(&self) -> &Self::PasskeyRepo {
        &self.passkey
    }
}

impl ChallengeStoreProvider for SqliteRepositoryProvider {
    type ChallengeStore = SqliteChallengeStore;

    fn challenge(&self) -> &Self::ChallengeStore {
        &self.challenge
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        use crate::migrations::{SqliteMigrationManager, all_migrations};

        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&all_migrations()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(format!(
                "Failed to run migrations: {e}"
            )))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}

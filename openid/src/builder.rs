//! Builder for [`OpenId`] instances
//!
//! Storage is tracked in the builder's type so an instance cannot be built before
//! a backend has been chosen.
//!
//! ```rust,no_run
//! use openid::{JwtConfig, OpenIdBuilder, PasskeyConfig, RelyingParty};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relying_party = RelyingParty::from_public_url("OpenID", "https://id.example.com")?;
//! let openid = OpenIdBuilder::new(PasskeyConfig::new(relying_party))
//!     .with_sqlite("sqlite::memory:")
//!     .await?
//!     .with_jwt(JwtConfig::new_hs256(b"change-me".to_vec()))
//!     .apply_migrations(true)
//!     .build_webauthn()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use openid_core::{
    JwtConfig, JwtTokenIssuer, PasskeyConfig, PasskeyVerifier, TokenIssuer,
    repositories::{ChallengeStore, ChallengeStoreAdapter, RepositoryProvider},
};

use crate::OpenId;

/// Errors that can occur when building an [`OpenId`] instance
#[derive(Debug, thiserror::Error)]
pub enum OpenIdBuilderError {
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// No storage has been configured yet
pub struct NoStorage;

/// Storage has been configured
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

pub struct OpenIdBuilder<Storage> {
    storage: Storage,
    config: PasskeyConfig,
    challenges: Option<Arc<dyn ChallengeStore>>,
    token_issuer: Option<Arc<dyn TokenIssuer>>,
    apply_migrations: bool,
}

impl OpenIdBuilder<NoStorage> {
    pub fn new(config: PasskeyConfig) -> Self {
        Self {
            storage: NoStorage,
            config,
            challenges: None,
            token_issuer: None,
            apply_migrations: false,
        }
    }

    /// Use an already constructed repository provider
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> OpenIdBuilder<WithStorage<R>> {
        OpenIdBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            challenges: self.challenges,
            token_issuer: self.token_issuer,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl OpenIdBuilder<NoStorage> {
    /// Connect to the SQLite database at `url`, e.g. `sqlite://openid.db`
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<OpenIdBuilder<WithStorage<crate::SqliteRepositoryProvider>>, OpenIdBuilderError>
    {
        let repositories = crate::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| OpenIdBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(repositories)))
    }
}

impl<R: RepositoryProvider> OpenIdBuilder<WithStorage<R>> {
    /// Keep pending ceremony sessions somewhere other than the repository provider.
    ///
    /// Defaults to the provider's own challenge store.
    pub fn with_challenge_store(mut self, challenges: Arc<dyn ChallengeStore>) -> Self {
        self.challenges = Some(challenges);
        self
    }

    pub fn with_token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.token_issuer = Some(issuer);
        self
    }

    /// Issue signed JWTs after passkey logins
    pub fn with_jwt(self, config: JwtConfig) -> Self {
        self.with_token_issuer(Arc::new(JwtTokenIssuer::new(config)))
    }

    /// Run migrations as part of [`OpenIdBuilder::build`]. Off by default.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    pub async fn build<V: PasskeyVerifier>(self, verifier: V) -> Result<OpenId<R, V>, OpenIdBuilderError> {
        let repositories = self.storage.repositories;

        if self.apply_migrations {
            repositories
                .migrate()
                .await
                .map_err(|e| OpenIdBuilderError::Migration(e.to_string()))?;
        }

        let challenges: Arc<dyn ChallengeStore> = match self.challenges {
            Some(challenges) => challenges,
            None => Arc::new(ChallengeStoreAdapter::new(repositories.clone())),
        };

        Ok(OpenId::from_parts(
            repositories,
            challenges,
            Arc::new(verifier),
            self.config,
            self.token_issuer,
        ))
    }

    /// Build with a webauthn-rs verifier for the configured relying party
    #[cfg(feature = "webauthn")]
    pub async fn build_webauthn(
        self,
    ) -> Result<OpenId<R, crate::WebauthnVerifier>, OpenIdBuilderError> {
        let verifier = crate::WebauthnVerifier::new(&self.config.relying_party)
            .map_err(|e| OpenIdBuilderError::InvalidConfiguration(e.to_string()))?;
        self.build(verifier).await
    }
}

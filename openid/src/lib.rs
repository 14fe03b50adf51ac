//! # OpenID passkeys
//!
//! Passwordless sign-in for the OpenID account service. This crate wires a storage
//! backend, a pending-challenge store, a WebAuthn verifier and a token issuer into a
//! single [`OpenId`] value that request handlers call into.
//!
//! ## Storage Support
//!
//! - SQLite (`sqlite` feature, on by default)
//! - Redis for pending challenges only (`redis` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use openid::{OpenIdBuilder, PasskeyConfig, RelyingParty};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let relying_party = RelyingParty::from_public_url("OpenID", "https://id.example.com")?;
//!
//! let openid = OpenIdBuilder::new(PasskeyConfig::new(relying_party))
//!     .with_sqlite("sqlite://openid.db")
//!     .await?
//!     .apply_migrations(true)
//!     .build_webauthn()
//!     .await?;
//!
//! let options = openid.begin_discoverable_login().await?;
//! # Ok(())
//! # }
//! ```
mod builder;

use std::sync::Arc;

use openid_core::{
    error::AuthError,
    protocol::{AssertionResponse, CreationOptions, RegistrationResponse, RequestOptions},
    repositories::{
        AccountRepository, AccountRepositoryAdapter, AccountRepositoryProvider, ChallengeStore,
        PasskeyRepositoryAdapter, RepositoryProvider,
    },
};

pub use builder::{NoStorage, OpenIdBuilder, OpenIdBuilderError, WithStorage};

/// Re-export core types from openid_core
pub use openid_core::{
    Account, AccountId, CredentialSummary, JwtConfig, JwtTokenIssuer, PasskeyConfig,
    PasskeyCredential, PasskeyError, PasskeyService, PasskeyVerifier, RelyingParty, TokenIssuer,
};

#[cfg(feature = "sqlite")]
pub use openid_storage_sqlite::SqliteRepositoryProvider;

#[cfg(feature = "redis")]
pub use openid_storage_redis::RedisChallengeStore;

#[cfg(feature = "webauthn")]
pub use openid_auth_passkey::WebauthnVerifier;

/// Errors that can occur when using [`OpenId`]
#[derive(Debug, thiserror::Error)]
pub enum OpenIdError {
    #[error(transparent)]
    Core(#[from] openid_core::Error),

    /// `login_with_passkey` was called without a configured token issuer
    #[error("No token issuer configured")]
    TokenIssuerMissing,
}

impl OpenIdError {
    /// True when the client must restart the ceremony from its begin step
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, OpenIdError::Core(e) if e.is_session_not_found())
    }
}

type Passkeys<R, V> =
    PasskeyService<AccountRepositoryAdapter<R>, PasskeyRepositoryAdapter<R>, dyn ChallengeStore, V>;

/// The passkey front door of the account service.
///
/// Construct one with [`OpenIdBuilder`]. Accounts are looked up by id so request
/// handlers can pass the id they already hold from the caller's session.
pub struct OpenId<R: RepositoryProvider, V: PasskeyVerifier> {
    repositories: Arc<R>,
    passkeys: Passkeys<R, V>,
    token_issuer: Option<Arc<dyn TokenIssuer>>,
}

impl<R: RepositoryProvider, V: PasskeyVerifier> OpenId<R, V> {
    pub(crate) fn from_parts(
        repositories: Arc<R>,
        challenges: Arc<dyn ChallengeStore>,
        verifier: Arc<V>,
        config: PasskeyConfig,
        token_issuer: Option<Arc<dyn TokenIssuer>>,
    ) -> Self {
        let passkeys = PasskeyService::new(
            Arc::new(AccountRepositoryAdapter::new(repositories.clone())),
            Arc::new(PasskeyRepositoryAdapter::new(repositories.clone())),
            challenges,
            verifier,
            config,
        );

        Self {
            repositories,
            passkeys,
            token_issuer,
        }
    }

    /// Bring the storage schema up to date
    pub async fn migrate(&self) -> Result<(), OpenIdError> {
        self.repositories.migrate().await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), OpenIdError> {
        self.repositories.health_check().await?;
        Ok(())
    }

    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    /// Direct access to the ceremonies for callers that already hold an [`Account`]
    pub fn passkey_service(&self) -> &Passkeys<R, V> {
        &self.passkeys
    }

    pub async fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>, OpenIdError> {
        Ok(self.repositories.account().find_by_id(account_id).await?)
    }

    async fn require_account(&self, account_id: &AccountId) -> Result<Account, OpenIdError> {
        self.get_account(account_id)
            .await?
            .ok_or_else(|| openid_core::Error::from(AuthError::AccountNotFound).into())
    }

    pub async fn begin_registration(
        &self,
        account_id: &AccountId,
    ) -> Result<CreationOptions, OpenIdError> {
        let account = self.require_account(account_id).await?;
        Ok(self.passkeys.begin_registration(&account).await?)
    }

    pub async fn complete_registration(
        &self,
        account_id: &AccountId,
        response: &RegistrationResponse,
        remark: Option<&str>,
    ) -> Result<PasskeyCredential, OpenIdError> {
        let account = self.require_account(account_id).await?;
        Ok(self
            .passkeys
            .complete_registration(&account, response, remark)
            .await?)
    }

    pub async fn begin_targeted_login(
        &self,
        account_id: &AccountId,
    ) -> Result<RequestOptions, OpenIdError> {
        let account = self.require_account(account_id).await?;
        Ok(self.passkeys.begin_login_targeted(&account).await?)
    }

    pub async fn complete_targeted_login(
        &self,
        account_id: &AccountId,
        response: &AssertionResponse,
    ) -> Result<PasskeyCredential, OpenIdError> {
        let account = self.require_account(account_id).await?;
        Ok(self.passkeys.complete_login_targeted(&account, response).await?)
    }

    pub async fn begin_discoverable_login(&self) -> Result<RequestOptions, OpenIdError> {
        Ok(self.passkeys.begin_login_discoverable().await?)
    }

    pub async fn complete_discoverable_login(
        &self,
        response: &AssertionResponse,
    ) -> Result<(Account, PasskeyCredential), OpenIdError> {
        Ok(self.passkeys.complete_login_discoverable(response).await?)
    }

    /// Finish a usernameless login and issue an access token for the resolved account.
    ///
    /// Fails with [`OpenIdError::TokenIssuerMissing`] before touching the pending
    /// session when no issuer was configured.
    pub async fn login_with_passkey(
        &self,
        response: &AssertionResponse,
        client_ip: Option<&str>,
    ) -> Result<(Account, PasskeyCredential, String), OpenIdError> {
        let issuer = self
            .token_issuer
            .as_ref()
            .ok_or(OpenIdError::TokenIssuerMissing)?;

        let (account, credential) = self.passkeys.complete_login_discoverable(response).await?;
        let token = issuer.issue(&account, client_ip).await?;

        tracing::info!(account_id = %account.id, "Issued token after passkey login");
        Ok((account, credential, token))
    }

    pub async fn list_passkeys(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<CredentialSummary>, OpenIdError> {
        let account = self.require_account(account_id).await?;
        Ok(self.passkeys.list_credentials(&account).await?)
    }

    pub async fn delete_passkey(
        &self,
        account_id: &AccountId,
        credential_id: &str,
    ) -> Result<(), OpenIdError> {
        let account = self.require_account(account_id).await?;
        Ok(self.passkeys.delete_credential(&account, credential_id).await?)
    }
}

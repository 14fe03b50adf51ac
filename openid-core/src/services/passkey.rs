use std::sync::Arc;

use crate::{
    Account, CredentialSummary, Error, PasskeyConfig, PasskeyCredential,
    protocol::{AssertionResponse, CreationOptions, RegistrationResponse, RequestOptions},
    repositories::{AccountRepository, ChallengeStore, PasskeyRepository},
    services::{AuthenticationService, RegistrationService},
    verifier::PasskeyVerifier,
};

/// Entry point for passkey registration, login and credential management
pub struct PasskeyService<
    A: AccountRepository,
    P: PasskeyRepository,
    S: ChallengeStore + ?Sized,
    V: PasskeyVerifier,
> {
    passkeys: Arc<P>,
    registration: RegistrationService<P, S, V>,
    authentication: AuthenticationService<A, P, S, V>,
}

impl<A: AccountRepository, P: PasskeyRepository, S: ChallengeStore + ?Sized, V: PasskeyVerifier>
    PasskeyService<A, P, S, V>
{
    /// Create a new PasskeyService sharing one configuration between both ceremonies
    pub fn new(
        accounts: Arc<A>,
        passkeys: Arc<P>,
        challenges: Arc<S>,
        verifier: Arc<V>,
        config: PasskeyConfig,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            registration: RegistrationService::new(
                passkeys.clone(),
                challenges.clone(),
                verifier.clone(),
                config.clone(),
            ),
            authentication: AuthenticationService::new(
                accounts, passkeys.clone(), challenges, verifier, config,
            ),
            passkeys,
        }
    }

    pub async fn begin_registration(&self, account: &Account) -> Result<CreationOptions, Error> {
        self.registration.begin(account).await
    }

    pub async fn complete_registration(
        &self,
        account: &Account,
        response: &RegistrationResponse,
        remark: Option<&str>,
    ) -> Result<PasskeyCredential, Error> {
        self.registration.complete(account, response, remark).await
    }

    pub async fn begin_login_targeted(&self, account: &Account) -> Result<RequestOptions, Error> {
        self.authentication.begin_targeted(account).await
    }

    pub async fn begin_login_discoverable(&self) -> Result<RequestOptions, Error> {
        self.authentication.begin_discoverable().await
    }

    pub async fn complete_login_targeted(
        &self,
        account: &Account,
        response: &AssertionResponse,
    ) -> Result<PasskeyCredential, Error> {
        self.authentication.complete_targeted(account, response).await
    }

    pub async fn complete_login_discoverable(
        &self,
        response: &AssertionResponse,
    ) -> Result<(Account, PasskeyCredential), Error> {
        self.authentication.complete_discoverable(response).await
    }

    /// Get all passkeys of an account
    pub async fn list_credentials(&self, account: &Account) -> Result<Vec<CredentialSummary>, Error> {
        let credentials = self.passkeys.list_by_account(&account.id).await?;
        Ok(credentials.iter().map(PasskeyCredential::summary).collect())
    }

    /// Delete one of the account's passkeys by its base64url credential id
    pub async fn delete_credential(&self, account: &Account, credential_id: &str) -> Result<(), Error> {
        self.passkeys.delete(&account.id, credential_id).await?;
        tracing::info!(
            account_id = %account.id,
            credential_id = %credential_id,
            "Deleted passkey"
        );
        Ok(())
    }
}

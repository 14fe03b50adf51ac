use std::sync::Arc;

use crate::{
    Account, AccountId, ChallengeSession, CounterCheck, Error, PasskeyConfig, PasskeyCredential,
    PasskeyIdentity, SessionKey,
    challenge::{CeremonyKind, SessionIdentity},
    credential::encode_binary,
    error::PasskeyError,
    protocol::{AssertionResponse, RequestOptions, USER_VERIFICATION_PREFERRED},
    repositories::{AccountRepository, ChallengeStore, PasskeyRepository, PasskeyUsage},
    services::load_session,
    verifier::{AuthenticationStart, PasskeyVerifier},
};

/// Runs targeted and discoverable passkey logins
pub struct AuthenticationService<
    A: AccountRepository,
    P: PasskeyRepository,
    S: ChallengeStore + ?Sized,
    V: PasskeyVerifier,
> {
    accounts: Arc<A>,
    passkeys: Arc<P>,
    challenges: Arc<S>,
    verifier: Arc<V>,
    config: Arc<PasskeyConfig>,
}

impl<A: AccountRepository, P: PasskeyRepository, S: ChallengeStore + ?Sized, V: PasskeyVerifier>
    AuthenticationService<A, P, S, V>
{
    pub fn new(
        accounts: Arc<A>,
        passkeys: Arc<P>,
        challenges: Arc<S>,
        verifier: Arc<V>,
        config: Arc<PasskeyConfig>,
    ) -> Self {
        Self {
            accounts,
            passkeys,
            challenges,
            verifier,
            config,
        }
    }

    /// Start a login for a known account, restricted to its registered credentials
    pub async fn begin_targeted(&self, account: &Account) -> Result<RequestOptions, Error> {
        let stored = self.passkeys.list_by_account(&account.id).await?;
        if stored.is_empty() {
            return Err(PasskeyError::NoCredentialsRegistered.into());
        }
        let identity = PasskeyIdentity::new(account.clone(), &stored)?;

        let AuthenticationStart { mut options, state } =
            self.verifier.start_authentication(&identity)?;
        options.user_verification = Some(USER_VERIFICATION_PREFERRED.to_string());
        options.timeout = Some(self.config.timeout_ms);
        if options.allow_credentials.as_ref().is_none_or(Vec::is_empty) {
            options.allow_credentials = Some(identity.descriptors());
        }

        let session = ChallengeSession::new(
            CeremonyKind::Login,
            SessionIdentity::Account(account.id),
            options.challenge.clone(),
            state,
            self.config.session_ttl,
        )
        .with_allowed_credentials(options.allowed_ids());

        self.challenges
            .set(&SessionKey::login(&account.id), &session, self.config.session_ttl)
            .await?;

        tracing::debug!(
            account_id = %account.id,
            allowed = stored.len(),
            "Started passkey login"
        );
        Ok(options)
    }

    /// Start a usernameless login; any discoverable credential may answer
    pub async fn begin_discoverable(&self) -> Result<RequestOptions, Error> {
        let AuthenticationStart { mut options, state } =
            self.verifier.start_discoverable_authentication()?;
        options.allow_credentials = Some(Vec::new());
        options.user_verification = Some(USER_VERIFICATION_PREFERRED.to_string());
        options.timeout = Some(self.config.timeout_ms);

        let challenge = options.challenge.clone();
        let session = ChallengeSession::new(
            CeremonyKind::DiscoverableLogin,
            SessionIdentity::Challenge(challenge.clone()),
            challenge.clone(),
            state,
            self.config.session_ttl,
        );

        self.challenges
            .set(
                &SessionKey::discoverable(&challenge),
                &session,
                self.config.session_ttl,
            )
            .await?;

        tracing::debug!("Started discoverable passkey login");
        Ok(options)
    }

    /// Finish a login started with [`AuthenticationService::begin_targeted`]
    pub async fn complete_targeted(
        &self,
        account: &Account,
        response: &AssertionResponse,
    ) -> Result<PasskeyCredential, Error> {
        let key = SessionKey::login(&account.id);
        let client_data = response.client_data()?;
        let session = load_session(
            self.challenges.as_ref(),
            &key,
            CeremonyKind::Login,
            &client_data.challenge,
        )
        .await?;

        let stored = self.passkeys.list_by_account(&account.id).await?;
        if stored.is_empty() {
            return Err(PasskeyError::NoCredentialsRegistered.into());
        }

        let credential = self
            .verify_and_record(account, &stored, response, &session)
            .await?;
        self.challenges.delete(&key).await?;
        Ok(credential)
    }

    /// Finish a usernameless login and report which account it belongs to.
    ///
    /// The owner is resolved from the user handle first and from the credential id
    /// second; an assertion matching neither fails with `UnknownCredential`.
    pub async fn complete_discoverable(
        &self,
        response: &AssertionResponse,
    ) -> Result<(Account, PasskeyCredential), Error> {
        let client_data = response.client_data()?;
        let key = SessionKey::discoverable(&client_data.challenge);
        let session = load_session(
            self.challenges.as_ref(),
            &key,
            CeremonyKind::DiscoverableLogin,
            &client_data.challenge,
        )
        .await?;

        let raw_id = response.raw_credential_id()?;
        let account = self.resolve_owner(response, &raw_id).await?;

        let stored = self.passkeys.list_by_account(&account.id).await?;
        if !stored.iter().any(|c| c.matches(&raw_id)) {
            tracing::warn!(
                account_id = %account.id,
                "Discoverable assertion names a credential the account does not own"
            );
            return Err(PasskeyError::UnknownCredential.into());
        }

        let credential = self
            .verify_and_record(&account, &stored, response, &session)
            .await?;
        self.challenges.delete(&key).await?;
        Ok((account, credential))
    }

    async fn resolve_owner(
        &self,
        response: &AssertionResponse,
        raw_id: &[u8],
    ) -> Result<Account, Error> {
        if let Some(account_id) = response
            .user_handle()?
            .as_deref()
            .and_then(AccountId::from_user_handle)
        {
            if let Some(account) = self.accounts.find_by_id(&account_id).await? {
                return Ok(account);
            }
        }

        if let Some((owner, _)) = self
            .passkeys
            .find_owner_by_credential_id(&encode_binary(raw_id))
            .await?
        {
            if let Some(account) = self.accounts.find_by_id(&owner).await? {
                return Ok(account);
            }
        }

        tracing::warn!("Discoverable assertion could not be tied to an account");
        Err(PasskeyError::UnknownCredential.into())
    }

    async fn verify_and_record(
        &self,
        account: &Account,
        stored: &[PasskeyCredential],
        response: &AssertionResponse,
        session: &ChallengeSession,
    ) -> Result<PasskeyCredential, Error> {
        let raw_id = response.raw_credential_id()?;
        let Some(current) = stored.iter().find(|c| c.matches(&raw_id)) else {
            return Err(PasskeyError::VerificationFailed(
                "credential is not registered to this account".to_string(),
            )
            .into());
        };
        if !session.allows(&raw_id) {
            return Err(PasskeyError::VerificationFailed(
                "credential is not in the allow list".to_string(),
            )
            .into());
        }

        let identity = PasskeyIdentity::new(account.clone(), stored)?;
        let verified = self
            .verifier
            .finish_authentication(&identity, response, session)
            .inspect_err(|e| {
                tracing::warn!(account_id = %account.id, error = %e, "Passkey assertion rejected");
            })?;

        let check = CounterCheck::evaluate(
            current.sign_count,
            current.clone_warning,
            verified.sign_count,
        );
        if check.regressed {
            tracing::warn!(
                account_id = %account.id,
                credential_id = %current.credential_id,
                stored_count = current.sign_count,
                reported_count = verified.sign_count,
                "Sign counter did not advance, flagging possible cloned authenticator"
            );
        }

        let credential = self
            .passkeys
            .update_after_auth(
                &account.id,
                &current.credential_id,
                PasskeyUsage {
                    sign_count: check.sign_count,
                    transports: current.transports.clone(),
                    clone_warning: check.clone_warning,
                },
            )
            .await?;

        tracing::info!(
            account_id = %account.id,
            credential_id = %credential.credential_id,
            "Passkey login succeeded"
        );
        Ok(credential)
    }
}

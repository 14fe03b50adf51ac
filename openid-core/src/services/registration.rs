use std::sync::Arc;

use crate::{
    Account, ChallengeSession, Error, NewPasskeyCredential, PasskeyConfig, PasskeyCredential,
    PasskeyIdentity, SessionKey,
    challenge::{CeremonyKind, SessionIdentity},
    protocol::{ATTESTATION_NONE, AuthenticatorSelection, CreationOptions, RegistrationResponse},
    repositories::{ChallengeStore, PasskeyRepository},
    services::load_session,
    verifier::{PasskeyVerifier, RegistrationStart},
};

/// Enrols passkeys for an authenticated account
pub struct RegistrationService<P: PasskeyRepository, S: ChallengeStore + ?Sized, V: PasskeyVerifier> {
    passkeys: Arc<P>,
    challenges: Arc<S>,
    verifier: Arc<V>,
    config: Arc<PasskeyConfig>,
}

impl<P: PasskeyRepository, S: ChallengeStore + ?Sized, V: PasskeyVerifier>
    RegistrationService<P, S, V>
{
    pub fn new(
        passkeys: Arc<P>,
        challenges: Arc<S>,
        verifier: Arc<V>,
        config: Arc<PasskeyConfig>,
    ) -> Self {
        Self {
            passkeys,
            challenges,
            verifier,
            config,
        }
    }

    /// Build creation options for the account and remember the pending ceremony.
    ///
    /// Already registered credentials go into the exclude list so the same
    /// authenticator is not enrolled twice.
    pub async fn begin(&self, account: &Account) -> Result<CreationOptions, Error> {
        let stored = self.passkeys.list_by_account(&account.id).await?;
        let identity = PasskeyIdentity::new(account.clone(), &stored)?;

        let RegistrationStart { mut options, state } =
            self.verifier.start_registration(&identity)?;
        options.authenticator_selection = Some(AuthenticatorSelection::platform_passkey());
        options.attestation = Some(ATTESTATION_NONE.to_string());
        options.timeout = Some(self.config.timeout_ms);
        if options.exclude_credentials.is_none() && !stored.is_empty() {
            options.exclude_credentials = Some(identity.descriptors());
        }

        let session = ChallengeSession::new(
            CeremonyKind::Registration,
            SessionIdentity::Account(account.id),
            options.challenge.clone(),
            state,
            self.config.session_ttl,
        );
        self.challenges
            .set(
                &SessionKey::registration(&account.id),
                &session,
                self.config.session_ttl,
            )
            .await?;

        tracing::debug!(
            account_id = %account.id,
            excluded = stored.len(),
            "Started passkey registration"
        );
        Ok(options)
    }

    /// Verify the authenticator's attestation and store the credential.
    ///
    /// On verification failure nothing is written and the pending session stays
    /// in place until it expires.
    pub async fn complete(
        &self,
        account: &Account,
        response: &RegistrationResponse,
        remark: Option<&str>,
    ) -> Result<PasskeyCredential, Error> {
        let key = SessionKey::registration(&account.id);
        let client_data = response.client_data()?;
        let session = load_session(
            self.challenges.as_ref(),
            &key,
            CeremonyKind::Registration,
            &client_data.challenge,
        )
        .await?;

        let stored = self.passkeys.list_by_account(&account.id).await?;
        let identity = PasskeyIdentity::new(account.clone(), &stored)?;

        let verified = self
            .verifier
            .finish_registration(&identity, response, &session)
            .inspect_err(|e| {
                tracing::warn!(account_id = %account.id, error = %e, "Passkey registration rejected");
            })?;

        let transports = if verified.transports.is_empty() {
            response.transports()
        } else {
            verified.transports
        };

        let credential = self
            .passkeys
            .upsert(
                &account.id,
                NewPasskeyCredential {
                    credential_id: verified.credential_id,
                    public_key: verified.public_key,
                    attestation_type: verified.attestation_type,
                    aaguid: verified.aaguid,
                    sign_count: verified.sign_count,
                    transports,
                    remark: normalize_remark(remark),
                },
            )
            .await?;

        self.challenges.delete(&key).await?;

        tracing::info!(
            account_id = %account.id,
            credential_id = %credential.credential_id,
            "Registered passkey"
        );
        Ok(credential)
    }
}

fn normalize_remark(remark: Option<&str>) -> Option<String> {
    remark
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_remark() {
        assert_eq!(normalize_remark(None), None);
        assert_eq!(normalize_remark(Some("  ")), None);
        assert_eq!(normalize_remark(Some(" MacBook ")), Some("MacBook".to_string()));
    }
}

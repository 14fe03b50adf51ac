//! Bridges an account and its stored credentials to what a verifier needs
use uuid::Uuid;

use crate::{Account, AccountId, Error, PasskeyCredential, protocol::CredentialDescriptor};

/// A stored credential with every binary field decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredKey {
    pub id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub aaguid: Vec<u8>,
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub clone_warning: bool,
}

impl TryFrom<&PasskeyCredential> for RegisteredKey {
    type Error = Error;

    fn try_from(credential: &PasskeyCredential) -> Result<Self, Self::Error> {
        Ok(Self {
            id: credential.credential_id_bytes()?,
            public_key: credential.public_key_bytes()?,
            attestation_type: credential.attestation_type.clone(),
            aaguid: credential.aaguid_bytes()?,
            sign_count: credential.sign_count,
            transports: credential.transports.clone(),
            clone_warning: credential.clone_warning,
        })
    }
}

/// The identity a verifier builds options for and checks responses against
#[derive(Debug, Clone)]
pub struct PasskeyIdentity {
    account: Account,
    credentials: Vec<RegisteredKey>,
}

impl PasskeyIdentity {
    /// Decode every stored credential of the account.
    ///
    /// A credential that fails to decode aborts construction; it is never skipped.
    pub fn new(account: Account, credentials: &[PasskeyCredential]) -> Result<Self, Error> {
        let credentials = credentials
            .iter()
            .map(RegisteredKey::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            account,
            credentials,
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_id(&self) -> AccountId {
        self.account.id
    }

    pub fn user_handle(&self) -> Uuid {
        self.account.id.user_handle()
    }

    pub fn name(&self) -> String {
        self.account.credential_name()
    }

    pub fn display_name(&self) -> String {
        self.account.display_name()
    }

    pub fn credentials(&self) -> &[RegisteredKey] {
        &self.credentials
    }

    pub fn find_credential(&self, raw_id: &[u8]) -> Option<&RegisteredKey> {
        self.credentials.iter().find(|c| c.id == raw_id)
    }

    /// Descriptors for exclude lists (registration) and allow lists (targeted login)
    pub fn descriptors(&self) -> Vec<CredentialDescriptor> {
        self.credentials
            .iter()
            .map(|c| {
                CredentialDescriptor::public_key(
                    crate::credential::encode_binary(&c.id),
                    c.transports.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PasskeyError, credential::encode_binary};
    use chrono::Utc;

    fn stored(credential_id: &str) -> PasskeyCredential {
        PasskeyCredential {
            id: 1,
            account_id: AccountId::new(1),
            credential_id: credential_id.to_string(),
            public_key: encode_binary(b"key"),
            attestation_type: "none".to_string(),
            aaguid: encode_binary(&[7; 16]),
            sign_count: 4,
            transports: vec!["internal".to_string()],
            clone_warning: true,
            remark: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[test]
    fn test_identity_decodes_credentials() {
        let account = Account::new(1, "alice", "alice@example.com");
        let identity = PasskeyIdentity::new(account, &[stored(&encode_binary(b"cred"))]).unwrap();

        assert_eq!(identity.name(), "alice");
        assert_eq!(identity.display_name(), "alice@example.com");
        assert_eq!(identity.user_handle(), AccountId::new(1).user_handle());

        let key = identity.find_credential(b"cred").unwrap();
        assert_eq!(key.public_key, b"key");
        assert_eq!(key.aaguid, vec![7; 16]);
        assert_eq!(key.sign_count, 4);
        assert!(key.clone_warning);

        let descriptors = identity.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, encode_binary(b"cred"));
        assert_eq!(descriptors[0].transports, Some(vec!["internal".to_string()]));
    }

    #[test]
    fn test_identity_fails_on_corrupt_credential() {
        let account = Account::new(1, "alice", "");
        let err = PasskeyIdentity::new(account, &[stored(&encode_binary(b"ok")), stored("%%%")])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Passkey(PasskeyError::InvalidCredentialData(_))
        ));
    }
}

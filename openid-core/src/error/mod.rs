pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Passkey error: {0}")]
    Passkey(#[from] PasskeyError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Account not found")]
    AccountNotFound,
}

/// Failures of the registration and authentication ceremonies
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// The pending ceremony session is missing, expired or already consumed.
    #[error("Passkey session not found or expired")]
    SessionNotFound,

    #[error("No passkeys registered for this account")]
    NoCredentialsRegistered,

    #[error("Credential verification failed: {0}")]
    VerificationFailed(String),

    /// A discoverable assertion could not be tied to any account.
    #[error("Unknown credential")]
    UnknownCredential,

    #[error("Credential not found")]
    CredentialNotFound,

    #[error("Invalid stored credential data: {0}")]
    InvalidCredentialData(String),

    #[error("Failed to build ceremony options: {0}")]
    Ceremony(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("JWT verification failed: {0}")]
    JwtVerification(String),

    #[error("Random number generation failed: {0}")]
    Random(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }

    pub fn is_passkey_error(&self) -> bool {
        matches!(self, Error::Passkey(_))
    }

    /// True when the caller has to restart the ceremony from its begin step.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, Error::Passkey(PasskeyError::SessionNotFound))
    }

    /// True for failures a client can cause by sending a bad or unknown response,
    /// as opposed to system failures in storage or configuration.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Passkey(
                PasskeyError::SessionNotFound
                    | PasskeyError::NoCredentialsRegistered
                    | PasskeyError::VerificationFailed(_)
                    | PasskeyError::UnknownCredential
                    | PasskeyError::CredentialNotFound
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let passkey_error = Error::Passkey(PasskeyError::SessionNotFound);
        assert_eq!(
            passkey_error.to_string(),
            "Passkey error: Passkey session not found or expired"
        );

        let validation_error =
            Error::Validation(ValidationError::InvalidUrl("not a url".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid URL: not a url"
        );

        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");
    }

    #[test]
    fn test_passkey_error_variants() {
        assert_eq!(
            PasskeyError::NoCredentialsRegistered.to_string(),
            "No passkeys registered for this account"
        );
        assert_eq!(
            PasskeyError::VerificationFailed("challenge mismatch".to_string()).to_string(),
            "Credential verification failed: challenge mismatch"
        );
        assert_eq!(PasskeyError::UnknownCredential.to_string(), "Unknown credential");
        assert_eq!(
            PasskeyError::InvalidCredentialData("bad base64".to_string()).to_string(),
            "Invalid stored credential data: bad base64"
        );
    }

    #[test]
    fn test_is_session_not_found() {
        assert!(Error::Passkey(PasskeyError::SessionNotFound).is_session_not_found());
        assert!(!Error::Passkey(PasskeyError::UnknownCredential).is_session_not_found());
        assert!(!Error::Auth(AuthError::AccountNotFound).is_session_not_found());
    }

    #[test]
    fn test_is_rejection() {
        assert!(Error::Passkey(PasskeyError::UnknownCredential).is_rejection());
        assert!(
            Error::Passkey(PasskeyError::VerificationFailed("origin".to_string())).is_rejection()
        );
        assert!(!Error::Passkey(PasskeyError::Ceremony("rng".to_string())).is_rejection());
        assert!(!Error::Storage(StorageError::Connection("refused".to_string())).is_rejection());
    }

    #[test]
    fn test_storage_error_variants() {
        let db_error = StorageError::Database("connection failed".to_string());
        assert_eq!(db_error.to_string(), "Database error: connection failed");

        let constraint = StorageError::Constraint("credential_id".to_string());
        assert_eq!(
            constraint.to_string(),
            "Constraint violation: credential_id"
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = PasskeyError::CredentialNotFound.into();
        assert!(matches!(
            error,
            Error::Passkey(PasskeyError::CredentialNotFound)
        ));
        assert!(error.is_passkey_error());

        let error: Error = StorageError::NotFound.into();
        assert!(error.is_storage_error());

        let error: Error = AuthError::AccountNotFound.into();
        assert!(error.is_auth_error());
        assert!(!error.is_rejection());
        assert_eq!(error.to_string(), "Authentication error: Account not found");
    }
}

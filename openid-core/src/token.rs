//! Token issuance after a successful login
//!
//! The ceremonies never issue tokens themselves. Callers hand the resolved account
//! to a [`TokenIssuer`] once a `complete_*` step has returned.
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    Account, Error,
    error::{CryptoError, ValidationError},
    id::generate_prefixed_id,
};

pub const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 30;

#[async_trait]
pub trait TokenIssuer: Send + Sync + 'static {
    async fn issue(&self, account: &Account, client_ip: Option<&str>) -> Result<String, Error>;
}

/// Claims carried by access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - account ID
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Issued at in seconds (as UTC timestamp)
    pub iat: i64,
    /// Expiration time in seconds (as UTC timestamp)
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Unique token id
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// JWT algorithm type
#[derive(Debug, Clone)]
pub enum JwtAlgorithm {
    /// HS256 - HMAC with SHA-256
    HS256 { secret_key: Vec<u8> },
    /// HS512 - HMAC with SHA-512
    HS512 { secret_key: Vec<u8> },
    /// RS256 - RSA with SHA-256
    RS256 {
        /// Private key for signing JWTs (PEM format)
        private_key: Vec<u8>,
        /// Public key for verifying JWTs (PEM format)
        public_key: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: JwtAlgorithm,
    pub issuer: Option<String>,
    pub lifetime: Duration,
    /// Whether to embed the client IP in issued tokens
    pub include_ip: bool,
}

impl JwtConfig {
    fn with_algorithm(algorithm: JwtAlgorithm) -> Self {
        Self {
            algorithm,
            issuer: None,
            lifetime: Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS),
            include_ip: true,
        }
    }

    pub fn new_hs256(secret_key: Vec<u8>) -> Self {
        Self::with_algorithm(JwtAlgorithm::HS256 { secret_key })
    }

    pub fn new_hs512(secret_key: Vec<u8>) -> Self {
        Self::with_algorithm(JwtAlgorithm::HS512 { secret_key })
    }

    pub fn new_rs256(private_key: Vec<u8>, public_key: Vec<u8>) -> Self {
        Self::with_algorithm(JwtAlgorithm::RS256 {
            private_key,
            public_key,
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_ip(mut self, include_ip: bool) -> Self {
        self.include_ip = include_ip;
        self
    }

    pub fn jwt_algorithm(&self) -> Algorithm {
        match &self.algorithm {
            JwtAlgorithm::HS256 { .. } => Algorithm::HS256,
            JwtAlgorithm::HS512 { .. } => Algorithm::HS512,
            JwtAlgorithm::RS256 { .. } => Algorithm::RS256,
        }
    }

    pub fn get_encoding_key(&self) -> Result<EncodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::HS256 { secret_key } | JwtAlgorithm::HS512 { secret_key } => {
                Ok(EncodingKey::from_secret(secret_key))
            }
            JwtAlgorithm::RS256 { private_key, .. } => EncodingKey::from_rsa_pem(private_key)
                .map_err(|e| {
                    ValidationError::InvalidField(format!("Invalid RSA private key: {e}")).into()
                }),
        }
    }

    pub fn get_decoding_key(&self) -> Result<DecodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::HS256 { secret_key } | JwtAlgorithm::HS512 { secret_key } => {
                Ok(DecodingKey::from_secret(secret_key))
            }
            JwtAlgorithm::RS256 { public_key, .. } => DecodingKey::from_rsa_pem(public_key)
                .map_err(|e| {
                    ValidationError::InvalidField(format!("Invalid RSA public key: {e}")).into()
                }),
        }
    }

    pub fn get_validation(&self) -> Validation {
        let mut validation = Validation::new(self.jwt_algorithm());
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

/// Issues signed JWT access tokens
#[derive(Debug, Clone)]
pub struct JwtTokenIssuer {
    config: JwtConfig,
}

impl JwtTokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn claims_for(&self, account: &Account, client_ip: Option<&str>) -> Result<AccessClaims, Error> {
        let now = Utc::now();
        Ok(AccessClaims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            email: account.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.config.lifetime).timestamp(),
            iss: self.config.issuer.clone(),
            jti: generate_prefixed_id("jti")?,
            ip: client_ip
                .filter(|_| self.config.include_ip)
                .map(str::to_string),
        })
    }

    /// Verify a token issued by this issuer and return its claims
    pub fn verify(&self, token: &str) -> Result<AccessClaims, Error> {
        let decoding_key = self.config.get_decoding_key()?;
        let data = decode::<AccessClaims>(token, &decoding_key, &self.config.get_validation())
            .map_err(|e| CryptoError::JwtVerification(e.to_string()))?;
        Ok(data.claims)
    }
}

#[async_trait]
impl TokenIssuer for JwtTokenIssuer {
    async fn issue(&self, account: &Account, client_ip: Option<&str>) -> Result<String, Error> {
        let claims = self.claims_for(account, client_ip)?;
        let header = Header::new(self.config.jwt_algorithm());
        let encoding_key = self.config.get_encoding_key()?;

        let token = encode(&header, &claims, &encoding_key)
            .map_err(|e| CryptoError::JwtSigning(e.to_string()))?;

        tracing::debug!(account_id = %account.id, jti = %claims.jti, "Issued access token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new(1, "alice", "alice@example.com")
    }

    #[tokio::test]
    async fn test_issue_and_verify_hs512() {
        let issuer = JwtTokenIssuer::new(
            JwtConfig::new_hs512(b"a-very-secret-key-for-testing-only".to_vec()).with_issuer("OpenID"),
        );

        let token = issuer.issue(&account(), Some("203.0.113.9")).await.unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.sub, "1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss.as_deref(), Some("OpenID"));
        assert_eq!(claims.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(claims.exp - claims.iat, Duration::days(30).num_seconds());
        assert!(claims.jti.starts_with("jti_"));
    }

    #[tokio::test]
    async fn test_ip_can_be_omitted() {
        let issuer = JwtTokenIssuer::new(JwtConfig::new_hs256(b"secret".to_vec()).with_ip(false));
        let token = issuer.issue(&account(), Some("203.0.113.9")).await.unwrap();
        assert_eq!(issuer.verify(&token).unwrap().ip, None);
    }

    #[tokio::test]
    async fn test_verify_rejects_other_key() {
        let issuer = JwtTokenIssuer::new(JwtConfig::new_hs256(b"one".to_vec()));
        let other = JwtTokenIssuer::new(JwtConfig::new_hs256(b"two".to_vec()));

        let token = issuer.issue(&account(), None).await.unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(Error::Crypto(CryptoError::JwtVerification(_)))
        ));
    }

    #[test]
    fn test_invalid_rsa_key() {
        let config = JwtConfig::new_rs256(b"not a pem".to_vec(), b"not a pem".to_vec());
        assert!(config.get_encoding_key().is_err());
        assert!(config.get_decoding_key().is_err());
    }
}

//! Relying party configuration
//!
//! Resolved once at startup from the service's public URL and passed into the
//! ceremonies. Every stored credential is bound to the relying party id, so the
//! value must stay stable for the lifetime of the deployment.
use chrono::Duration;
use url::Url;

use crate::{
    Error,
    error::{ValidationError, utilities::RequiredFieldExt},
};

pub const DEFAULT_SESSION_TTL_SECS: i64 = 5 * 60;
pub const DEFAULT_TIMEOUT_MS: u32 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// Hostname credentials are scoped to
    pub id: String,
    pub name: String,
    /// Scheme, host and explicit port of the public URL
    pub origin: Url,
}

impl RelyingParty {
    /// Derive the relying party from the public URL users load the site from
    pub fn from_public_url(name: impl Into<String>, public_url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(public_url)
            .map_err(|e| ValidationError::InvalidUrl(format!("{public_url}: {e}")))?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ValidationError::InvalidUrl(format!("{public_url}: missing hostname")))?
            .to_string();

        let origin = Url::parse(&parsed.origin().ascii_serialization())
            .map_err(|e| ValidationError::InvalidUrl(format!("{public_url}: {e}")))?;

        Ok(Self {
            id: host,
            name: name.into(),
            origin,
        })
    }

    /// Origin without the trailing slash `Url` adds, as browsers report it in client data
    pub fn origin_str(&self) -> String {
        self.origin.as_str().trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Clone)]
pub struct PasskeyConfig {
    pub relying_party: RelyingParty,
    /// How long a begun ceremony stays completable
    pub session_ttl: Duration,
    /// Timeout advertised to the client, in milliseconds
    pub timeout_ms: u32,
}

impl PasskeyConfig {
    pub fn new(relying_party: RelyingParty) -> Self {
        Self {
            relying_party,
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn builder() -> PasskeyConfigBuilder {
        PasskeyConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct PasskeyConfigBuilder {
    relying_party: Option<RelyingParty>,
    session_ttl: Option<Duration>,
    timeout_ms: Option<u32>,
}

impl PasskeyConfigBuilder {
    pub fn relying_party(mut self, relying_party: RelyingParty) -> Self {
        self.relying_party = Some(relying_party);
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn build(self) -> Result<PasskeyConfig, Error> {
        let relying_party = self.relying_party.require_field("Relying party")?;
        let session_ttl = self
            .session_ttl
            .unwrap_or_else(|| Duration::seconds(DEFAULT_SESSION_TTL_SECS));
        if session_ttl <= Duration::zero() {
            return Err(ValidationError::InvalidField("session_ttl must be positive".to_string()).into());
        }

        Ok(PasskeyConfig {
            relying_party,
            session_ttl,
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_public_url() {
        let rp = RelyingParty::from_public_url("OpenID", "https://id.example.com/login?x=1").unwrap();
        assert_eq!(rp.id, "id.example.com");
        assert_eq!(rp.name, "OpenID");
        assert_eq!(rp.origin_str(), "https://id.example.com");
    }

    #[test]
    fn test_from_public_url_keeps_port() {
        let rp = RelyingParty::from_public_url("dev", "http://localhost:8080/").unwrap();
        assert_eq!(rp.id, "localhost");
        assert_eq!(rp.origin_str(), "http://localhost:8080");
    }

    #[test]
    fn test_from_public_url_requires_host() {
        assert!(matches!(
            RelyingParty::from_public_url("x", "mailto:someone@example.com"),
            Err(Error::Validation(ValidationError::InvalidUrl(_)))
        ));
        assert!(RelyingParty::from_public_url("x", "not a url").is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let rp = RelyingParty::from_public_url("x", "https://example.com").unwrap();
        let config = PasskeyConfig::builder().relying_party(rp).build().unwrap();
        assert_eq!(config.session_ttl, Duration::minutes(5));
        assert_eq!(config.timeout_ms, 60_000);
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            PasskeyConfig::builder().build(),
            Err(Error::Validation(ValidationError::MissingField(_)))
        ));

        let rp = RelyingParty::from_public_url("x", "https://example.com").unwrap();
        assert!(
            PasskeyConfig::builder()
                .relying_party(rp)
                .session_ttl(Duration::zero())
                .build()
                .is_err()
        );
    }
}

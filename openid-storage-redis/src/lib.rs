//! Redis-backed storage for pending passkey ceremonies
//!
//! Sessions are stored as JSON under `{prefix}:{session key}`, e.g.
//! `openid:passkey:login:42`, and expire through `PSETEX`, so Redis itself
//! enforces the session TTL.
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use openid_core::{
    ChallengeSession, Error, SessionKey, map_connection_err, map_storage_err,
    repositories::ChallengeStore,
};
use redis::{AsyncCommands, aio::MultiplexedConnection};

pub const DEFAULT_PREFIX: &str = "openid";

const CONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RedisChallengeStore {
    client: redis::Client,
    prefix: String,
}

impl RedisChallengeStore {
    /// Create a store for `url`; no connection is made until first use
    pub fn new(url: &str) -> Result<Self, Error> {
        let client = map_connection_err!(redis::Client::open(url))?;
        Ok(Self {
            client,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn redis_key(&self, key: &SessionKey) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Round-trip a PING to check the server is reachable
    pub async fn health_check(&self) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: String = map_connection_err!(redis::cmd("PING").query_async(&mut conn).await)?;
        Ok(())
    }

    async fn connection(&self) -> Result<MultiplexedConnection, Error> {
        let mut backoff_ms = 100u64;
        let mut attempt = 1;
        loop {
            match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    tracing::warn!(attempt, backoff_ms, error = %e, "Redis connection failed, retrying");
                    tokio::time::sleep(StdDuration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                    attempt += 1;
                }
                Err(e) => return map_connection_err!(Err(e)),
            }
        }
    }
}

/// PSETEX needs a positive TTL
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.num_milliseconds()).unwrap_or(0).max(1)
}

#[async_trait]
impl ChallengeStore for RedisChallengeStore {
    async fn set(
        &self,
        key: &SessionKey,
        session: &ChallengeSession,
        ttl: Duration,
    ) -> Result<(), Error> {
        let payload = map_storage_err!(serde_json::to_string(session))?;
        let mut conn = self.connection().await?;

        let _: () = map_storage_err!(
            conn.pset_ex::<_, _, ()>(self.redis_key(key), payload, ttl_millis(ttl))
                .await
        )?;

        tracing::debug!(key = %key, ttl_ms = ttl_millis(ttl), "Stored passkey session in Redis");
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<ChallengeSession>, Error> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = map_storage_err!(
            conn.get::<_, Option<String>>(self.redis_key(key)).await
        )?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let session: ChallengeSession = map_storage_err!(serde_json::from_str(&payload))?;
        Ok((!session.is_expired()).then_some(session))
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: () = map_storage_err!(conn.del::<_, ()>(self.redis_key(key)).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openid_core::{AccountId, StorageError};

    #[test]
    fn test_redis_key_uses_prefix() {
        let store = RedisChallengeStore::new("redis://127.0.0.1:6379").unwrap();
        let key = SessionKey::registration(&AccountId::new(42));
        assert_eq!(store.redis_key(&key), "openid:passkey:register:42");

        let store = store.with_prefix("tenant-a");
        assert_eq!(store.redis_key(&key), "tenant-a:passkey:register:42");
    }

    #[test]
    fn test_ttl_millis_is_positive() {
        assert_eq!(ttl_millis(Duration::minutes(5)), 300_000);
        assert_eq!(ttl_millis(Duration::zero()), 1);
        assert_eq!(ttl_millis(Duration::milliseconds(-5)), 1);
    }

    #[test]
    fn test_invalid_url() {
        let err = RedisChallengeStore::new("not a url").unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Connection(_))));
    }
}

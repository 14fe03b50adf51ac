use async_trait::async_trait;
use chrono::{Duration, Utc};
use openid_core::{
    ChallengeSession, Error, SessionKey, StorageError, map_storage_err,
    repositories::ChallengeStore,
};
use sqlx::SqlitePool;

/// Pending ceremonies kept in the `passkey_challenges` table
pub struct SqliteChallengeStore {
    pool: SqlitePool,
}

impl SqliteChallengeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove expired rows and return how many were deleted
    pub async fn cleanup_expired(&self) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM passkey_challenges WHERE expires_at <= ?1")
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to cleanup expired passkey challenges");
                Error::Storage(StorageError::Database(e.to_string()))
            })?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ChallengeStore for SqliteChallengeStore {
    async fn set(
        &self,
        key: &SessionKey,
        session: &ChallengeSession,
        ttl: Duration,
    ) -> Result<(), Error> {
        let payload = map_storage_err!(serde_json::to_string(session))?;
        let expires_at = (Utc::now() + ttl).timestamp_millis();

        map_storage_err!(
            sqlx::query(
                r#"
                INSERT INTO passkey_challenges (session_key, kind, session, expires_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(session_key) DO UPDATE SET
                    kind = excluded.kind,
                    session = excluded.session,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(key.as_str())
            .bind(session.kind.as_str())
            .bind(payload)
            .bind(expires_at)
            .execute(&self.pool)
            .await
        )?;

        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<ChallengeSession>, Error> {
        let payload: Option<String> = map_storage_err!(
            sqlx::query_scalar(
                "SELECT session FROM passkey_challenges WHERE session_key = ?1 AND expires_at > ?2",
            )
            .bind(key.as_str())
            .bind(Utc::now().timestamp_millis())
            .fetch_optional(&self.pool)
            .await
        )?;

        payload
            .map(|p| map_storage_err!(serde_json::from_str::<ChallengeSession>(&p)))
            .transpose()
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), Error> {
        map_storage_err!(
            sqlx::query("DELETE FROM passkey_challenges WHERE session_key = ?1")
                .bind(key.as_str())
                .execute(&self.pool)
                .await
        )?;
        Ok(())
    }
}

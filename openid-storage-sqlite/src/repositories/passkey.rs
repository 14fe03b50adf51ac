use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openid_core::{
    AccountId, Error, NewPasskeyCredential, PasskeyCredential,
    credential::{join_transports, split_transports},
    error::{PasskeyError, StorageError, utilities::DatabaseResultExt},
    repositories::{PasskeyRepository, PasskeyUsage},
};
use sqlx::SqlitePool;

const PASSKEY_COLUMNS: &str = "id, account_id, credential_id, public_key, attestation_type, aaguid, \
    sign_count, transports, clone_warning, remark, created_at, updated_at, last_used_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SqlitePasskey {
    pub id: i64,
    pub account_id: i64,
    pub credential_id: String,
    pub public_key: String,
    pub attestation_type: String,
    pub aaguid: String,
    pub sign_count: i64,
    pub transports: String,
    pub clone_warning: bool,
    pub remark: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_used_at: Option<i64>,
}

fn timestamp(field: &str, millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| PasskeyError::InvalidCredentialData(format!("{field}: {millis}")).into())
}

impl TryFrom<SqlitePasskey> for PasskeyCredential {
    type Error = Error;

    fn try_from(row: SqlitePasskey) -> Result<Self, Self::Error> {
        let sign_count = u32::try_from(row.sign_count).map_err(|_| {
            PasskeyError::InvalidCredentialData(format!("sign_count: {}", row.sign_count))
        })?;

        Ok(PasskeyCredential {
            id: row.id,
            account_id: AccountId::new(row.account_id),
            credential_id: row.credential_id,
            public_key: row.public_key,
            attestation_type: row.attestation_type,
            aaguid: row.aaguid,
            sign_count,
            transports: split_transports(&row.transports),
            clone_warning: row.clone_warning,
            remark: row.remark,
            created_at: timestamp("created_at", row.created_at)?,
            updated_at: timestamp("updated_at", row.updated_at)?,
            last_used_at: row
                .last_used_at
                .map(|t| timestamp("last_used_at", t))
                .transpose()?,
        })
    }
}

pub struct SqlitePasskeyRepository {
    pool: SqlitePool,
}

impl SqlitePasskeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasskeyRepository for SqlitePasskeyRepository {
    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<PasskeyCredential>, Error> {
        let rows = sqlx::query_as::<_, SqlitePasskey>(&format!(
            "SELECT {PASSKEY_COLUMNS} FROM passkeys WHERE account_id = ?1 ORDER BY created_at, id"
        ))
        .bind(account_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_db_err_with_context("Failed to list passkeys")?;

        rows.into_iter().map(PasskeyCredential::try_from).collect()
    }

    async fn upsert(
        &self,
        account_id: &AccountId,
        credential: NewPasskeyCredential,
    ) -> Result<PasskeyCredential, Error> {
        let now = Utc::now().timestamp_millis();
        let credential_id = credential.encoded_credential_id();

        // The WHERE clause turns a conflict with another account's row into "no row returned"
        let row = sqlx::query_as::<_, SqlitePasskey>(&format!(
            r#"
            INSERT INTO passkeys (
                account_id, credential_id, public_key, attestation_type, aaguid,
                sign_count, transports, clone_warning, remark, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?9)
            ON CONFLICT(credential_id) DO UPDATE SET
                public_key = excluded.public_key,
                attestation_type = excluded.attestation_type,
                aaguid = excluded.aaguid,
                sign_count = MAX(passkeys.sign_count, excluded.sign_count),
                transports = excluded.transports,
                remark = COALESCE(excluded.remark, passkeys.remark),
                updated_at = excluded.updated_at
            WHERE passkeys.account_id = excluded.account_id
            RETURNING {PASSKEY_COLUMNS}
            "#
        ))
        .bind(account_id.as_i64())
        .bind(&credential_id)
        .bind(credential.encoded_public_key())
        .bind(&credential.attestation_type)
        .bind(credential.encoded_aaguid())
        .bind(i64::from(credential.sign_count))
        .bind(join_transports(&credential.transports))
        .bind(&credential.remark)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(account_id = %account_id, error = %e, "Failed to upsert passkey");
            Error::Storage(StorageError::Database(e.to_string()))
        })?;

        match row {
            Some(row) => row.try_into(),
            None => {
                tracing::warn!(
                    account_id = %account_id,
                    credential_id = %credential_id,
                    "Credential id is registered to another account"
                );
                Err(StorageError::Constraint(
                    "credential_id is registered to another account".to_string(),
                )
                .into())
            }
        }
    }

    async fn update_after_auth(
        &self,
        account_id: &AccountId,
        credential_id: &str,
        usage: PasskeyUsage,
    ) -> Result<PasskeyCredential, Error> {
        let now = Utc::now().timestamp_millis();

        let row = sqlx::query_as::<_, SqlitePasskey>(&format!(
            r#"
            UPDATE passkeys
            SET sign_count = ?1, transports = ?2, clone_warning = ?3, last_used_at = ?4, updated_at = ?4
            WHERE account_id = ?5 AND credential_id = ?6
            RETURNING {PASSKEY_COLUMNS}
            "#
        ))
        .bind(i64::from(usage.sign_count))
        .bind(join_transports(&usage.transports))
        .bind(usage.clone_warning)
        .bind(now)
        .bind(account_id.as_i64())
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to record passkey usage")?;

        row.ok_or(PasskeyError::CredentialNotFound)?.try_into()
    }

    async fn find_owner_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<(AccountId, PasskeyCredential)>, Error> {
        let row = sqlx::query_as::<_, SqlitePasskey>(&format!(
            "SELECT {PASSKEY_COLUMNS} FROM passkeys WHERE credential_id = ?1"
        ))
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await
        .map_db_err()?;

        row.map(|row| {
            let credential = PasskeyCredential::try_from(row)?;
            Ok((credential.account_id, credential))
        })
        .transpose()
    }

    async fn delete(&self, account_id: &AccountId, credential_id: &str) -> Result<(), Error> {
        let result = sqlx::query("DELETE FROM passkeys WHERE account_id = ?1 AND credential_id = ?2")
            .bind(account_id.as_i64())
            .bind(credential_id)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete passkey")?;

        if result.rows_affected() == 0 {
            return Err(PasskeyError::CredentialNotFound.into());
        }
        Ok(())
    }
}

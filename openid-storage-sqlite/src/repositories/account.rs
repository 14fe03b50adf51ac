use async_trait::async_trait;
use openid_core::{
    Account, AccountId, Error, NewAccount, error::StorageError, repositories::AccountRepository,
};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SqliteAccount {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<SqliteAccount> for Account {
    fn from(account: SqliteAccount) -> Self {
        Account::new(account.id, account.username, account.email)
    }
}

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an account row; used when seeding the local mirror
    pub async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            INSERT INTO accounts (username, email)
            VALUES (?1, ?2)
            RETURNING id, username, email
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create account");
            match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::Storage(StorageError::Constraint("username already exists".to_string()))
                }
                other => Error::Storage(StorageError::Database(other.to_string())),
            }
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(
            "SELECT id, username, email FROM accounts WHERE id = ?1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(row.map(Account::from))
    }
}

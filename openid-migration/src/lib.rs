//! Versioned schema migrations for the openid storage backends
//!
//! Each backend implements [`MigrationManager`] over its own sqlx driver and
//! provides an ordered list of [`Migration`]s. Applied versions are recorded in a
//! tracking table so running the list again is a no-op.
use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

pub const MIGRATION_TABLE: &str = "_openid_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Apply the schema change
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Revert the schema change
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Ordering key; must be unique within a backend
    fn version(&self) -> i64;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix timestamp in seconds
    pub applied_at: i64,
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Create the tracking table if it does not exist
    async fn initialize(&self) -> Result<()>;

    /// Apply every migration that has not been recorded yet, in version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Revert applied migrations, newest first
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    async fn is_applied(&self, version: i64) -> Result<bool>;
}

/// Check that no two migrations share a version.
///
/// Returns the versions in ascending order.
pub fn ordered_versions<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<Vec<i64>> {
    let mut seen = HashSet::new();
    for migration in migrations {
        if !seen.insert(migration.version()) {
            return Err(MigrationError::DuplicateVersion(migration.version()));
        }
    }
    let mut versions: Vec<i64> = seen.into_iter().collect();
    versions.sort_unstable();
    Ok(versions)
}

/// Migrations whose version is not among `applied`, sorted by version
pub fn pending<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Vec<&'m dyn Migration<DB>> {
    let applied: HashSet<i64> = applied.iter().map(|r| r.version).collect();
    let mut out: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .map(Box::as_ref)
        .filter(|m| !applied.contains(&m.version()))
        .collect();
    out.sort_by_key(|m| m.version());
    out
}

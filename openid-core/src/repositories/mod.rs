//! Repository traits for the data access layer
//!
//! The ceremonies only talk to storage through these traits.
//!
//! # Trait Hierarchy
//!
//! - [`AccountRepository`], [`PasskeyRepository`] and [`ChallengeStore`] define the
//!   operations for each data domain
//! - `*RepositoryProvider` traits hand out each repository
//! - [`RepositoryProvider`] combines the providers with lifecycle methods so a
//!   single backend can serve everything

pub mod account;
pub mod adapter;
pub mod challenge;
pub mod memory;
pub mod passkey;

pub use account::AccountRepository;
pub use adapter::{AccountRepositoryAdapter, ChallengeStoreAdapter, PasskeyRepositoryAdapter};
pub use challenge::ChallengeStore;
pub use memory::{
    InMemoryAccountRepository, InMemoryChallengeStore, InMemoryPasskeyRepository,
    InMemoryRepositoryProvider,
};
pub use passkey::{PasskeyRepository, PasskeyUsage};

use async_trait::async_trait;

use crate::Error;

/// Provider trait for account lookups
pub trait AccountRepositoryProvider: Send + Sync + 'static {
    type AccountRepo: AccountRepository;

    fn account(&self) -> &Self::AccountRepo;
}

/// Provider trait for passkey credential storage
pub trait PasskeyRepositoryProvider: Send + Sync + 'static {
    type PasskeyRepo: PasskeyRepository;

    fn passkey(&self) -> &Self::PasskeyRepo;
}

/// Provider trait for pending ceremony sessions
pub trait ChallengeStoreProvider: Send + Sync + 'static {
    type ChallengeStore: ChallengeStore;

    fn challenge(&self) -> &Self::ChallengeStore;
}

/// Unified provider implemented by every storage backend
#[async_trait]
pub trait RepositoryProvider:
    AccountRepositoryProvider + PasskeyRepositoryProvider + ChallengeStoreProvider
{
    /// Bring the backend schema up to date
    async fn migrate(&self) -> Result<(), Error>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<(), Error>;
}

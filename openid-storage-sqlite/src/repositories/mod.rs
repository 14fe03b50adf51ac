//! Repository implementations for SQLite storage

pub mod account;
pub mod challenge;
pub mod passkey;

pub use account::SqliteAccountRepository;
pub use challenge::SqliteChallengeStore;
pub use passkey::SqlitePasskeyRepository;

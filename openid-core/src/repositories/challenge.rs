use async_trait::async_trait;
use chrono::Duration;

use crate::{ChallengeSession, Error, SessionKey};

/// TTL-bound storage for pending ceremony sessions
///
/// Writing an existing key replaces it; the newest begin wins.
#[async_trait]
pub trait ChallengeStore: Send + Sync + 'static {
    async fn set(&self, key: &SessionKey, session: &ChallengeSession, ttl: Duration)
    -> Result<(), Error>;

    /// Returns `None` for missing and expired sessions alike
    async fn get(&self, key: &SessionKey) -> Result<Option<ChallengeSession>, Error>;

    async fn delete(&self, key: &SessionKey) -> Result<(), Error>;
}

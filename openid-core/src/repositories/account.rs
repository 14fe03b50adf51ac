use async_trait::async_trait;

use crate::{Account, AccountId, Error};

/// Read access to the accounts owned by the account management service
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;
}

use dispatch_store::StoreError;
use thiserror::Error;

/// Handler failure. Returned to the delivery substrate, which redelivers the
/// event; every handler is idempotent so redelivery is always safe.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Store(StoreError::Unavailable(_)))
    }
}

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Network/backend failure. Always safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn unavailable<E: std::fmt::Display>(e: E) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}

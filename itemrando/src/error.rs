use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FillError {
    /// An item or location was requested while every pool it could come from
    /// was empty. Pool bookkeeping is broken; the run must not continue.
    #[error("pool exhausted: {pool}")]
    PoolExhausted { pool: &'static str },

    /// Neither forcing nor guessing can make progress. Retry with a new seed.
    #[error("unsolvable configuration: {0}")]
    UnsolvableConfiguration(String),

    #[error("invalid settings combination: {0}")]
    InvalidSettingsCombination(String),
}

impl FillError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FillError::UnsolvableConfiguration(_))
    }
}

pub type FillResult<T> = std::result::Result<T, FillError>;

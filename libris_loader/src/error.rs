use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a [`GroupedFetch`](crate::GroupedFetch) collaborator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FetchError(#[from] Box<dyn std::error::Error + Send + Sync>);

impl FetchError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self(err.into())
    }
}

/// Reasons a [`Load`](crate::Load) can be rejected.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The grouped fetch failed. Every load pending in the window observes
    /// the same shared error; partial results are not salvaged.
    #[error("batch fetch failed: {0}")]
    BatchFetchFailure(Arc<FetchError>),

    /// The scope was cancelled before the window resolved.
    #[error("load cancelled before the batch resolved")]
    Cancelled,
}

pub type LoadResult<V> = Result<Arc<[V]>, LoadError>;

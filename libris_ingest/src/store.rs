use std::fmt::{Debug, Display};

use async_trait::async_trait;
use thiserror::Error;

use crate::item::IngestItem;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the write because the natural key is taken. Lets a
    /// store report a uniqueness race that slipped past the pre-check.
    #[error("natural key `{0}` already exists")]
    Duplicate(String),

    #[error("referenced entity `{0}` does not exist")]
    MissingReference(String),

    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Persistence collaborator used by an [`IngestSession`](crate::IngestSession).
#[async_trait]
pub trait IngestStore: Send + Sync {
    type ParentKey: Clone + Debug + Display + Send + Sync + 'static;
    type Record: Clone + Debug + Send + Sync + 'static;

    async fn parent_exists(&self, key: &Self::ParentKey) -> Result<bool, StoreError>;

    async fn natural_key_exists(&self, natural_key: &str) -> Result<bool, StoreError>;

    async fn save(&self, item: &IngestItem<Self::ParentKey>) -> Result<Self::Record, StoreError>;
}

/// Observer notified after every successfully persisted item.
pub trait IngestHook<R>: Send + Sync {
    fn on_created(&self, record: &R);
}

impl<R, F> IngestHook<R> for F
where
    F: Fn(&R) + Send + Sync,
{
    fn on_created(&self, record: &R) {
        self(record);
    }
}

use std::{collections::HashMap, future::Future};

use async_trait::async_trait;

use crate::error::FetchError;

/// The grouped-fetch collaborator behind a [`KeyBatcher`](crate::KeyBatcher).
///
/// `keys` is duplicate-free and may be empty only if called directly; the
/// batcher itself never dispatches an empty window. Keys missing from the
/// returned map resolve to an empty sequence, and the order of map entries
/// carries no meaning. Values within one key keep the order the fetch
/// returned them in.
#[async_trait]
pub trait GroupedFetch<K, V>: Send + Sync {
    async fn fetch_grouped(&self, keys: &[K]) -> Result<HashMap<K, Vec<V>>, FetchError>;
}

/// Adapts an async closure into a [`GroupedFetch`].
#[derive(Debug, Clone, Copy)]
pub struct FetchFn<F>(F);

pub fn fetch_fn<F>(f: F) -> FetchFn<F> {
    FetchFn(f)
}

#[async_trait]
impl<K, V, F, Fut> GroupedFetch<K, V> for FetchFn<F>
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<K, Vec<V>>, FetchError>> + Send,
{
    async fn fetch_grouped(&self, keys: &[K]) -> Result<HashMap<K, Vec<V>>, FetchError> {
        (self.0)(keys.to_vec()).await
    }
}

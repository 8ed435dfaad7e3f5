//! # Batched key resolution
//!
//! A [`KeyBatcher`] coalesces point lookups issued during one resolution scope
//! into a single grouped fetch. Create one batcher per inbound request, hand
//! clones of it to every resolver of that request, and drop it when the
//! request finishes. Batchers are never shared across requests, so no value
//! memoized for one request is ever visible to another.
//!
//! ```
//! # use std::collections::HashMap;
//! # use libris_loader::{KeyBatcher, fetch_fn, FetchError};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let batcher = KeyBatcher::new(fetch_fn(|keys: Vec<u32>| async move {
//!     Ok::<_, FetchError>(keys.into_iter().map(|k| (k, vec![k * 10])).collect::<HashMap<_, _>>())
//! }));
//! let (a, b) = tokio::join!(batcher.load(1), batcher.load(2));
//! assert_eq!(&*a.unwrap(), &[10]);
//! assert_eq!(&*b.unwrap(), &[20]);
//! # }
//! ```

mod batcher;
mod error;
mod fetch;

pub use batcher::{DispatchMode, KeyBatcher, Load, WindowPhase};
pub use error::{FetchError, LoadError, LoadResult};
pub use fetch::{FetchFn, GroupedFetch, fetch_fn};

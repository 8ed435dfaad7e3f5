use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::{self, Debug, Formatter},
    future::Future,
    hash::Hash,
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    error::{FetchError, LoadError, LoadResult},
    fetch::GroupedFetch,
};

/// How a window decides when to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// The first poll of any pending [`Load`] schedules a dispatch task on the
    /// current tokio runtime. The task yields once before flushing, so loads
    /// registered by concurrently running resolvers still join the window.
    #[default]
    Auto,
    /// Nothing is dispatched until [`KeyBatcher::flush`] is called. Keys
    /// first requested after a flush wait for the next one.
    Manual,
}

/// Observable lifecycle of a batch window.
///
/// Each window moves `Collecting → Dispatching → Resolved | Failed`, or to
/// `Cancelled` together with its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Collecting,
    Dispatching,
    Resolved,
    Failed,
    Cancelled,
}

type Waiters<K, V> = HashMap<K, Vec<oneshot::Sender<LoadResult<V>>>>;

/// Keys collected for the next dispatch.
struct OpenWindow<K, V> {
    /// Distinct keys in registration order.
    keys: Vec<K>,
    waiters: Waiters<K, V>,
    scheduled: bool,
}

impl<K, V> Default for OpenWindow<K, V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            waiters: HashMap::new(),
            scheduled: false,
        }
    }
}

struct ScopeState<K, V> {
    open: OpenWindow<K, V>,
    /// Waiters of keys whose window is being fetched.
    in_flight: Waiters<K, V>,
    memo: HashMap<K, LoadResult<V>>,
    last: Option<WindowPhase>,
    cancelled: bool,
}

struct Scope<K, V> {
    fetch: Box<dyn GroupedFetch<K, V>>,
    mode: DispatchMode,
    state: Mutex<ScopeState<K, V>>,
}

/// Per-scope batcher.
///
/// Clones share the scope. Keys registered before a dispatch form one window
/// whose grouped fetch runs exactly once. Keys first requested after that
/// dispatch open the next window. Every result is memoized until the scope
/// is dropped.
pub struct KeyBatcher<K, V> {
    scope: Arc<Scope<K, V>>,
}

impl<K, V> Clone for KeyBatcher<K, V> {
    fn clone(&self) -> Self {
        Self {
            scope: Arc::clone(&self.scope),
        }
    }
}

impl<K, V> KeyBatcher<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new<F>(fetch: F) -> Self
    where
        F: GroupedFetch<K, V> + 'static,
    {
        Self::with_mode(fetch, DispatchMode::default())
    }

    pub fn with_mode<F>(fetch: F, mode: DispatchMode) -> Self
    where
        F: GroupedFetch<K, V> + 'static,
    {
        Self {
            scope: Arc::new(Scope {
                fetch: Box::new(fetch),
                mode,
                state: Mutex::new(ScopeState {
                    open: OpenWindow::default(),
                    in_flight: HashMap::new(),
                    memo: HashMap::new(),
                    last: None,
                    cancelled: false,
                }),
            }),
        }
    }

    /// Requests the values grouped under `key`.
    ///
    /// The key is registered immediately. A key already resolved in this
    /// scope is answered from the memo, a key being fetched joins that fetch,
    /// and any other key waits for the next dispatch. Equal keys share one
    /// result allocation.
    pub fn load(&self, key: K) -> Load<K, V> {
        let mut guard = self.scope.state.lock();
        let state = &mut *guard;
        if let Some(result) = state.memo.get(&key) {
            return Load::ready(result.clone());
        }
        if state.cancelled {
            return Load::ready(Err(LoadError::Cancelled));
        }

        let (tx, rx) = oneshot::channel();
        if let Some(senders) = state.in_flight.get_mut(&key) {
            senders.push(tx);
        } else {
            let open = &mut state.open;
            match open.waiters.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().push(tx),
                Entry::Vacant(entry) => {
                    open.keys.push(entry.key().clone());
                    entry.insert(vec![tx]);
                }
            }
        }
        Load::waiting(self.clone(), rx)
    }

    /// Loads several keys through the window, returning results in the
    /// order of `keys`.
    ///
    /// # Errors
    ///
    /// Returns the first load error, which for a failed fetch is the shared
    /// [`LoadError::BatchFetchFailure`].
    pub async fn load_many<I>(&self, keys: I) -> Result<Vec<Arc<[V]>>, LoadError>
    where
        I: IntoIterator<Item = K>,
    {
        let loads: Vec<_> = keys.into_iter().map(|key| self.load(key)).collect();
        futures::future::try_join_all(loads).await
    }

    /// Dispatches the open window now.
    ///
    /// Does nothing if no key is waiting (the fetch is never invoked for an
    /// empty key set) or if the scope was cancelled. Dropping this future
    /// mid-fetch cancels the scope.
    pub async fn flush(&self) {
        let keys = {
            let mut guard = self.scope.state.lock();
            let state = &mut *guard;
            if state.cancelled || state.open.keys.is_empty() {
                return;
            }
            let OpenWindow { keys, waiters, .. } = mem::take(&mut state.open);
            state.in_flight.extend(waiters);
            keys
        };

        debug!(keys = keys.len(), "dispatching batch window");

        let mut guard = DispatchGuard {
            batcher: self,
            armed: true,
        };
        let result = self.scope.fetch.fetch_grouped(&keys).await;
        guard.armed = false;

        self.resolve(keys, result);
    }

    /// Rejects every pending load with [`LoadError::Cancelled`].
    ///
    /// A fetch already in flight is left to finish and its result discarded.
    /// Keys resolved before the cancellation stay readable; any other key is
    /// rejected from then on.
    pub fn cancel(&self) {
        let mut guard = self.scope.state.lock();
        let state = &mut *guard;
        if mem::replace(&mut state.cancelled, true) {
            return;
        }
        let open = mem::take(&mut state.open);
        let pending = open.waiters.into_values().chain(state.in_flight.drain().map(|(_, v)| v));
        for tx in pending.flatten() {
            let _ = tx.send(Err(LoadError::Cancelled));
        }
    }

    /// Phase of the most recent window.
    pub fn phase(&self) -> WindowPhase {
        let state = self.scope.state.lock();
        if state.cancelled {
            WindowPhase::Cancelled
        } else if !state.in_flight.is_empty() {
            WindowPhase::Dispatching
        } else if !state.open.keys.is_empty() {
            WindowPhase::Collecting
        } else {
            state.last.unwrap_or(WindowPhase::Collecting)
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.scope.mode
    }

    fn resolve(&self, keys: Vec<K>, result: Result<HashMap<K, Vec<V>>, FetchError>) {
        let mut guard = self.scope.state.lock();
        let state = &mut *guard;
        if state.cancelled {
            debug!("discarding batch result of a cancelled scope");
            return;
        }

        let mut outcome = result.map_err(|err| {
            warn!(error = %err, keys = keys.len(), "batch fetch failed");
            LoadError::BatchFetchFailure(Arc::new(err))
        });
        state.last = Some(match outcome {
            Ok(_) => WindowPhase::Resolved,
            Err(_) => WindowPhase::Failed,
        });

        for key in keys {
            let result: LoadResult<V> = match &mut outcome {
                Ok(grouped) => Ok(grouped.remove(&key).unwrap_or_default().into()),
                Err(err) => Err(err.clone()),
            };
            for tx in state.in_flight.remove(&key).into_iter().flatten() {
                let _ = tx.send(result.clone());
            }
            state.memo.insert(key, result);
        }
    }

    fn schedule_dispatch(&self) {
        if self.scope.mode == DispatchMode::Manual {
            return;
        }
        {
            let mut state = self.scope.state.lock();
            if state.open.scheduled || state.open.keys.is_empty() {
                return;
            }
            state.open.scheduled = true;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let batcher = self.clone();
                handle.spawn(async move {
                    tokio::task::yield_now().await;
                    batcher.flush().await;
                });
            }
            Err(_) => {
                warn!("no tokio runtime to dispatch on, window waits for an explicit flush");
                self.scope.state.lock().open.scheduled = false;
            }
        }
    }
}

impl<K, V> Debug for KeyBatcher<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBatcher")
            .field("mode", &self.scope.mode)
            .field("phase", &self.phase())
            .finish()
    }
}

struct DispatchGuard<'a, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    batcher: &'a KeyBatcher<K, V>,
    armed: bool,
}

impl<K, V> Drop for DispatchGuard<'_, K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.armed {
            self.batcher.cancel();
        }
    }
}

/// Future returned by [`KeyBatcher::load`].
pub struct Load<K, V> {
    inner: LoadInner<K, V>,
}

enum LoadInner<K, V> {
    Ready(Option<LoadResult<V>>),
    Waiting {
        batcher: KeyBatcher<K, V>,
        rx: oneshot::Receiver<LoadResult<V>>,
        polled: bool,
    },
}

impl<K, V> Load<K, V> {
    fn ready(result: LoadResult<V>) -> Self {
        Self {
            inner: LoadInner::Ready(Some(result)),
        }
    }

    fn waiting(batcher: KeyBatcher<K, V>, rx: oneshot::Receiver<LoadResult<V>>) -> Self {
        Self {
            inner: LoadInner::Waiting {
                batcher,
                rx,
                polled: false,
            },
        }
    }
}

impl<K, V> Future for Load<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Output = LoadResult<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            LoadInner::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(LoadError::Cancelled)))
            }
            LoadInner::Waiting {
                batcher,
                rx,
                polled,
            } => {
                if !*polled {
                    *polled = true;
                    batcher.schedule_dispatch();
                }
                match Pin::new(rx).poll(cx) {
                    Poll::Ready(Ok(result)) => Poll::Ready(result),
                    // Sender dropped without an answer: the window went away.
                    Poll::Ready(Err(_)) => Poll::Ready(Err(LoadError::Cancelled)),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

impl<K, V> Debug for Load<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = match &self.inner {
            LoadInner::Ready(_) => "ready",
            LoadInner::Waiting { .. } => "waiting",
        };
        f.debug_struct("Load").field("state", &state).finish()
    }
}

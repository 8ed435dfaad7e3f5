use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
    error::{IngestError, TransportAbort},
    item::{IngestFailure, IngestItem, IngestSummary, ItemOutcome, ItemResult},
    store::{IngestHook, IngestStore},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Open,
    /// An item is being validated and persisted.
    Validating,
    /// End of input was signalled and the summary is being produced.
    Closing,
    Closed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

/// Processes creation requests one at a time against an [`IngestStore`].
///
/// Items are handled strictly in submission order; each is checked for a
/// well-formed payload, an existing parent and an unused natural key, then
/// persisted. Successes are never rolled back by later failures.
pub struct IngestSession<S: IngestStore> {
    store: Arc<S>,
    hook: Option<Arc<dyn IngestHook<S::Record>>>,
    state: SessionState,
    summary: IngestSummary,
    next_sequence: u64,
}

/// Marks the session aborted when a submit future is dropped before the item
/// finished processing.
struct SubmitGuard<'a> {
    state: &'a mut SessionState,
    sequence: u64,
    finished: bool,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(sequence = self.sequence, "ingest item dropped mid-flight");
            *self.state = SessionState::Aborted;
        }
    }
}

impl<S: IngestStore> IngestSession<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            hook: None,
            state: SessionState::Open,
            summary: IngestSummary::default(),
            next_sequence: 0,
        }
    }

    pub fn with_hook<H>(mut self, hook: H) -> Self
    where
        H: IngestHook<S::Record> + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn summary(&self) -> IngestSummary {
        self.summary
    }

    /// Processes one item and returns its result.
    ///
    /// # Errors
    ///
    /// [`IngestError::SessionClosed`] once end of input or an abort was seen.
    /// Item-level problems are reported inside the returned result.
    pub async fn submit(
        &mut self,
        item: IngestItem<S::ParentKey>,
    ) -> Result<ItemResult<S::Record>, IngestError> {
        if self.state != SessionState::Open {
            return Err(IngestError::SessionClosed(self.state));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let mut guard = SubmitGuard {
            state: &mut self.state,
            sequence,
            finished: false,
        };
        *guard.state = SessionState::Validating;
        let outcome = match process(self.store.as_ref(), &item).await {
            Ok(record) => ItemOutcome::Succeeded(record),
            Err(failure) => ItemOutcome::Failed(failure),
        };
        guard.finished = true;
        drop(guard);
        self.state = SessionState::Open;

        self.summary.record(&outcome);
        match &outcome {
            ItemOutcome::Succeeded(record) => {
                debug!(sequence, natural_key = %item.natural_key, "ingested item");
                if let Some(hook) = &self.hook {
                    hook.on_created(record);
                }
            }
            ItemOutcome::Failed(failure) => {
                debug!(
                    sequence,
                    natural_key = %item.natural_key,
                    kind = ?failure.kind,
                    "rejected item: {}",
                    failure.message
                );
            }
        }

        Ok(ItemResult { sequence, outcome })
    }

    /// Closes the session normally and returns the final summary.
    ///
    /// # Errors
    ///
    /// [`IngestError::SessionClosed`] if the session already ended.
    pub fn end_of_input(&mut self) -> Result<IngestSummary, IngestError> {
        if self.state != SessionState::Open {
            return Err(IngestError::SessionClosed(self.state));
        }
        self.state = SessionState::Closing;
        info!(
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            "ingest session completed"
        );
        self.state = SessionState::Closed;
        Ok(self.summary)
    }

    /// Ends the session on a transport failure. Items already persisted stay
    /// persisted; the returned summary covers them.
    pub fn abort(&mut self, reason: TransportAbort) -> IngestSummary {
        if self.state.is_terminal() {
            return self.summary;
        }
        error!(
            succeeded = self.summary.succeeded,
            failed = self.summary.failed,
            "ingest session aborted: {reason}"
        );
        self.state = SessionState::Aborted;
        self.summary
    }
}

impl<S: IngestStore> Debug for IngestSession<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestSession")
            .field("state", &self.state)
            .field("summary", &self.summary)
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

async fn process<S: IngestStore>(
    store: &S,
    item: &IngestItem<S::ParentKey>,
) -> Result<S::Record, IngestFailure> {
    item.validate()?;
    if !store.parent_exists(&item.parent_key).await? {
        return Err(IngestFailure::reference_not_found(&item.parent_key));
    }
    if store.natural_key_exists(&item.natural_key).await? {
        return Err(IngestFailure::duplicate_key(&item.natural_key));
    }
    Ok(store.save(item).await?)
}

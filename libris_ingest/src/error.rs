use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::session::SessionState;

/// The client side of a streaming exchange went away or signalled an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportAbort {
    reason: String,
}

impl TransportAbort {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for TransportAbort {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.reason.fmt(f)
    }
}

impl std::error::Error for TransportAbort {}

/// Session-level errors. Item-level problems are reported as
/// [`IngestFailure`](crate::IngestFailure) results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("ingest session no longer accepts input (state: {0:?})")]
    SessionClosed(SessionState),

    #[error("ingest session task is gone")]
    Disconnected,

    #[error("transport aborted: {0}")]
    TransportAbort(#[from] TransportAbort),
}

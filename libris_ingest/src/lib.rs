//! # Streaming ingestion
//!
//! An [`IngestSession`] consumes an ordered sequence of creation requests,
//! validates and persists each one on its own, and answers every request with
//! exactly one [`ItemResult`]. A failing item becomes a failure result; it
//! never ends the session. Closing the input yields one trailing
//! [`IngestSummary`].
//!
//! [`spawn_session`] wraps a session in a channel pair for transports that
//! speak bidirectional streams.

mod channel;
mod error;
mod item;
mod session;
mod store;

pub use channel::{IngestCommand, IngestInput, IngestOutputStream, run_session, spawn_session};
pub use error::{IngestError, TransportAbort};
pub use item::{
    FailureKind, IngestFailure, IngestItem, IngestOutput, IngestSummary, ItemOutcome, ItemResult,
};
pub use session::{IngestSession, SessionState};
pub use store::{IngestHook, IngestStore, StoreError};

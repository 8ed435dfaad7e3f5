use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvError {
    /// The bounded buffer overflowed and this many events were dropped.
    /// Delivery continues with the next buffered event.
    #[error("subscription lagged, {0} events dropped")]
    Lagged(u64),
    /// The subscription was cancelled or the broadcaster shut down, and
    /// nothing is left in the buffer.
    #[error("subscription closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no event buffered")]
    Empty,
    #[error("subscription lagged, {0} events dropped")]
    Lagged(u64),
    #[error("subscription closed")]
    Closed,
}

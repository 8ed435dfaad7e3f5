use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

use crate::id::Id;

/// Generator for ids bound to one worker number.
///
/// Every node of a deployment gets its own worker number, so two nodes never
/// produce the same id for the same millisecond.
#[derive(Debug, Clone, Copy)]
pub struct WorkerIdGenerator {
    worker: u16,
    next: u16,
}

/// Pause after the sequence wraps, so the next id lands in a later millisecond.
const WRAP_PAUSE: Duration = Duration::from_millis(1);

impl WorkerIdGenerator {
    #[must_use]
    pub const fn new(worker: u16) -> Self {
        Self { worker, next: 0 }
    }

    #[must_use]
    pub const fn worker(&self) -> u16 {
        self.worker
    }

    /// Generates a new id.
    ///
    /// # Examples
    ///
    /// ```
    /// use libris_common::id::worker::WorkerIdGenerator;
    ///
    /// let mut g = WorkerIdGenerator::new(1);
    /// assert_ne!(g.generate(), g.generate());
    /// ```
    pub fn generate(&mut self) -> Id {
        let id = Id::from_worker_parts(OffsetDateTime::now_utc(), self.worker, self.next);
        if self.advance() {
            thread::sleep(WRAP_PAUSE);
        }
        id
    }

    /// The same as [`Self::generate`] but yields to the runtime on wrap.
    #[cfg(feature = "tokio")]
    pub async fn generate_async(&mut self) -> Id {
        let id = Id::from_worker_parts(OffsetDateTime::now_utc(), self.worker, self.next);
        if self.advance() {
            tokio::time::sleep(WRAP_PAUSE).await;
        }
        id
    }

    /// Returns `true` when the sequence wrapped around.
    fn advance(&mut self) -> bool {
        self.next = self.next.wrapping_add(1);
        self.next == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let mut g = WorkerIdGenerator::new(42);
        let id = g.generate();
        let (_timestamp, worker, sequence) = id.decode_worker();
        assert_eq!(worker, 42);
        assert_ne!(sequence, g.generate().decode_worker().2);
    }

    #[test]
    fn wraps_sequence() {
        use std::collections::HashSet;

        let mut g = WorkerIdGenerator::new(1);
        g.next = u16::MAX - 1;
        let ids: HashSet<_> = (0..4).map(|_| g.generate()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn generate_async() {
        let mut g = WorkerIdGenerator::new(7);
        let a = g.generate_async().await;
        let b = g.generate_async().await;
        assert_ne!(a, b);
        assert_eq!(b.decode_worker().1, 7);
    }
}

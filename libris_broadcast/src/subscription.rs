use std::{
    fmt::{self, Debug, Display, Formatter},
    future::poll_fn,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll},
};

use futures::Stream;

use crate::{
    broadcaster::Shared,
    buffer::DeliveryBuffer,
    error::{RecvError, TryRecvError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A live, filtered view of the events published after its creation.
///
/// Also a [`Stream`] of `Result<Arc<E>, RecvError>`; the stream only yields
/// [`RecvError::Lagged`] errors and ends once the subscription is closed.
/// Dropping a subscription unsubscribes it.
pub struct Subscription<E> {
    id: SubscriptionId,
    buffer: Arc<DeliveryBuffer<E>>,
    owner: Weak<Shared<E>>,
    active: bool,
}

impl<E> Subscription<E> {
    pub(crate) fn new(
        id: SubscriptionId,
        buffer: Arc<DeliveryBuffer<E>>,
        owner: Weak<Shared<E>>,
    ) -> Self {
        Self {
            id,
            buffer,
            owner,
            active: true,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event.
    ///
    /// # Errors
    ///
    /// [`RecvError::Lagged`] if events were dropped since the last receive,
    /// [`RecvError::Closed`] once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Result<Arc<E>, RecvError> {
        poll_fn(|cx| self.buffer.poll_recv(cx)).await
    }

    pub fn try_recv(&mut self) -> Result<Arc<E>, TryRecvError> {
        self.buffer.try_recv()
    }

    /// Number of events waiting to be received.
    pub fn backlog(&self) -> usize {
        self.buffer.len()
    }

    /// Stops delivery and discards everything still buffered. Idempotent.
    pub fn unsubscribe(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.remove(self.id);
        }
        self.buffer.discard();
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<E> Stream for Subscription<E> {
    type Item = Result<Arc<E>, RecvError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.buffer.poll_recv(cx) {
            Poll::Ready(Err(RecvError::Closed)) => Poll::Ready(None),
            Poll::Ready(item) => Poll::Ready(Some(item)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<E> Debug for Subscription<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("backlog", &self.backlog())
            .finish()
    }
}

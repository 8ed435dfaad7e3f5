use std::{
    collections::VecDeque,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use parking_lot::Mutex;

use crate::{
    config::{BufferPolicy, OverflowPolicy},
    error::{RecvError, TryRecvError},
};

/// Result of pushing one event into a subscriber's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Delivered,
    /// An event was dropped. `first` is set when this drop starts a new lag
    /// run, i.e. the consumer had caught up since the previous drop.
    Overflowed { first: bool },
    Closed,
}

struct BufferState<E> {
    queue: VecDeque<Arc<E>>,
    lagged: u64,
    /// Events still to deliver before the lag is reported.
    lag_at: usize,
    closed: bool,
    waker: Option<Waker>,
}

/// Single-consumer delivery queue owned by one subscription.
pub(crate) struct DeliveryBuffer<E> {
    policy: BufferPolicy,
    state: Mutex<BufferState<E>>,
}

impl<E> DeliveryBuffer<E> {
    pub fn new(policy: BufferPolicy) -> Self {
        let queue = match policy {
            BufferPolicy::Unbounded => VecDeque::new(),
            BufferPolicy::Bounded { capacity, .. } => VecDeque::with_capacity(capacity.max(1)),
        };
        Self {
            policy,
            state: Mutex::new(BufferState {
                queue,
                lagged: 0,
                lag_at: 0,
                closed: false,
                waker: None,
            }),
        }
    }

    pub fn closed(policy: BufferPolicy) -> Self {
        let buffer = Self::new(policy);
        buffer.state.lock().closed = true;
        buffer
    }

    pub fn push(&self, event: Arc<E>) -> PushOutcome {
        let (outcome, waker) = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            let outcome = match self.policy {
                BufferPolicy::Bounded { capacity, overflow }
                    if state.queue.len() >= capacity.max(1) =>
                {
                    let first = state.lagged == 0;
                    state.lagged += 1;
                    match overflow {
                        OverflowPolicy::DropOldest => {
                            state.queue.pop_front();
                            state.queue.push_back(event);
                        }
                        OverflowPolicy::DropNewest if first => state.lag_at = state.queue.len(),
                        OverflowPolicy::DropNewest => {}
                    }
                    PushOutcome::Overflowed { first }
                }
                _ => {
                    state.queue.push_back(event);
                    PushOutcome::Delivered
                }
            };
            (outcome, state.waker.take())
        };

        if let Some(waker) = waker {
            waker.wake();
        }
        outcome
    }

    /// Stops accepting events. Buffered events stay readable.
    pub fn close(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.closed = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Stops accepting events and drops whatever is buffered.
    pub fn discard(&self) {
        let waker = {
            let mut state = self.state.lock();
            state.closed = true;
            state.queue.clear();
            state.lagged = 0;
            state.lag_at = 0;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn try_recv(&self) -> Result<Arc<E>, TryRecvError> {
        let mut state = self.state.lock();
        Self::take(&mut state).unwrap_or(if state.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        })
    }

    pub fn poll_recv(&self, cx: &mut Context<'_>) -> Poll<Result<Arc<E>, RecvError>> {
        let mut state = self.state.lock();
        match Self::take(&mut state) {
            Some(Ok(event)) => Poll::Ready(Ok(event)),
            Some(Err(TryRecvError::Lagged(n))) => Poll::Ready(Err(RecvError::Lagged(n))),
            Some(Err(_)) | None if state.closed => Poll::Ready(Err(RecvError::Closed)),
            _ => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    /// Lag is reported where the first dropped event would have been.
    fn take(state: &mut BufferState<E>) -> Option<Result<Arc<E>, TryRecvError>> {
        if state.lagged > 0 && state.lag_at == 0 {
            let lagged = std::mem::take(&mut state.lagged);
            return Some(Err(TryRecvError::Lagged(lagged)));
        }
        let event = state.queue.pop_front()?;
        state.lag_at = state.lag_at.saturating_sub(1);
        Some(Ok(event))
    }
}

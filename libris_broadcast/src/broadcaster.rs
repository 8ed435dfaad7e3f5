use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::{
    buffer::{DeliveryBuffer, PushOutcome},
    config::BroadcastConfig,
    subscription::{Subscription, SubscriptionId},
};

/// Subscription filter. Events it rejects are never buffered.
pub type EventPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Counts for one [`EventBroadcaster::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub filtered: usize,
    /// Subscribers whose bounded buffer overflowed on this event.
    pub overflowed: usize,
}

struct Subscriber<E> {
    buffer: Arc<DeliveryBuffer<E>>,
    predicate: Option<EventPredicate<E>>,
}

struct Registry<E> {
    subscribers: HashMap<SubscriptionId, Subscriber<E>>,
    shut_down: bool,
}

pub(crate) struct Shared<E> {
    config: BroadcastConfig,
    registry: RwLock<Registry<E>>,
    next_id: AtomicU64,
}

impl<E> Shared<E> {
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.write().subscribers.remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.buffer.discard();
                debug!(subscription = %id, "unsubscribed");
                true
            }
            None => false,
        }
    }
}

/// Multicast channel for domain events.
///
/// Cloning yields another handle to the same registry.
pub struct EventBroadcaster<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for EventBroadcaster<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> Default for EventBroadcaster<E> {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

impl<E> EventBroadcaster<E> {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: RwLock::new(Registry {
                    subscribers: HashMap::new(),
                    shut_down: false,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.shared.config
    }

    /// Subscribes to every event published from now on.
    pub fn subscribe(&self) -> Subscription<E> {
        self.subscribe_with(None)
    }

    /// Subscribes to the events accepted by `predicate`.
    pub fn subscribe_filtered<P>(&self, predicate: P) -> Subscription<E>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.subscribe_with(Some(Arc::new(predicate)))
    }

    pub fn subscribe_with(&self, predicate: Option<EventPredicate<E>>) -> Subscription<E> {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let policy = self.shared.config.buffer;

        let mut registry = self.shared.registry.write();
        if registry.shut_down {
            debug!(subscription = %id, "subscribed after shutdown");
            return Subscription::new(
                id,
                Arc::new(DeliveryBuffer::closed(policy)),
                Arc::downgrade(&self.shared),
            );
        }

        let buffer = Arc::new(DeliveryBuffer::new(policy));
        registry.subscribers.insert(
            id,
            Subscriber {
                buffer: Arc::clone(&buffer),
                predicate,
            },
        );
        debug!(
            subscription = %id,
            subscribers = registry.subscribers.len(),
            "subscribed"
        );

        Subscription::new(id, buffer, Arc::downgrade(&self.shared))
    }

    /// Delivers `event` to every matching subscription registered right now.
    ///
    /// Never blocks on consumers and never fails. With no subscribers the
    /// event is simply dropped. Predicates run outside the registry lock; a
    /// predicate that panics counts as filtered and its subscription is
    /// closed.
    pub fn publish(&self, event: E) -> PublishReport {
        let event = Arc::new(event);
        let mut report = PublishReport::default();

        let recipients: Vec<_> = {
            let registry = self.shared.registry.read();
            if registry.shut_down {
                return report;
            }
            registry
                .subscribers
                .iter()
                .map(|(id, subscriber)| {
                    (
                        *id,
                        Arc::clone(&subscriber.buffer),
                        subscriber.predicate.clone(),
                    )
                })
                .collect()
        };

        for (id, buffer, predicate) in recipients {
            if let Some(predicate) = predicate {
                match panic::catch_unwind(AssertUnwindSafe(|| predicate(&*event))) {
                    Ok(true) => {}
                    Ok(false) => {
                        report.filtered += 1;
                        continue;
                    }
                    Err(_) => {
                        error!(subscription = %id, "subscription predicate panicked, closing it");
                        report.filtered += 1;
                        self.shared.remove(id);
                        continue;
                    }
                }
            }
            match buffer.push(Arc::clone(&event)) {
                PushOutcome::Delivered => report.delivered += 1,
                PushOutcome::Overflowed { first } => {
                    report.overflowed += 1;
                    if first {
                        warn!(subscription = %id, "subscriber buffer full, dropping events");
                    }
                }
                PushOutcome::Closed => {}
            }
        }

        trace!(
            delivered = report.delivered,
            filtered = report.filtered,
            overflowed = report.overflowed,
            "published event"
        );
        report
    }

    /// Cancels a subscription by id, discarding its buffered events.
    ///
    /// Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.read().subscribers.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.registry.read().shut_down
    }

    /// Releases every subscription.
    ///
    /// Live subscriptions can still drain what they hold, then observe
    /// [`RecvError::Closed`](crate::RecvError::Closed). Later publishes are
    /// ignored and later subscriptions start closed.
    pub fn shutdown(&self) {
        let mut registry = self.shared.registry.write();
        if registry.shut_down {
            return;
        }
        registry.shut_down = true;
        let released = registry.subscribers.len();
        for (_, subscriber) in registry.subscribers.drain() {
            subscriber.buffer.close();
        }
        info!(released, "event broadcaster shut down");
    }
}

impl<E> Debug for EventBroadcaster<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("config", &self.shared.config)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

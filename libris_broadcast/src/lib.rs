//! # Event broadcast
//!
//! An [`EventBroadcaster`] fans every published event out to the
//! subscriptions registered at publish time. Each subscription owns its own
//! delivery buffer, so a consumer that drains slowly only delays itself.
//! There is no replay: a subscription sees events published after it was
//! created and nothing else.
//!
//! The broadcaster is an ordinary value. Construct it once at startup, pass
//! clones to whatever publishes or subscribes, and call
//! [`EventBroadcaster::shutdown`] on teardown to release every subscription.

mod broadcaster;
mod buffer;
mod config;
mod error;
mod subscription;

pub use broadcaster::{EventBroadcaster, EventPredicate, PublishReport};
pub use config::{BroadcastConfig, BufferPolicy, OverflowPolicy};
pub use error::{RecvError, TryRecvError};
pub use subscription::{Subscription, SubscriptionId};

//! Fleetplane Event Bus - typed publish/subscribe with per-subscriber buffers
//!
//! One [`EventBus`] serves one topic. Every subscriber owns a bounded
//! channel; publishing never waits on a subscriber, and an event that does
//! not fit a full channel is dropped for that subscriber only.

pub mod bus;
pub mod options;
pub mod subscription;

pub use bus::{EventBus, DEFAULT_CHANNEL_CAPACITY};
pub use options::SubscriptionOptions;
pub use subscription::{Subscription, SubscriptionId};

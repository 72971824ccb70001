//! The event bus: one topic, many independently buffered subscribers

use crate::options::SubscriptionOptions;
use crate::subscription::{Subscription, SubscriptionId};
use dashmap::DashMap;
use fleetplane_core::{ChangeEvent, Notifier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Channel capacity used when a subscriber does not choose one.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

pub(crate) struct Registry<T> {
    topic: String,
    capacity: usize,
    subscribers: DashMap<SubscriptionId, mpsc::Sender<T>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl<T> Registry<T> {
    pub(crate) fn remove(&self, id: SubscriptionId) {
        if self.subscribers.remove(&id).is_some() {
            info!("Unsubscribed {} from {}", id, self.topic);
        }
    }
}

/// Publish/subscribe for one topic.
///
/// Cloning yields another handle on the same topic. Subscribe, unsubscribe
/// and publish may all run concurrently without outside locking.
pub struct EventBus<T> {
    inner: Arc<Registry<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topic", &self.inner.topic)
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_capacity(topic, DEFAULT_CHANNEL_CAPACITY)
    }

    /// A bus whose default subscriber channels hold `capacity` events.
    pub fn with_capacity(topic: impl Into<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Registry {
                topic: topic.into(),
                capacity: capacity.max(1),
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn subscribe(&self) -> Subscription<T> {
        self.subscribe_with(SubscriptionOptions::default())
    }

    /// Register a new subscriber. Only events published after this returns
    /// are delivered to it.
    pub fn subscribe_with(&self, options: SubscriptionOptions<T>) -> Subscription<T> {
        let (sender, receiver) = options.into_channel(self.inner.capacity);
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.insert(id, sender);
        info!("Subscribed {} to {}", id, self.inner.topic);
        Subscription::new(id, receiver, Arc::downgrade(&self.inner))
    }

    /// Same as [`Subscription::close`].
    pub fn unsubscribe(&self, subscription: &mut Subscription<T>) {
        subscription.close();
    }

    /// Deliver `event` to every current subscriber without waiting.
    ///
    /// A subscriber whose channel is full misses this event; the others are
    /// unaffected. Subscribers whose receiver has gone away are pruned.
    pub fn publish(&self, event: T) {
        let mut gone = Vec::new();
        for entry in self.inner.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("{} channel full on {}, event dropped", entry.key(), self.inner.topic);
                }
                Err(TrySendError::Closed(_)) => gone.push(*entry.key()),
            }
        }
        for id in gone {
            self.inner.remove(id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Events dropped so far because a subscriber's channel was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Subscribe to a projection of this topic.
    ///
    /// A spawned task reads every event, keeps those `filter` maps to
    /// `Some`, and relays them to the returned subscription. The task ends
    /// when `cancel` fires, when this bus is dropped, or on the first event
    /// after the returned subscription closes. Must be called inside a tokio
    /// runtime.
    pub fn subscribe_with_filter<R, F>(
        &self,
        mut filter: F,
        options: SubscriptionOptions<R>,
        cancel: CancellationToken,
    ) -> Subscription<R>
    where
        R: Clone + Send + 'static,
        F: FnMut(T) -> Option<R> + Send + 'static,
    {
        let mut source = self.subscribe();
        let relay = EventBus::with_capacity(format!("{}/filtered", self.inner.topic), self.inner.capacity);
        let (sender, receiver) = options.into_channel(self.inner.capacity);
        let outward = sender.clone();
        let subscription = relay.subscribe_with(SubscriptionOptions::new().with_channel(sender, receiver));
        let topic = self.inner.topic.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = outward.closed() => break,
                    event = source.recv() => match event {
                        Some(event) => {
                            if relay.subscriber_count() == 0 {
                                break;
                            }
                            if let Some(mapped) = filter(event) {
                                relay.publish(mapped);
                            }
                        }
                        None => break,
                    },
                }
            }
            source.close();
            debug!("Filtered relay on {} stopped", topic);
        });

        subscription
    }
}

impl<T> Notifier<T> for EventBus<ChangeEvent<T>>
where
    T: Clone + Send + Sync + 'static,
{
    fn notify(&self, event: ChangeEvent<T>) {
        self.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_bus() {
        let bus = EventBus::<u32>::new("t");
        let a = bus.subscribe();
        let b = bus.subscribe();
        assert_ne!(a.id(), b.id());
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn closed_receiver_is_pruned_on_publish() {
        let bus = EventBus::<u32>::new("t");
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        bus.inner.subscribers.insert(SubscriptionId(999), tx);
        let _live = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.dropped(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = EventBus::<u32>::with_capacity("t", 0);
        let mut sub = bus.subscribe();
        bus.publish(7);
        assert_eq!(sub.try_recv().ok(), Some(7));
    }
}

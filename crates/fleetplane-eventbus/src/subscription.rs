//! A subscriber's handle on a topic

use crate::bus::Registry;
use futures::Stream;
use std::sync::Weak;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

/// Subscriber identity, unique within a bus.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registered interest in a topic, backed by its own delivery channel.
///
/// A subscription is either active or closed. Closing deregisters it from
/// the bus and discards anything still buffered, so nothing is observed
/// after [`Subscription::close`] returns. Dropping a subscription closes it.
pub struct Subscription<T> {
    id: SubscriptionId,
    receiver: mpsc::Receiver<T>,
    registry: Weak<Registry<T>>,
    closed: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: SubscriptionId, receiver: mpsc::Receiver<T>, registry: Weak<Registry<T>>) -> Self {
        Self {
            id,
            receiver,
            registry,
            closed: false,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the next event. `None` once closed, or once the bus is gone
    /// and the buffer is empty.
    pub async fn recv(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        if self.closed {
            return Err(TryRecvError::Disconnected);
        }
        self.receiver.try_recv()
    }

    /// Number of events waiting in this subscriber's channel.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Deregister and discard buffered events. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
        debug!("Subscription {} closed", self.id);
    }

    pub fn into_stream(mut self) -> impl Stream<Item = T>
    where
        T: Send + 'static,
    {
        async_stream::stream! {
            while let Some(event) = self.recv().await {
                yield event;
            }
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish()
    }
}

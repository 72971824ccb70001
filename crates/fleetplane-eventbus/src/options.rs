//! Options accepted when subscribing to a bus

use tokio::sync::mpsc;

/// How a new subscription gets its delivery channel.
///
/// By default the bus allocates a bounded channel of its configured
/// capacity. A caller can pick the capacity, or hand over a channel it built
/// itself.
pub struct SubscriptionOptions<T> {
    channel: Option<(mpsc::Sender<T>, mpsc::Receiver<T>)>,
    capacity: Option<usize>,
}

impl<T> Default for SubscriptionOptions<T> {
    fn default() -> Self {
        Self {
            channel: None,
            capacity: None,
        }
    }
}

impl<T> SubscriptionOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver into this channel instead of allocating one.
    pub fn with_channel(mut self, sender: mpsc::Sender<T>, receiver: mpsc::Receiver<T>) -> Self {
        self.channel = Some((sender, receiver));
        self
    }

    /// Allocate a channel of this capacity. Ignored when a channel is supplied.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub(crate) fn into_channel(self, default_capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
        match self.channel {
            Some(channel) => channel,
            // tokio rejects zero-capacity channels
            None => mpsc::channel(self.capacity.unwrap_or(default_capacity).max(1)),
        }
    }
}

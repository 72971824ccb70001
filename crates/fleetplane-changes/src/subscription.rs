//! Filtered, batched change subscriptions for API consumers

use crate::error::Result;
use crate::filter::ChangeFilter;
use crate::query::Query;
use crate::selector::Selector;
use crate::source::ChangeSource;
use crate::suggest::{suggest, Suggestion};
use fleetplane_core::{ChangeEvent, Resource};
use fleetplane_eventbus::{SubscriptionId, DEFAULT_CHANNEL_CAPACITY};
use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Upper bound on events folded into one [`Changes`] batch by default.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone, Debug)]
pub struct ChangesOptions {
    /// Search query; see [`Query`].
    pub query: Option<String>,
    /// Label selector, `key=value,key2=value2`.
    pub selector: Option<String>,
    /// Start with an `Insert` for every matching item already stored.
    pub seed: bool,
    pub batch_size: usize,
    /// Attach query completions to each batch when a query is set.
    pub suggestions: bool,
    /// Batches buffered for the consumer.
    pub capacity: usize,
}

impl Default for ChangesOptions {
    fn default() -> Self {
        Self {
            query: None,
            selector: None,
            seed: false,
            batch_size: DEFAULT_BATCH_SIZE,
            suggestions: true,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ChangesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn seeded(mut self) -> Self {
        self.seed = true;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_suggestions(mut self, suggestions: bool) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// One delivery: the forwarded events plus advisory completions.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Changes<R> {
    pub changes: Vec<ChangeEvent<R>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    /// Terminal.
    Closed,
}

/// A consumer's filtered view of a change topic.
///
/// Backed by a spawned task that reads the raw topic, filters, batches and
/// forwards. Closing (or dropping) stops the task and discards anything not
/// yet received.
pub struct ChangesSubscription<R> {
    id: SubscriptionId,
    receiver: mpsc::Receiver<Changes<R>>,
    cancel: CancellationToken,
    state: SubscriptionState,
}

impl<R> ChangesSubscription<R> {
    /// Id of the underlying topic subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SubscriptionState::Closed
    }

    /// The next batch. `None` once closed.
    pub async fn recv(&mut self) -> Option<Changes<R>> {
        if self.is_closed() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = SubscriptionState::Closed;
        self.cancel.cancel();
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
        info!("Change subscription {} closed", self.id);
    }

    pub fn into_stream(mut self) -> impl Stream<Item = Changes<R>>
    where
        R: Send + 'static,
    {
        async_stream::stream! {
            while let Some(batch) = self.recv().await {
                yield batch;
            }
        }
    }
}

impl<R> Drop for ChangesSubscription<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R> std::fmt::Debug for ChangesSubscription<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesSubscription")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Subscribe to filtered changes from `source`. Must be called inside a
/// tokio runtime.
///
/// The raw topic is joined before the seed snapshot is taken, so a change
/// committed meanwhile is delivered after the seed rather than lost.
pub fn subscribe_changes<R, S>(source: Arc<S>, options: ChangesOptions) -> Result<ChangesSubscription<R>>
where
    R: Resource,
    S: ChangeSource<R> + ?Sized + 'static,
{
    let selector = match options.selector.as_deref() {
        Some(text) => Selector::parse(text)?,
        None => Selector::default(),
    };
    let query = Query::parse(options.query.as_deref().unwrap_or_default());
    let mut filter = ChangeFilter::new(query, selector);

    let mut events = source.subscribe();
    let id = events.id();
    let seeded = if options.seed {
        filter.seed(source.snapshot())
    } else {
        Vec::new()
    };

    let (tx, receiver) = mpsc::channel(options.capacity.max(1));
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let batch_size = options.batch_size.max(1);
    let query_text = options.query.clone();
    let with_suggestions = options.suggestions && !filter.query().is_empty();

    info!(
        "Change subscription {} on {} (query={:?}, selector={:?}, seed={})",
        id,
        R::KIND,
        options.query,
        options.selector,
        options.seed
    );

    tokio::spawn(async move {
        let batch = |changes: Vec<ChangeEvent<R>>, filter: &ChangeFilter| Changes {
            changes,
            query: query_text.clone(),
            suggestions: with_suggestions.then(|| {
                suggest(
                    filter.query(),
                    source.snapshot().iter().map(|item| item.index_fields()),
                )
            }),
        };

        if !seeded.is_empty() && !deliver(&tx, &token, batch(seeded, &filter)).await {
            events.close();
            return;
        }

        loop {
            let first = tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let mut changes: Vec<ChangeEvent<R>> = filter.apply(first).into_iter().collect();
            let mut drained = 1;
            while drained < batch_size {
                match events.try_recv() {
                    Ok(event) => {
                        drained += 1;
                        changes.extend(filter.apply(event));
                    }
                    Err(_) => break,
                }
            }
            if changes.is_empty() {
                continue;
            }

            debug!("{} forwarding {} of {} changes", id, changes.len(), drained);
            if !deliver(&tx, &token, batch(changes, &filter)).await {
                break;
            }
        }
        events.close();
        debug!("Change relay {} stopped", id);
    });

    Ok(ChangesSubscription {
        id,
        receiver,
        cancel,
        state: SubscriptionState::Active,
    })
}

async fn deliver<R>(tx: &mpsc::Sender<Changes<R>>, cancel: &CancellationToken, changes: Changes<R>) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(changes) => sent.is_ok(),
    }
}

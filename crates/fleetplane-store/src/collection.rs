//! A keyed set of resources paired with the topic announcing its changes

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fleetplane_core::{ChangeEvent, Resource};
use fleetplane_eventbus::{EventBus, Subscription, SubscriptionOptions};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Outcome of an apply.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Created,
    Configured,
    /// Identical to the stored value; no event is published.
    Unchanged,
}

/// Resources of one kind keyed by [`Resource::id`].
///
/// Commit and publish happen while the entry is locked, so two mutations of
/// the same resource are announced in the order they were committed.
pub struct Collection<R> {
    items: DashMap<String, R>,
    bus: EventBus<ChangeEvent<R>>,
}

impl<R> Collection<R>
where
    R: Resource + PartialEq,
{
    pub fn new(capacity: usize) -> Self {
        let topic = format!("{}s", R::KIND).to_lowercase();
        Self {
            items: DashMap::new(),
            bus: EventBus::with_capacity(topic, capacity),
        }
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.items.get(id).map(|r| r.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Every stored resource, ordered by id.
    pub fn list(&self) -> Vec<R> {
        let mut items: Vec<R> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| a.id().cmp(b.id()));
        items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The change topic for this collection.
    pub fn bus(&self) -> &EventBus<ChangeEvent<R>> {
        &self.bus
    }

    pub fn subscribe(&self) -> Subscription<ChangeEvent<R>> {
        self.bus.subscribe()
    }

    pub fn subscribe_with(&self, options: SubscriptionOptions<ChangeEvent<R>>) -> Subscription<ChangeEvent<R>> {
        self.bus.subscribe_with(options)
    }

    /// Insert or replace, then announce the change.
    pub fn upsert(&self, item: R) -> ApplyStatus {
        self.upsert_with(item, |_, _| {})
    }

    /// Like [`Collection::upsert`], but `merge` may copy fields from the
    /// stored value into `item` before the two are compared.
    pub fn upsert_with<F>(&self, mut item: R, merge: F) -> ApplyStatus
    where
        F: FnOnce(&R, &mut R),
    {
        match self.items.entry(item.id().to_string()) {
            Entry::Occupied(mut entry) => {
                merge(entry.get(), &mut item);
                if entry.get() == &item {
                    return ApplyStatus::Unchanged;
                }
                entry.insert(item.clone());
                self.bus.publish(ChangeEvent::update(item));
                info!("Updated {} {}", R::KIND, entry.key());
                ApplyStatus::Configured
            }
            Entry::Vacant(entry) => {
                info!("Created {} {}", R::KIND, entry.key());
                entry.insert(item.clone());
                self.bus.publish(ChangeEvent::insert(item));
                ApplyStatus::Created
            }
        }
    }

    /// Remove and announce. `None` if nothing was stored under `id`.
    pub fn remove(&self, id: &str) -> Option<R> {
        match self.items.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                let (key, item) = entry.remove_entry();
                self.bus.publish(ChangeEvent::remove(item.clone()));
                info!("Removed {} {}", R::KIND, key);
                Some(item)
            }
            Entry::Vacant(_) => None,
        }
    }
}

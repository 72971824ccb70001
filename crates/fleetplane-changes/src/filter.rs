//! Per-subscription event filtering with eviction tracking

use crate::query::Query;
use crate::selector::Selector;
use fleetplane_core::{ChangeEvent, EventType, Resource};
use std::collections::HashSet;

/// Decides which change events a subscriber sees, and as what.
///
/// Keeps the ids of items already forwarded so an item that stops matching
/// is still announced as removed, and an item that starts matching is
/// announced as inserted.
#[derive(Clone, Debug, Default)]
pub struct ChangeFilter {
    query: Query,
    selector: Selector,
    forwarded: HashSet<String>,
}

impl ChangeFilter {
    pub fn new(query: Query, selector: Selector) -> Self {
        Self {
            query,
            selector,
            forwarded: HashSet::new(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Whether anything is filtered out at all.
    pub fn is_filtering(&self) -> bool {
        !self.query.is_empty() || !self.selector.is_empty()
    }

    pub fn matches<R: Resource>(&self, item: &R) -> bool {
        self.selector.matches(item.labels()) && self.query.matches(&item.index_fields())
    }

    pub fn is_forwarded(&self, id: &str) -> bool {
        self.forwarded.contains(id)
    }

    /// Insert events for the matching items in `items`, recorded as forwarded.
    pub fn seed<R: Resource>(&mut self, items: Vec<R>) -> Vec<ChangeEvent<R>> {
        let mut events = Vec::new();
        for item in items {
            if self.matches(&item) {
                self.forwarded.insert(item.id().to_string());
                events.push(ChangeEvent::insert(item));
            }
        }
        events
    }

    /// The event to forward for `event`, if any.
    pub fn apply<R: Resource>(&mut self, event: ChangeEvent<R>) -> Option<ChangeEvent<R>> {
        if !self.is_filtering() {
            return Some(event);
        }
        let id = event.item.id().to_string();
        let matches = self.matches(&event.item);
        let was_forwarded = self.forwarded.contains(&id);

        let event_type = match event.event_type {
            EventType::Insert | EventType::Update if matches => {
                self.forwarded.insert(id);
                if was_forwarded {
                    EventType::Update
                } else {
                    EventType::Insert
                }
            }
            EventType::Update if was_forwarded => {
                self.forwarded.remove(&id);
                EventType::Remove
            }
            EventType::Remove if matches || was_forwarded => {
                self.forwarded.remove(&id);
                EventType::Remove
            }
            _ => return None,
        };
        Some(ChangeEvent::new(event.item, event_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplane_core::Agent;

    fn linux_only() -> ChangeFilter {
        ChangeFilter::new(Query::parse("os:linux"), Selector::default())
    }

    fn agent(os: &str) -> Agent {
        Agent::new("a1", "web").with_label("os", os)
    }

    #[test]
    fn update_that_stops_matching_becomes_remove() {
        let mut filter = linux_only();
        let first = filter.apply(ChangeEvent::insert(agent("linux"))).unwrap();
        assert_eq!(first.event_type, EventType::Insert);

        let evicted = filter.apply(ChangeEvent::update(agent("windows"))).unwrap();
        assert_eq!(evicted.event_type, EventType::Remove);
        assert!(!filter.is_forwarded("a1"));

        assert!(filter.apply(ChangeEvent::update(agent("windows"))).is_none());
        assert!(filter.apply(ChangeEvent::remove(agent("windows"))).is_none());
    }

    #[test]
    fn update_that_starts_matching_becomes_insert() {
        let mut filter = linux_only();
        assert!(filter.apply(ChangeEvent::insert(agent("windows"))).is_none());
        let event = filter.apply(ChangeEvent::update(agent("linux"))).unwrap();
        assert_eq!(event.event_type, EventType::Insert);
        let event = filter.apply(ChangeEvent::update(agent("linux"))).unwrap();
        assert_eq!(event.event_type, EventType::Update);
    }

    #[test]
    fn remove_of_forwarded_item_is_always_forwarded() {
        let mut filter = linux_only();
        filter.apply(ChangeEvent::insert(agent("linux")));
        // the removed copy may carry stale fields
        let event = filter.apply(ChangeEvent::remove(agent("other"))).unwrap();
        assert_eq!(event.event_type, EventType::Remove);
    }

    #[test]
    fn seed_records_matches() {
        let mut filter = linux_only();
        let seeded = filter.seed(vec![
            Agent::new("a1", "x").with_label("os", "linux"),
            Agent::new("a2", "y").with_label("os", "windows"),
        ]);
        assert_eq!(seeded.len(), 1);
        assert!(filter.is_forwarded("a1"));
        assert!(!filter.is_forwarded("a2"));
    }

    #[test]
    fn unfiltered_forwards_everything() {
        let mut filter = ChangeFilter::default();
        assert!(!filter.is_filtering());
        for event in [
            ChangeEvent::update(agent("a")),
            ChangeEvent::insert(agent("b")),
            ChangeEvent::remove(agent("c")),
        ] {
            let expected = event.event_type;
            assert_eq!(filter.apply(event).map(|e| e.event_type), Some(expected));
        }
    }
}

//! Where change subscriptions get their events and current state

use fleetplane_core::{Agent, ChangeEvent, Configuration, Destination, Resource, Source};
use fleetplane_eventbus::Subscription;
use fleetplane_store::{Collection, MemoryStore};

/// A topic of changes to `R` plus a view of the current items.
pub trait ChangeSource<R>: Send + Sync {
    /// Subscribe to the raw change topic.
    fn subscribe(&self) -> Subscription<ChangeEvent<R>>;

    /// Every item currently stored.
    fn snapshot(&self) -> Vec<R>;
}

impl<R> ChangeSource<R> for Collection<R>
where
    R: Resource + PartialEq,
{
    fn subscribe(&self) -> Subscription<ChangeEvent<R>> {
        Collection::subscribe(self)
    }

    fn snapshot(&self) -> Vec<R> {
        self.list()
    }
}

macro_rules! store_source {
    ($ty:ty, $collection:ident) => {
        impl ChangeSource<$ty> for MemoryStore {
            fn subscribe(&self) -> Subscription<ChangeEvent<$ty>> {
                self.$collection().subscribe()
            }

            fn snapshot(&self) -> Vec<$ty> {
                self.$collection().list()
            }
        }
    };
}

store_source!(Agent, agents);
store_source!(Source, sources);
store_source!(Destination, destinations);
store_source!(Configuration, configurations);

//! Fleetplane Changes - filtered, batched change subscriptions
//!
//! Wraps a store topic so API subscribers only see the resources their
//! search query and label selector match, with evictions for items that
//! stop matching.

pub mod error;
pub mod filter;
pub mod query;
pub mod selector;
pub mod source;
pub mod subscription;
pub mod suggest;

pub use error::{ChangesError, Result};
pub use filter::ChangeFilter;
pub use query::{Query, Token};
pub use selector::Selector;
pub use source::ChangeSource;
pub use subscription::{subscribe_changes, Changes, ChangesOptions, ChangesSubscription, SubscriptionState};
pub use suggest::{suggest, Suggestion};

//! Fleetplane Store - in-memory resource store with validated commits
//!
//! Every mutation goes through the apply path: validate against the type
//! registries, commit, then publish exactly one change event on the
//! resource's topic.

pub mod collection;
pub mod error;
pub mod memory;

pub use collection::{ApplyStatus, Collection};
pub use error::{Result, StoreError};
pub use memory::{MemoryStore, RenderedConfiguration};

//! The narrow store contract the validator and event core depend on

use crate::resource::{ProcessorType, ResourceType};
use crate::types::{ChangeEvent, Kind};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only lookup of templates by name.
///
/// `resource_type` takes the kind of the resource being validated
/// (`Source`, `Destination`) and resolves against that kind's type registry.
pub trait ResourceStore: Send + Sync {
    fn resource_type(&self, kind: Kind, name: &str) -> Option<Arc<ResourceType>>;

    fn processor_type(&self, name: &str) -> Option<Arc<ProcessorType>>;
}

/// Sink for committed mutations. Must not block and never fails.
pub trait Notifier<T>: Send + Sync {
    fn notify(&self, event: ChangeEvent<T>);
}

/// A fixed set of templates, useful as a fixture or a read-only snapshot.
#[derive(Clone, Debug, Default)]
pub struct StaticTypes {
    types: HashMap<(Kind, String), Arc<ResourceType>>,
}

impl StaticTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its own `kind`. Replaces any existing entry.
    pub fn insert(&mut self, resource_type: ResourceType) {
        let key = (resource_type.kind, resource_type.name.clone());
        self.types.insert(key, Arc::new(resource_type));
    }

    pub fn with(mut self, resource_type: ResourceType) -> Self {
        self.insert(resource_type);
        self
    }
}

impl ResourceStore for StaticTypes {
    fn resource_type(&self, kind: Kind, name: &str) -> Option<Arc<ResourceType>> {
        let type_kind = kind.type_kind()?;
        self.types.get(&(type_kind, name.to_string())).cloned()
    }

    fn processor_type(&self, name: &str) -> Option<Arc<ProcessorType>> {
        self.types
            .get(&(Kind::ProcessorType, name.to_string()))
            .cloned()
    }
}

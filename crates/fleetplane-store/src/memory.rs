//! In-memory store: type registries plus one collection per resource kind

use crate::collection::{ApplyStatus, Collection};
use crate::error::{Result, StoreError};
use dashmap::DashMap;
use fleetplane_core::{
    render_spec, validate_spec, Agent, Configuration, Destination, Kind, Parameterized,
    PlaceholderRenderer, ProcessorType, RenderedConfig, Renderer, ResourceConfiguration,
    ResourceStore, ResourceType, Source, ValidationErrors,
};
use fleetplane_eventbus::DEFAULT_CHANNEL_CAPACITY;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Every component of a configuration, rendered.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RenderedConfiguration {
    pub name: String,
    pub sources: Vec<RenderedConfig>,
    pub destinations: Vec<RenderedConfig>,
}

/// Reference store holding everything in memory.
///
/// Mutations of a single resource are serialized by its collection entry;
/// validation reads the type registries without locking them.
pub struct MemoryStore {
    types: DashMap<(Kind, String), Arc<ResourceType>>,
    agents: Collection<Agent>,
    sources: Collection<Source>,
    destinations: Collection<Destination>,
    configurations: Collection<Configuration>,
    renderer: Arc<dyn Renderer>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A store whose change topics buffer `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            types: DashMap::new(),
            agents: Collection::new(capacity),
            sources: Collection::new(capacity),
            destinations: Collection::new(capacity),
            configurations: Collection::new(capacity),
            renderer: Arc::new(PlaceholderRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn agents(&self) -> &Collection<Agent> {
        &self.agents
    }

    pub fn sources(&self) -> &Collection<Source> {
        &self.sources
    }

    pub fn destinations(&self) -> &Collection<Destination> {
        &self.destinations
    }

    pub fn configurations(&self) -> &Collection<Configuration> {
        &self.configurations
    }

    // -----------------------------------------------------------------------
    // Resource types
    // -----------------------------------------------------------------------

    /// Register or replace a template. Only `*Type` kinds are accepted.
    pub fn apply_resource_type(&self, resource_type: ResourceType) -> Result<ApplyStatus> {
        let kind = resource_type.kind;
        if !matches!(
            kind,
            Kind::SourceType | Kind::DestinationType | Kind::ProcessorType
        ) {
            return Err(StoreError::NotAType {
                kind,
                name: resource_type.name,
            });
        }
        if let Err(errors) = resource_type.validate_definitions() {
            return Err(self.rejected(kind, &resource_type.name, errors));
        }

        let key = (kind, resource_type.name.clone());
        let status = match self.types.get(&key) {
            Some(existing) if **existing == resource_type => ApplyStatus::Unchanged,
            Some(_) => ApplyStatus::Configured,
            None => ApplyStatus::Created,
        };
        if status != ApplyStatus::Unchanged {
            info!("{} {} {:?}", kind, resource_type.name, status);
            self.types.insert(key, Arc::new(resource_type));
        }
        Ok(status)
    }

    /// Templates of one kind, ordered by name.
    pub fn resource_types(&self, kind: Kind) -> Vec<Arc<ResourceType>> {
        let mut types: Vec<Arc<ResourceType>> = self
            .types
            .iter()
            .filter(|e| e.key().0 == kind)
            .map(|e| e.value().clone())
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    /// Remove a template nothing references any more.
    pub fn delete_resource_type(&self, kind: Kind, name: &str) -> Result<Arc<ResourceType>> {
        let dependents = self.dependents_of(kind, name);
        if !dependents.is_empty() {
            return Err(StoreError::InUse {
                kind,
                name: name.to_string(),
                dependents: dependents.join(", "),
            });
        }
        match self.types.remove(&(kind, name.to_string())) {
            Some((_, removed)) => {
                info!("{} {} deleted", kind, name);
                Ok(removed)
            }
            None => Err(StoreError::not_found(kind, name)),
        }
    }

    fn dependents_of(&self, kind: Kind, name: &str) -> Vec<String> {
        let mut dependents = Vec::new();
        let uses = |spec: &dyn Parameterized, as_kind: Kind| -> bool {
            match kind {
                Kind::ProcessorType => references_processor(spec.processors(), name),
                _ => as_kind.type_kind() == Some(kind) && spec.type_name() == name,
            }
        };

        for source in self.sources.list() {
            if uses(&source.spec, Kind::Source) {
                dependents.push(format!("Source {}", source.metadata.name));
            }
        }
        for destination in self.destinations.list() {
            if uses(&destination.spec, Kind::Destination) {
                dependents.push(format!("Destination {}", destination.metadata.name));
            }
        }
        for config in self.configurations.list() {
            let embedded = config
                .spec
                .sources
                .iter()
                .any(|c| uses(c, Kind::Source))
                || config
                    .spec
                    .destinations
                    .iter()
                    .any(|c| uses(c, Kind::Destination));
            if embedded {
                dependents.push(format!("Configuration {}", config.metadata.name));
            }
        }
        dependents
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    /// Validate and commit a source. Invalid sources are rejected without
    /// touching the stored value or publishing anything.
    pub fn apply_source(&self, mut source: Source) -> Result<ApplyStatus> {
        if let Err(errors) = validate_spec(&source.spec, Kind::Source, self) {
            return Err(self.rejected(Kind::Source, &source.metadata.name, errors));
        }
        ensure_id(&mut source.metadata.id);
        Ok(self.sources.upsert_with(source, |current, new| {
            new.metadata.id = current.metadata.id.clone();
        }))
    }

    pub fn apply_destination(&self, mut destination: Destination) -> Result<ApplyStatus> {
        if let Err(errors) = validate_spec(&destination.spec, Kind::Destination, self) {
            return Err(self.rejected(Kind::Destination, &destination.metadata.name, errors));
        }
        ensure_id(&mut destination.metadata.id);
        Ok(self.destinations.upsert_with(destination, |current, new| {
            new.metadata.id = current.metadata.id.clone();
        }))
    }

    /// Validate every embedded component, then commit.
    pub fn apply_configuration(&self, mut configuration: Configuration) -> Result<ApplyStatus> {
        let errors = self.validate_configuration(&configuration);
        if !errors.is_empty() {
            return Err(self.rejected(Kind::Configuration, &configuration.metadata.name, errors));
        }
        ensure_id(&mut configuration.metadata.id);
        Ok(self.configurations.upsert_with(configuration, |current, new| {
            new.metadata.id = current.metadata.id.clone();
        }))
    }

    /// Errors are attributed to `sources[i]` / `destinations[i]`.
    pub fn validate_configuration(&self, configuration: &Configuration) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        let groups: [(&'static str, Kind, &[ResourceConfiguration]); 2] = [
            ("sources", Kind::Source, &configuration.spec.sources),
            ("destinations", Kind::Destination, &configuration.spec.destinations),
        ];
        for (field, kind, components) in groups {
            for (index, component) in components.iter().enumerate() {
                if let Err(nested) = validate_spec(component, kind, self) {
                    errors.extend_component(field, index, nested);
                }
            }
        }
        errors
    }

    /// Agents carry no spec; they are committed as reported.
    pub fn upsert_agent(&self, agent: Agent) -> ApplyStatus {
        self.agents.upsert(agent)
    }

    fn rejected(&self, kind: Kind, name: &str, errors: ValidationErrors) -> StoreError {
        warn!("Rejected {} {}: {}", kind, name, errors);
        StoreError::invalid(kind, name, errors)
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    pub fn delete_agent(&self, id: &str) -> Result<Agent> {
        self.agents
            .remove(id)
            .ok_or_else(|| StoreError::not_found(Kind::Agent, id))
    }

    pub fn delete_source(&self, name: &str) -> Result<Source> {
        self.sources
            .remove(name)
            .ok_or_else(|| StoreError::not_found(Kind::Source, name))
    }

    pub fn delete_destination(&self, name: &str) -> Result<Destination> {
        self.destinations
            .remove(name)
            .ok_or_else(|| StoreError::not_found(Kind::Destination, name))
    }

    pub fn delete_configuration(&self, name: &str) -> Result<Configuration> {
        self.configurations
            .remove(name)
            .ok_or_else(|| StoreError::not_found(Kind::Configuration, name))
    }

    // -----------------------------------------------------------------------
    // Lookup and render
    // -----------------------------------------------------------------------

    pub fn agent(&self, id: &str) -> Option<Agent> {
        self.agents.get(id)
    }

    pub fn source(&self, name: &str) -> Option<Source> {
        self.sources.get(name)
    }

    pub fn destination(&self, name: &str) -> Option<Destination> {
        self.destinations.get(name)
    }

    pub fn configuration(&self, name: &str) -> Option<Configuration> {
        self.configurations.get(name)
    }

    /// The configuration an agent should run: the one it names, otherwise the
    /// first (by name) whose non-empty selector matches its labels.
    pub fn configuration_for_agent(&self, agent_id: &str) -> Option<Configuration> {
        let agent = self.agents.get(agent_id)?;
        if let Some(name) = &agent.configuration {
            return self.configurations.get(name);
        }
        self.configurations
            .list()
            .into_iter()
            .find(|c| !c.spec.selector.is_empty() && c.matches_agent(&agent))
    }

    pub fn render_source(&self, name: &str) -> Result<RenderedConfig> {
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| StoreError::not_found(Kind::Source, name))?;
        Ok(render_spec(&source.spec, Kind::Source, self, self.renderer.as_ref())?)
    }

    pub fn render_destination(&self, name: &str) -> Result<RenderedConfig> {
        let destination = self
            .destinations
            .get(name)
            .ok_or_else(|| StoreError::not_found(Kind::Destination, name))?;
        Ok(render_spec(
            &destination.spec,
            Kind::Destination,
            self,
            self.renderer.as_ref(),
        )?)
    }

    pub fn render_configuration(&self, name: &str) -> Result<RenderedConfiguration> {
        let configuration = self
            .configurations
            .get(name)
            .ok_or_else(|| StoreError::not_found(Kind::Configuration, name))?;
        let renderer = self.renderer.as_ref();
        let render_all = |kind: Kind, components: &[ResourceConfiguration]| {
            components
                .iter()
                .map(|c| render_spec(c, kind, self, renderer))
                .collect::<fleetplane_core::Result<Vec<_>>>()
        };

        Ok(RenderedConfiguration {
            sources: render_all(Kind::Source, &configuration.spec.sources)?,
            destinations: render_all(Kind::Destination, &configuration.spec.destinations)?,
            name: configuration.metadata.name,
        })
    }
}

impl ResourceStore for MemoryStore {
    fn resource_type(&self, kind: Kind, name: &str) -> Option<Arc<ResourceType>> {
        let type_kind = kind.type_kind()?;
        self.types
            .get(&(type_kind, name.to_string()))
            .map(|t| t.value().clone())
    }

    fn processor_type(&self, name: &str) -> Option<Arc<ProcessorType>> {
        self.types
            .get(&(Kind::ProcessorType, name.to_string()))
            .map(|t| t.value().clone())
    }
}

fn ensure_id(id: &mut String) {
    if id.is_empty() {
        *id = uuid::Uuid::new_v4().to_string();
    }
}

fn references_processor(processors: &[ResourceConfiguration], name: &str) -> bool {
    processors
        .iter()
        .any(|p| p.type_name == name || references_processor(&p.processors, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetplane_core::{ParameterDefinition, ParameterType};

    #[test]
    fn only_type_kinds_are_registries() {
        let store = MemoryStore::new();
        let err = store
            .apply_resource_type(ResourceType::new(Kind::Source, "x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAType { .. }));
    }

    #[test]
    fn resource_type_apply_reports_status() {
        let store = MemoryStore::new();
        let rt = ResourceType::new(Kind::ProcessorType, "batch")
            .with_parameter(ParameterDefinition::new("size", ParameterType::Int));
        assert_eq!(store.apply_resource_type(rt.clone()).unwrap(), ApplyStatus::Created);
        assert_eq!(store.apply_resource_type(rt.clone()).unwrap(), ApplyStatus::Unchanged);
        assert_eq!(
            store.apply_resource_type(rt.with_template("batch")).unwrap(),
            ApplyStatus::Configured
        );
        assert!(store.processor_type("batch").is_some());
        assert_eq!(store.resource_types(Kind::ProcessorType).len(), 1);
    }

    #[test]
    fn processor_references_are_found_at_any_depth() {
        let chain = vec![ResourceConfiguration::new("a")
            .with_processor(ResourceConfiguration::new("b").with_processor(ResourceConfiguration::new("c")))];
        assert!(references_processor(&chain, "c"));
        assert!(!references_processor(&chain, "d"));
    }
}

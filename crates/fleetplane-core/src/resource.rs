//! Resource types, parameterized specs and the stored resources built on them

use crate::parameter::{Parameter, ParameterDefinition, ParameterType};
use crate::types::{Kind, Metadata, Resource};
use crate::validation::{ValidationError, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A named template declaring the parameters used to render a component.
///
/// Source types, destination types and processor types share this shape;
/// `kind` says which registry the template belongs to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub kind: Kind,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    /// Opaque render template, expanded by a [`crate::Renderer`].
    #[serde(default)]
    pub template: String,
}

/// Processor templates are resource types in the processor registry.
pub type ProcessorType = ResourceType;

impl ResourceType {
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            parameters: Vec::new(),
            template: String::new(),
        }
    }

    pub fn with_parameter(mut self, definition: ParameterDefinition) -> Self {
        self.parameters.push(definition);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check the template's own parameter definitions for consistency.
    pub fn validate_definitions(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let names: HashSet<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        let mut seen = HashSet::new();

        for def in &self.parameters {
            if def.name.is_empty() {
                errors.push(ValidationError::invalid_definition("", "name is empty"));
                continue;
            }
            if !seen.insert(def.name.as_str()) {
                errors.push(ValidationError::invalid_definition(&def.name, "duplicate name"));
            }
            let is_enum = matches!(def.parameter_type, ParameterType::Enum | ParameterType::Enums);
            if is_enum && def.valid_values.is_empty() {
                errors.push(ValidationError::invalid_definition(
                    &def.name,
                    "enum parameters must declare validValues",
                ));
            }
            if let Some(default) = &def.default {
                if let Err(e) = def.validate_value(default) {
                    errors.push(ValidationError::invalid_definition(
                        &def.name,
                        format!("default: {}", e),
                    ));
                }
            }
            for condition in &def.relevant_if {
                if !names.contains(condition.name.as_str()) {
                    errors.push(ValidationError::invalid_definition(
                        &def.name,
                        format!("relevantIf references unknown parameter {}", condition.name),
                    ));
                }
            }
        }
        errors.into_result()
    }
}

/// Anything shaped like `{type, parameters, processors}`.
pub trait Parameterized {
    fn type_name(&self) -> &str;
    fn parameters(&self) -> &[Parameter];
    fn processors(&self) -> &[ResourceConfiguration];
}

/// A component embedded in a configuration, or a processor in a chain.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceConfiguration {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub processors: Vec<ResourceConfiguration>,
}

impl ResourceConfiguration {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            parameters: Vec::new(),
            processors: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_processor(mut self, processor: ResourceConfiguration) -> Self {
        self.processors.push(processor);
        self
    }
}

impl Parameterized for ResourceConfiguration {
    fn type_name(&self) -> &str {
        &self.type_name
    }
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
    fn processors(&self) -> &[ResourceConfiguration] {
        &self.processors
    }
}

/// The persisted, unrendered form of a source or destination.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterizedSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub processors: Vec<ResourceConfiguration>,
}

impl ParameterizedSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            parameters: Vec::new(),
            processors: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_processor(mut self, processor: ResourceConfiguration) -> Self {
        self.processors.push(processor);
        self
    }

    /// A copy of this spec with `overrides` applied. See [`override_parameters`].
    pub fn override_parameters(&self, overrides: &[Parameter]) -> ParameterizedSpec {
        ParameterizedSpec {
            type_name: self.type_name.clone(),
            parameters: override_parameters(&self.parameters, overrides),
            processors: self.processors.clone(),
        }
    }
}

impl Parameterized for ParameterizedSpec {
    fn type_name(&self) -> &str {
        &self.type_name
    }
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
    fn processors(&self) -> &[ResourceConfiguration] {
        &self.processors
    }
}

impl From<ResourceConfiguration> for ParameterizedSpec {
    fn from(rc: ResourceConfiguration) -> Self {
        Self {
            type_name: rc.type_name,
            parameters: rc.parameters,
            processors: rc.processors,
        }
    }
}

/// Replace same-named parameters in place and append the rest.
///
/// The result keeps the position of every name in `base`, appends names first
/// seen in `overrides` in their order, and never contains a name twice (the
/// last value for a name wins).
pub fn override_parameters(base: &[Parameter], overrides: &[Parameter]) -> Vec<Parameter> {
    let mut result: Vec<Parameter> = Vec::with_capacity(base.len() + overrides.len());
    let mut index: HashMap<&str, usize> = HashMap::new();
    for p in base.iter().chain(overrides) {
        match index.get(p.name.as_str()) {
            Some(&i) => result[i] = p.clone(),
            None => {
                index.insert(p.name.as_str(), result.len());
                result.push(p.clone());
            }
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Stored resources
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub metadata: Metadata,
    pub spec: ParameterizedSpec,
}

impl Source {
    pub fn new(name: impl Into<String>, spec: ParameterizedSpec) -> Self {
        Self {
            metadata: Metadata::named(name),
            spec,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub metadata: Metadata,
    pub spec: ParameterizedSpec,
}

impl Destination {
    pub fn new(name: impl Into<String>, spec: ParameterizedSpec) -> Self {
        Self {
            metadata: Metadata::named(name),
            spec,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigurationSpec {
    #[serde(default)]
    pub sources: Vec<ResourceConfiguration>,
    #[serde(default)]
    pub destinations: Vec<ResourceConfiguration>,
    /// Labels an agent must carry to receive this configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Configuration {
    pub metadata: Metadata,
    pub spec: ConfigurationSpec,
}

impl Configuration {
    pub fn new(name: impl Into<String>, spec: ConfigurationSpec) -> Self {
        Self {
            metadata: Metadata::named(name),
            spec,
        }
    }

    /// Whether an agent's labels satisfy this configuration's selector.
    pub fn matches_agent(&self, agent: &Agent) -> bool {
        self.spec
            .selector
            .iter()
            .all(|(k, v)| agent.labels.get(k) == Some(v))
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A telemetry-collecting agent managed by the fleet.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub status: AgentStatus,
    /// Name of the configuration currently applied to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            operating_system: String::new(),
            platform: String::new(),
            labels: BTreeMap::new(),
            status: AgentStatus::default(),
            configuration: None,
            connected_at: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn connected(mut self) -> Self {
        self.status = AgentStatus::Connected;
        self.connected_at = Some(Utc::now());
        self
    }
}

impl Resource for Agent {
    const KIND: Kind = Kind::Agent;

    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    fn index_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.clone()),
            ("name".to_string(), self.name.clone()),
            ("status".to_string(), self.status.to_string()),
        ];
        for (field, value) in [
            ("version", &self.version),
            ("operating_system", &self.operating_system),
            ("platform", &self.platform),
        ] {
            if !value.is_empty() {
                fields.push((field.to_string(), value.clone()));
            }
        }
        if let Some(configuration) = &self.configuration {
            fields.push(("configuration".to_string(), configuration.clone()));
        }
        fields.extend(self.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields
    }
}

impl Resource for Configuration {
    const KIND: Kind = Kind::Configuration;

    fn id(&self) -> &str {
        &self.metadata.name
    }
    fn name(&self) -> &str {
        &self.metadata.name
    }
    fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }
}

// Sources and destinations are also searchable by their resource type.
macro_rules! spec_resource {
    ($ty:ty, $kind:expr) => {
        impl Resource for $ty {
            const KIND: Kind = $kind;

            fn id(&self) -> &str {
                &self.metadata.name
            }
            fn name(&self) -> &str {
                &self.metadata.name
            }
            fn labels(&self) -> &BTreeMap<String, String> {
                &self.metadata.labels
            }

            fn index_fields(&self) -> Vec<(String, String)> {
                let mut fields = vec![
                    ("name".to_string(), self.metadata.name.clone()),
                    ("type".to_string(), self.spec.type_name.clone()),
                ];
                fields.extend(
                    self.metadata
                        .labels
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                fields
            }
        }
    };
}

spec_resource!(Source, Kind::Source);
spec_resource!(Destination, Kind::Destination);

//! Core types for Fleetplane

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource kind
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Kind {
    Agent,
    Configuration,
    Source,
    Destination,
    Processor,
    SourceType,
    DestinationType,
    ProcessorType,
}

impl Kind {
    /// The template kind that renders resources of this kind.
    pub fn type_kind(self) -> Option<Kind> {
        match self {
            Self::Source => Some(Self::SourceType),
            Self::Destination => Some(Self::DestinationType),
            Self::Processor => Some(Self::ProcessorType),
            _ => None,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Agent => "Agent",
            Self::Configuration => "Configuration",
            Self::Source => "Source",
            Self::Destination => "Destination",
            Self::Processor => "Processor",
            Self::SourceType => "SourceType",
            Self::DestinationType => "DestinationType",
            Self::ProcessorType => "ProcessorType",
        };
        f.write_str(s)
    }
}

/// What happened to a stored resource
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Update,
    Remove,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Remove => "REMOVE",
        };
        f.write_str(s)
    }
}

/// A committed mutation of a stored resource.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent<T> {
    pub item: T,
    pub event_type: EventType,
}

impl<T> ChangeEvent<T> {
    pub fn new(item: T, event_type: EventType) -> Self {
        Self { item, event_type }
    }

    pub fn insert(item: T) -> Self {
        Self::new(item, EventType::Insert)
    }

    pub fn update(item: T) -> Self {
        Self::new(item, EventType::Update)
    }

    pub fn remove(item: T) -> Self {
        Self::new(item, EventType::Remove)
    }
}

/// Identity shared by every stored resource
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Metadata {
    /// Metadata with a fresh id.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A resource held by the store and broadcast on change.
///
/// `id` is the identity the store keys on: agents use their agent id, named
/// resources use their name.
pub trait Resource: Clone + Send + Sync + 'static {
    const KIND: Kind;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn labels(&self) -> &BTreeMap<String, String>;

    /// Field/value pairs searchable by a query. Labels are indexed under their key.
    fn index_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("kind".to_string(), Self::KIND.to_string()),
            ("name".to_string(), self.name().to_string()),
        ];
        fields.extend(self.labels().iter().map(|(k, v)| (k.clone(), v.clone())));
        fields
    }
}

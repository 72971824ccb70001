//! Parameterized spec validation and rendering
//!
//! A spec names a resource type and supplies parameter values; processors
//! nest the same shape recursively against the processor registry. All
//! functions here are pure over their inputs: nothing is mutated and every
//! violation is returned in one batch.

use crate::error::{Error, Result};
use crate::parameter::Parameter;
use crate::resource::{override_parameters, Parameterized, ResourceConfiguration, ResourceType};
use crate::store::ResourceStore;
use crate::types::Kind;
use crate::validation::{ValidationError, ValidationErrors};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

fn resolve(kind: Kind, name: &str, store: &dyn ResourceStore) -> Option<Arc<ResourceType>> {
    match kind {
        Kind::Processor => store.processor_type(name),
        _ => store.resource_type(kind, name),
    }
}

/// Resolve `spec`'s type for `kind` and validate its parameters.
///
/// An unknown type is reported as the only error; parameters cannot be
/// checked without their definitions.
pub fn validate_type_and_parameters<S>(
    spec: &S,
    kind: Kind,
    store: &dyn ResourceStore,
) -> ValidationErrors
where
    S: Parameterized + ?Sized,
{
    debug!(
        "validate {} {} with {} processors",
        kind,
        spec.type_name(),
        spec.processors().len()
    );
    let mut errors = ValidationErrors::new();
    check_component(spec, kind, store, &mut errors);
    errors
}

/// Validate every processor in `spec`, recursively. Errors are wrapped with
/// the processor's position.
pub fn validate_processors<S>(spec: &S, kind: Kind, store: &dyn ResourceStore) -> ValidationErrors
where
    S: Parameterized + ?Sized,
{
    debug!(
        "validate processors of {} {}: {}",
        kind,
        spec.type_name(),
        spec.processors().len()
    );
    let mut errors = ValidationErrors::new();
    check_processors(spec.processors(), store, &mut errors);
    errors
}

/// Both validation passes, as the commit path runs them.
pub fn validate_spec<S>(spec: &S, kind: Kind, store: &dyn ResourceStore) -> std::result::Result<(), ValidationErrors>
where
    S: Parameterized + ?Sized,
{
    let mut errors = validate_type_and_parameters(spec, kind, store);
    errors.extend(validate_processors(spec, kind, store));
    errors.into_result()
}

/// Validate supplied values against a resolved type's definitions.
///
/// A definition is checked only when its `relevant_if` conditions hold.
/// Required parameters that are absent, null, or an empty list are missing;
/// present ones are type-checked. Parameters the type does not declare are
/// ignored.
pub fn validate_parameters(resource_type: &ResourceType, parameters: &[Parameter]) -> ValidationErrors {
    let supplied: HashMap<&str, &Value> = parameters
        .iter()
        .map(|p| (p.name.as_str(), &p.value))
        .collect();

    let mut errors = ValidationErrors::new();
    for def in &resource_type.parameters {
        if !def.is_relevant(|name| current_value(name, &supplied, resource_type)) {
            continue;
        }
        match supplied.get(def.name.as_str()) {
            Some(value) if !def.is_unset(value) => {
                if let Err(e) = def.validate_value(value) {
                    errors.push(e);
                }
            }
            _ if def.required => errors.push(ValidationError::missing(&def.name)),
            _ => {}
        }
    }
    errors
}

fn current_value<'a>(
    name: &str,
    supplied: &HashMap<&str, &'a Value>,
    resource_type: &'a ResourceType,
) -> Option<&'a Value> {
    supplied
        .get(name)
        .copied()
        .filter(|v| !v.is_null())
        .or_else(|| resource_type.parameter(name).and_then(|d| d.default.as_ref()))
}

fn check_component<S>(spec: &S, kind: Kind, store: &dyn ResourceStore, errors: &mut ValidationErrors)
where
    S: Parameterized + ?Sized,
{
    match resolve(kind, spec.type_name(), store) {
        Some(resource_type) => errors.extend(validate_parameters(&resource_type, spec.parameters())),
        None => errors.push(ValidationError::type_not_found(kind, spec.type_name())),
    }
}

fn check_processors(
    processors: &[ResourceConfiguration],
    store: &dyn ResourceStore,
    errors: &mut ValidationErrors,
) {
    for (index, processor) in processors.iter().enumerate() {
        let mut nested = ValidationErrors::new();
        check_component(processor, Kind::Processor, store, &mut nested);
        check_processors(&processor.processors, store, &mut nested);
        errors.extend_processor(index, nested);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Expands a resource type's template with concrete parameter values.
pub trait Renderer: Send + Sync {
    fn render(&self, resource_type: &ResourceType, parameters: &[Parameter]) -> Result<String>;
}

/// Replaces `{name}` in the template with each parameter's value. Strings are
/// inserted verbatim, everything else as compact JSON. Unknown placeholders
/// are left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderRenderer;

impl Renderer for PlaceholderRenderer {
    fn render(&self, resource_type: &ResourceType, parameters: &[Parameter]) -> Result<String> {
        let mut s = resource_type.template.clone();
        for p in parameters {
            let value = match &p.value {
                Value::String(text) => text.clone(),
                other => serde_json::to_string(other)?,
            };
            s = s.replace(&format!("{{{}}}", p.name), &value);
        }
        Ok(s)
    }
}

/// A rendered component and its rendered processor chain.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedConfig {
    pub kind: Kind,
    pub type_name: String,
    /// Effective parameters: definition defaults overridden by supplied values.
    pub parameters: Vec<Parameter>,
    pub rendered: String,
    pub processors: Vec<RenderedConfig>,
}

/// Definition defaults with the supplied values applied on top.
pub fn effective_parameters(resource_type: &ResourceType, supplied: &[Parameter]) -> Vec<Parameter> {
    let defaults: Vec<Parameter> = resource_type
        .parameters
        .iter()
        .filter_map(|d| {
            d.default
                .as_ref()
                .map(|v| Parameter::new(d.name.clone(), v.clone()))
        })
        .collect();
    override_parameters(&defaults, supplied)
}

/// Validate `spec` and render it with its processors.
///
/// The output depends only on the resolved types, the supplied parameters and
/// the processor chain.
pub fn render_spec<S>(
    spec: &S,
    kind: Kind,
    store: &dyn ResourceStore,
    renderer: &dyn Renderer,
) -> Result<RenderedConfig>
where
    S: Parameterized + ?Sized,
{
    validate_spec(spec, kind, store)?;
    render_component(spec, kind, store, renderer)
}

fn render_component<S>(
    spec: &S,
    kind: Kind,
    store: &dyn ResourceStore,
    renderer: &dyn Renderer,
) -> Result<RenderedConfig>
where
    S: Parameterized + ?Sized,
{
    let resource_type = resolve(kind, spec.type_name(), store).ok_or_else(|| {
        Error::from(ValidationErrors::from(ValidationError::type_not_found(
            kind,
            spec.type_name(),
        )))
    })?;
    let parameters = effective_parameters(&resource_type, spec.parameters());
    let rendered = renderer.render(&resource_type, &parameters)?;
    let processors = spec
        .processors()
        .iter()
        .map(|p| render_component(p, Kind::Processor, store, renderer))
        .collect::<Result<Vec<_>>>()?;

    Ok(RenderedConfig {
        kind,
        type_name: spec.type_name().to_string(),
        parameters,
        rendered,
        processors,
    })
}

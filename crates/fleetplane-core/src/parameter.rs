//! Typed parameters and the definitions that constrain them

use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named parameter value supplied to a resource type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declared type of a parameter
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Strings,
    Int,
    Bool,
    Enum,
    Enums,
    Map,
    /// Raw text, only checked to be a string.
    Yaml,
}

impl ParameterType {
    fn is_list(self) -> bool {
        matches!(self, Self::Strings | Self::Enums)
    }
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Strings => "strings",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::Enum => "enum",
            Self::Enums => "enums",
            Self::Map => "map",
            Self::Yaml => "yaml",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelevantIfOperator {
    #[default]
    Equals,
}

/// Makes a parameter apply only when another parameter has a given value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RelevantIfCondition {
    pub name: String,
    #[serde(default)]
    pub operator: RelevantIfOperator,
    pub value: Value,
}

impl RelevantIfCondition {
    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            operator: RelevantIfOperator::Equals,
            value: value.into(),
        }
    }

    fn holds(&self, actual: Option<&Value>) -> bool {
        match self.operator {
            RelevantIfOperator::Equals => actual == Some(&self.value),
        }
    }
}

/// A parameter declared by a resource type template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relevant_if: Vec<RelevantIfCondition>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            description: String::new(),
            parameter_type,
            required: false,
            default: None,
            valid_values: Vec::new(),
            relevant_if: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_valid_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn relevant_if(mut self, condition: RelevantIfCondition) -> Self {
        self.relevant_if.push(condition);
        self
    }

    /// Whether every `relevant_if` condition holds. `lookup` resolves the
    /// current value of another parameter, falling back to its default.
    pub fn is_relevant<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Value>) -> bool {
        self.relevant_if.iter().all(|c| c.holds(lookup(c.name.as_str())))
    }

    /// A supplied value that should be treated as absent for required checks.
    pub fn is_unset(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Array(items) => self.parameter_type.is_list() && items.is_empty(),
            _ => false,
        }
    }

    /// Check a supplied value against this definition's type and allowed values.
    ///
    /// Map and yaml values are checked structurally only.
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        let type_ok = match self.parameter_type {
            ParameterType::String | ParameterType::Yaml | ParameterType::Enum => value.is_string(),
            ParameterType::Strings | ParameterType::Enums => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            ParameterType::Int => value.is_i64() || value.is_u64(),
            ParameterType::Bool => value.is_boolean(),
            ParameterType::Map => value.is_object(),
        };
        if !type_ok {
            return Err(ValidationError::ParameterTypeMismatch {
                name: self.name.clone(),
                expected: self.parameter_type,
                found: value_kind(value),
            });
        }

        let invalid = match (self.parameter_type, value) {
            (ParameterType::Enum, Value::String(s)) => self.first_invalid([s.as_str()]),
            (ParameterType::Enums, Value::Array(items)) => {
                self.first_invalid(items.iter().filter_map(Value::as_str))
            }
            _ => None,
        };
        match invalid {
            Some(value) => Err(ValidationError::InvalidEnumValue {
                name: self.name.clone(),
                value,
                valid: self.valid_values.clone(),
            }),
            None => Ok(()),
        }
    }

    fn first_invalid<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> Option<String> {
        values
            .into_iter()
            .find(|v| !self.valid_values.iter().any(|valid| valid == v))
            .map(String::from)
    }
}

/// Short name for the JSON shape of a value, used in mismatch messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_rejects_string_and_float() {
        let def = ParameterDefinition::new("port", ParameterType::Int);
        assert!(def.validate_value(&json!(8080)).is_ok());
        assert!(matches!(
            def.validate_value(&json!("8080")),
            Err(ValidationError::ParameterTypeMismatch { found: "string", .. })
        ));
        assert!(matches!(
            def.validate_value(&json!(80.5)),
            Err(ValidationError::ParameterTypeMismatch { found: "number", .. })
        ));
    }

    #[test]
    fn enums_report_first_invalid_member() {
        let def = ParameterDefinition::new("levels", ParameterType::Enums)
            .with_valid_values(["info", "warn", "error"]);
        assert!(def.validate_value(&json!(["info", "error"])).is_ok());
        match def.validate_value(&json!(["info", "trace", "fatal"])) {
            Err(ValidationError::InvalidEnumValue { value, .. }) => assert_eq!(value, "trace"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn map_and_yaml_are_structural_only() {
        let map = ParameterDefinition::new("headers", ParameterType::Map);
        assert!(map.validate_value(&json!({"a": 1, "b": [true]})).is_ok());
        assert!(map.validate_value(&json!(["a"])).is_err());

        let yaml = ParameterDefinition::new("raw", ParameterType::Yaml);
        assert!(yaml.validate_value(&json!("not: [valid")).is_ok());
    }

    #[test]
    fn empty_list_is_unset_only_for_list_types() {
        let strings = ParameterDefinition::new("files", ParameterType::Strings);
        assert!(strings.is_unset(&json!([])));
        assert!(!strings.is_unset(&json!(["a"])));
        let map = ParameterDefinition::new("m", ParameterType::Map);
        assert!(!map.is_unset(&json!([])));
        assert!(map.is_unset(&Value::Null));
    }

    #[test]
    fn relevant_if_requires_all_conditions() {
        let def = ParameterDefinition::new("cert", ParameterType::String)
            .relevant_if(RelevantIfCondition::equals("tls", true))
            .relevant_if(RelevantIfCondition::equals("mode", "server"));
        let tls = json!(true);
        let server = json!("server");
        let client = json!("client");
        assert!(def.is_relevant(|name| match name {
            "tls" => Some(&tls),
            "mode" => Some(&server),
            _ => None,
        }));
        assert!(!def.is_relevant(|name| match name {
            "tls" => Some(&tls),
            "mode" => Some(&client),
            _ => None,
        }));
        assert!(!def.is_relevant(|_| None));
    }

    #[test]
    fn definition_deserializes_camel_case() {
        let def: ParameterDefinition = serde_json::from_value(json!({
            "name": "protocol",
            "type": "enum",
            "required": true,
            "validValues": ["tcp", "udp"],
            "relevantIf": [{"name": "enabled", "operator": "equals", "value": true}]
        }))
        .unwrap();
        assert_eq!(def.parameter_type, ParameterType::Enum);
        assert_eq!(def.valid_values, vec!["tcp", "udp"]);
        assert_eq!(def.relevant_if[0].operator, RelevantIfOperator::Equals);
    }
}

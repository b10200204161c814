//! Node type descriptors: the reusable definition behind every node instance
//!
//! A descriptor declares the typed input/output ports, the user-set
//! parameters, and the body that turns inputs and parameters into outputs.
//! Descriptors are immutable after registration; re-registering the same
//! type name hot-swaps the definition (see [`crate::registry`]).
//!
//! The serde shapes here are the wire format consumed from storage or an
//! editor; field names are camelCase on the wire, e.g. `defaultValue`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;
use crate::value::{coerce, Value, ValueType};

/// A typed named slot on a node type (input or output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WirePort", into = "WirePort")]
pub struct PortSpec {
    /// Unique within the node type
    pub id: String,
    /// Display name shown by the editor
    pub name: String,
    pub value_type: ValueType,
    /// Declared default; falls back to the type's zero value when absent
    pub default: Option<Value>,
    pub required: bool,
    /// UI validation bounds only, never engine semantics
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub description: Option<String>,
}

impl PortSpec {
    pub fn new(id: impl Into<String>, value_type: ValueType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            value_type,
            default: None,
            required: false,
            min: None,
            max: None,
            step: None,
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The value this port yields with no edge and no instance override.
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.value_type.default_value())
    }
}

/// A parameter spec has the same shape as a port spec but never receives an
/// edge; its value comes only from the node instance's stored configuration.
pub type ParamSpec = PortSpec;

/// Serialized body of a dynamically defined node type.
///
/// Either one arithmetic/logical expression per output, or a free-form
/// script receiving the full input/parameter record. Natively implemented
/// builtins carry no body spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodySpec {
    Expressions {
        /// Maps output id -> expression source
        expressions: IndexMap<String, String>,
    },
    Script {
        script: String,
    },
}

/// Complete definition of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDescriptor {
    /// Globally unique type name
    #[serde(rename = "type")]
    pub type_name: String,
    pub category: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub parameters: Vec<ParamSpec>,
    /// `None` for natively implemented builtins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodySpec>,
}

impl NodeTypeDescriptor {
    pub fn new(type_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            category: category.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
            body: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<PortSpec>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<PortSpec>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ParamSpec>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_body(mut self, body: BodySpec) -> Self {
        self.body = Some(body);
        self
    }

    pub fn input(&self, id: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.id == id)
    }

    pub fn parameter(&self, id: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// Structural validation, run before the body compiles.
    ///
    /// Input and parameter ids share a namespace because body expressions
    /// reference both as free variables; output ids are a namespace of their
    /// own. Declared defaults must coerce to the declared types.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.type_name.is_empty() {
            return Err(DescriptorError::EmptyTypeName);
        }

        let mut seen = std::collections::HashSet::new();
        for spec in &self.inputs {
            if !seen.insert(spec.id.as_str()) {
                return Err(DescriptorError::DuplicateInputId(spec.id.clone()));
            }
        }
        for spec in &self.parameters {
            if !seen.insert(spec.id.as_str()) {
                return Err(DescriptorError::DuplicateParameterId(spec.id.clone()));
            }
        }
        let mut seen_out = std::collections::HashSet::new();
        for spec in &self.outputs {
            if !seen_out.insert(spec.id.as_str()) {
                return Err(DescriptorError::DuplicateOutputId(spec.id.clone()));
            }
        }

        for spec in self.inputs.iter().chain(&self.parameters).chain(&self.outputs) {
            if let ValueType::Enum(options) = &spec.value_type {
                if options.is_empty() {
                    return Err(DescriptorError::EnumWithoutOptions(spec.id.clone()));
                }
            }
            if let Some(default) = &spec.default {
                coerce(default.clone(), &spec.value_type).map_err(|source| {
                    DescriptorError::BadDefault {
                        port: spec.id.clone(),
                        source,
                    }
                })?;
            }
        }

        Ok(())
    }
}

/// Wire form of a port entry:
/// `{id, name, type, defaultValue, required?, options?, min?, max?, step?}`.
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct WirePort {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

fn type_tag(ty: &ValueType) -> &'static str {
    match ty {
        ValueType::Number => "number",
        ValueType::Integer => "integer",
        ValueType::Boolean => "boolean",
        ValueType::Text => "text",
        ValueType::Enum(_) => "enum",
        ValueType::Vector3 => "vector3",
        ValueType::Color => "color",
        ValueType::Transform => "transform",
        ValueType::Geometry => "geometry",
        ValueType::PointSet => "pointSet",
        ValueType::Material => "material",
        ValueType::Any => "any",
    }
}

impl From<PortSpec> for WirePort {
    fn from(spec: PortSpec) -> Self {
        let options = match &spec.value_type {
            ValueType::Enum(options) => Some(options.clone()),
            _ => None,
        };
        Self {
            type_tag: type_tag(&spec.value_type).to_string(),
            id: spec.id,
            name: Some(spec.name),
            default_value: spec.default,
            required: spec.required,
            options,
            min: spec.min,
            max: spec.max,
            step: spec.step,
            description: spec.description,
        }
    }
}

impl TryFrom<WirePort> for PortSpec {
    type Error = String;

    fn try_from(wire: WirePort) -> Result<Self, Self::Error> {
        let value_type = match wire.type_tag.as_str() {
            "number" => ValueType::Number,
            "integer" => ValueType::Integer,
            "boolean" => ValueType::Boolean,
            "text" => ValueType::Text,
            "enum" => ValueType::Enum(wire.options.unwrap_or_default()),
            "vector3" => ValueType::Vector3,
            "color" => ValueType::Color,
            "transform" => ValueType::Transform,
            "geometry" => ValueType::Geometry,
            "pointSet" => ValueType::PointSet,
            "material" => ValueType::Material,
            "any" => ValueType::Any,
            other => return Err(format!("unknown port type '{}'", other)),
        };
        Ok(Self {
            name: wire.name.unwrap_or_else(|| wire.id.clone()),
            id: wire.id,
            value_type,
            default: wire.default_value,
            required: wire.required,
            min: wire.min,
            max: wire.max,
            step: wire.step,
            description: wire.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_in_one_out() -> NodeTypeDescriptor {
        NodeTypeDescriptor::new("Blend", "utility")
            .with_inputs(vec![
                PortSpec::new("a", ValueType::Number).with_default(Value::Number(0.0)),
                PortSpec::new("b", ValueType::Number).with_default(Value::Number(0.0)),
            ])
            .with_outputs(vec![PortSpec::new("out", ValueType::Number)])
    }

    #[test]
    fn test_validate_accepts_wellformed() {
        assert!(two_in_one_out().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_input() {
        let mut desc = two_in_one_out();
        desc.inputs.push(PortSpec::new("a", ValueType::Number));
        assert_eq!(
            desc.validate(),
            Err(DescriptorError::DuplicateInputId("a".into()))
        );
    }

    #[test]
    fn test_validate_rejects_parameter_colliding_with_input() {
        let mut desc = two_in_one_out();
        desc.parameters.push(PortSpec::new("a", ValueType::Number));
        assert_eq!(
            desc.validate(),
            Err(DescriptorError::DuplicateParameterId("a".into()))
        );
    }

    #[test]
    fn test_validate_rejects_bad_default() {
        let mut desc = two_in_one_out();
        desc.inputs[0].default = Some(Value::Text("nope".into()));
        assert!(matches!(
            desc.validate(),
            Err(DescriptorError::BadDefault { .. })
        ));
    }

    #[test]
    fn test_wire_round_trip() {
        let json = serde_json::json!({
            "type": "Wave",
            "category": "generator",
            "inputs": [
                {"id": "t", "type": "number", "defaultValue": {"number": 0.0}, "required": true},
                {"id": "mode", "type": "enum", "options": ["sine", "square"]}
            ],
            "outputs": [{"id": "out", "type": "number"}],
            "parameters": [
                {"id": "amplitude", "type": "number", "min": 0.0, "max": 10.0, "step": 0.1}
            ],
            "body": {"expressions": {"out": "sin(t) * amplitude"}}
        });
        let desc: NodeTypeDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(desc.type_name, "Wave");
        assert_eq!(
            desc.inputs[1].value_type,
            ValueType::Enum(vec!["sine".into(), "square".into()])
        );
        assert!(desc.inputs[0].required);
        assert_eq!(desc.parameters[0].step, Some(0.1));
        assert!(matches!(desc.body, Some(BodySpec::Expressions { .. })));

        // Serialize back and parse again: identical descriptor
        let text = serde_json::to_string(&desc).unwrap();
        let again: NodeTypeDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(desc, again);
    }
}

//! Schema model
//!
//! Typed view of the JSON-Schema-like document that describes a threat model.
//! Parsing is shape detection over raw JSON: every property becomes one
//! closed [`SchemaNode`] variant. Anything the editor cannot handle becomes
//! [`SchemaNode::Unsupported`] instead of an error, so one odd property never
//! blocks editing the rest.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::document::PathSegment;
use crate::error::SchemaError;

/// Schema shipped with the crate, used when no schema path is configured
const BUILTIN_SCHEMA: &str = include_str!("../schema/threat-model.schema.json");

/// `{"type": "string"}` with optional `format` and `enum`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<String>>,
}

impl StringSchema {
    pub fn is_date(&self) -> bool {
        self.format.as_deref() == Some("date")
    }
}

/// `{"type": "integer"}` or `{"type": "number"}`. Bounds are advisory only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NumericSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

/// `{"type": "object"}` with fixed `properties` and/or open `additionalProperties`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SchemaNode>>,
}

/// `{"type": "array", "items": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArraySchema {
    pub items: Box<SchemaNode>,
}

/// Type descriptor for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaNode {
    String(StringSchema),
    Integer(NumericSchema),
    Number(NumericSchema),
    Boolean,
    Object(ObjectSchema),
    Array(ArraySchema),
    Unsupported { type_name: String },
}

impl SchemaNode {
    /// Detect the node for one raw JSON schema fragment
    pub fn from_json(raw: &JsonValue) -> Self {
        let type_name = match raw.get("type") {
            Some(JsonValue::String(t)) => Some(t.clone()),
            // `"type": ["string", "null"]` - the first entry wins
            Some(JsonValue::Array(types)) => types.first().and_then(|t| t.as_str()).map(String::from),
            _ => None,
        }
        .unwrap_or_else(|| infer_type(raw).to_string());

        match type_name.as_str() {
            "string" => SchemaNode::String(StringSchema {
                format: raw.get("format").and_then(|f| f.as_str()).map(String::from),
                enumeration: raw.get("enum").and_then(|e| e.as_array()).map(|values| {
                    values
                        .iter()
                        .map(|v| match v {
                            JsonValue::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                }),
            }),
            "integer" => SchemaNode::Integer(numeric_bounds(raw)),
            "number" => SchemaNode::Number(numeric_bounds(raw)),
            "boolean" => SchemaNode::Boolean,
            "object" => SchemaNode::Object(ObjectSchema {
                properties: raw
                    .get("properties")
                    .and_then(|p| p.as_object())
                    .map(|props| {
                        props
                            .iter()
                            .map(|(name, prop)| (name.clone(), SchemaNode::from_json(prop)))
                            .collect()
                    })
                    .unwrap_or_default(),
                // `additionalProperties: true/false` carries no value schema
                additional_properties: raw
                    .get("additionalProperties")
                    .filter(|a| a.is_object())
                    .map(|a| Box::new(SchemaNode::from_json(a))),
            }),
            "array" => SchemaNode::Array(ArraySchema {
                items: Box::new(match raw.get("items") {
                    Some(items) if items.is_object() => SchemaNode::from_json(items),
                    Some(_) => SchemaNode::Unsupported {
                        type_name: "tuple".to_string(),
                    },
                    None => SchemaNode::String(StringSchema::default()),
                }),
            }),
            other => SchemaNode::Unsupported {
                type_name: other.to_string(),
            },
        }
    }

    /// Schema type name as written in JSON Schema
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::String(_) => "string",
            SchemaNode::Integer(_) => "integer",
            SchemaNode::Number(_) => "number",
            SchemaNode::Boolean => "boolean",
            SchemaNode::Object(_) => "object",
            SchemaNode::Array(_) => "array",
            SchemaNode::Unsupported { .. } => "unsupported",
        }
    }

    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            SchemaNode::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Schema of a direct child. Fixed properties take precedence over
    /// `additionalProperties`.
    pub fn child(&self, segment: &PathSegment) -> Option<&SchemaNode> {
        match (self, segment) {
            (SchemaNode::Object(object), PathSegment::Key(key)) => object
                .properties
                .get(key)
                .or(object.additional_properties.as_deref()),
            (SchemaNode::Array(array), PathSegment::Index(_)) => Some(&array.items),
            _ => None,
        }
    }

    /// Schema at a relative path
    pub fn resolve(&self, path: &[PathSegment]) -> Option<&SchemaNode> {
        path.iter().try_fold(self, |node, segment| node.child(segment))
    }

    /// Value written for a freshly created field or item.
    /// `candidates` is the dynamic enumeration bound to the field, if any.
    pub fn zero_value(&self, candidates: Option<&[String]>) -> Option<Value> {
        match self {
            SchemaNode::String(string) => {
                let first = candidates
                    .and_then(|c| c.first())
                    .or_else(|| string.enumeration.as_ref().and_then(|e| e.first()));
                Some(Value::String(first.cloned().unwrap_or_default()))
            }
            SchemaNode::Integer(_) | SchemaNode::Number(_) => Some(Value::Number(0.into())),
            SchemaNode::Boolean => Some(Value::Bool(false)),
            SchemaNode::Object(_) => Some(Value::Mapping(Mapping::new())),
            SchemaNode::Array(_) => Some(Value::Sequence(Vec::new())),
            SchemaNode::Unsupported { .. } => None,
        }
    }
}

fn infer_type(raw: &JsonValue) -> &'static str {
    if raw.get("properties").is_some() || raw.get("additionalProperties").is_some() {
        "object"
    } else if raw.get("items").is_some() {
        "array"
    } else if raw.get("enum").is_some() {
        "string"
    } else {
        "unknown"
    }
}

fn numeric_bounds(raw: &JsonValue) -> NumericSchema {
    NumericSchema {
        minimum: raw.get("minimum").and_then(|m| m.as_f64()),
        maximum: raw.get("maximum").and_then(|m| m.as_f64()),
    }
}

/// The parsed schema document
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaModel {
    root: SchemaNode,
}

impl SchemaModel {
    /// Parse a schema document. The root is either an object schema or,
    /// as older editor schemas were written, a bare map of property schemas.
    pub fn from_json(raw: &JsonValue) -> Result<Self, SchemaError> {
        let Some(object) = raw.as_object() else {
            return Err(SchemaError::InvalidFormat(
                "schema root must be a JSON object".to_string(),
            ));
        };

        let root = if object.contains_key("type") || object.contains_key("properties") {
            SchemaNode::from_json(raw)
        } else {
            SchemaNode::Object(ObjectSchema {
                properties: object
                    .iter()
                    .map(|(name, prop)| (name.clone(), SchemaNode::from_json(prop)))
                    .collect(),
                additional_properties: None,
            })
        };

        match root {
            SchemaNode::Object(_) => Ok(Self { root }),
            other => Err(SchemaError::InvalidFormat(format!(
                "schema root must describe an object, found {}",
                other.kind_name()
            ))),
        }
    }

    pub fn from_str(text: &str) -> Result<Self, SchemaError> {
        let raw: JsonValue = serde_json::from_str(text)?;
        Self::from_json(&raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// The schema bundled with the crate
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_str(BUILTIN_SCHEMA)
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Schema of a top-level section, e.g. `technical_assets`
    pub fn section(&self, name: &str) -> Result<&SchemaNode, SchemaError> {
        self.root
            .as_object()
            .and_then(|object| object.properties.get(name))
            .ok_or_else(|| SchemaError::MissingSection(name.to_string()))
    }

    /// Schema of one entity inside a keyed section
    pub fn entity(&self, section: &str) -> Result<&SchemaNode, SchemaError> {
        self.section(section)?
            .as_object()
            .and_then(|object| object.additional_properties.as_deref())
            .ok_or_else(|| {
                SchemaError::InvalidFormat(format!("section {} is not a keyed map", section))
            })
    }

    pub fn resolve(&self, path: &[PathSegment]) -> Option<&SchemaNode> {
        self.root.resolve(path)
    }
}

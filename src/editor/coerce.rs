//! Input coercion
//!
//! Turns what a user typed or toggled into the value stored in the document.
//! Coercion is deliberately permissive: numeric fields store NaN for input
//! that does not parse, matching what earlier editors wrote to disk.

use serde::{Deserialize, Serialize};
use serde_yaml::{Number, Value};

use crate::document::FieldPath;
use crate::error::EditError;
use crate::schema::SchemaNode;

/// Raw input committed from a field editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldInput {
    /// Text, number or choice entry
    Text(String),
    /// Checkbox state
    Toggle(bool),
}

impl FieldInput {
    pub fn text(value: impl Into<String>) -> Self {
        FieldInput::Text(value.into())
    }
}

/// Coerce `input` for a field described by `node`.
/// `candidates` is the dynamic enumeration bound to the field, if any; it
/// replaces the static `enum` of the schema.
pub fn coerce(
    node: &SchemaNode,
    input: FieldInput,
    candidates: Option<&[String]>,
    path: &FieldPath,
) -> Result<Value, EditError> {
    match (node, input) {
        (SchemaNode::String(string), FieldInput::Text(text)) => {
            let options = candidates.or(string.enumeration.as_deref());
            if let Some(options) = options {
                if !options.iter().any(|option| *option == text) {
                    return Err(EditError::NotAnOption {
                        path: path.to_string(),
                        value: text,
                    });
                }
            }
            Ok(Value::String(text))
        }
        (SchemaNode::Integer(_), FieldInput::Text(text)) => Ok(parse_number(&text, true)),
        (SchemaNode::Number(_), FieldInput::Text(text)) => Ok(parse_number(&text, false)),
        (SchemaNode::Boolean, FieldInput::Toggle(checked)) => Ok(Value::Bool(checked)),
        (SchemaNode::Unsupported { type_name }, _) => Err(EditError::Unsupported {
            path: path.to_string(),
            type_name: type_name.clone(),
        }),
        (other, _) => Err(EditError::WrongKind {
            path: path.to_string(),
            actual: other.kind_name(),
            operation: "set that input on",
        }),
    }
}

/// Parse numeric text. Integral input on an integer field stays an integer;
/// anything unparseable becomes NaN.
pub fn parse_number(text: &str, integer: bool) -> Value {
    let trimmed = text.trim();
    if integer {
        if let Ok(value) = trimmed.parse::<i64>() {
            return Value::Number(value.into());
        }
    }
    let value = trimmed.parse::<f64>().unwrap_or(f64::NAN);
    Value::Number(Number::from(value))
}

/// Text shown in a free-text field for whatever is stored
pub fn display_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

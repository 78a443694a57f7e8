// Flowdeck — Input schema interpretation
//
// Only the parts of JSON Schema needed to lay out a form are understood:
// top-level `properties`, `required`, each property's `type` and `enum`.
// Composition (`$ref`, `oneOf`, `anyOf`, `allOf`) is not resolved.

pub mod defaults;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use defaults::build_default_model;

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<Value>,
    /// Property schemas in declaration order.
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_required")]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

/// `required` is only honoured as a list of names; anything else means "none".
fn lenient_required<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Property kinds
// ---------------------------------------------------------------------------

/// Closed set of property kinds a form can edit.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// Non-empty `enum`; wins over the declared `type`.
    Enum(Vec<Value>),
    /// A `type` this interpreter has no widget for. Edited as text.
    Unknown(String),
}

/// Input widget used to edit a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    TextField,
    NumberField,
    Checkbox,
    ComboBox,
    JsonTextArea,
}

/// How a raw edit signal is turned into a model value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Text,
    Enum,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyKind {
    /// Classify a single property schema.
    pub fn classify(property: &Value) -> Self {
        let schema: PropertySchema = match serde_json::from_value(property.clone()) {
            Ok(s) => s,
            Err(_) => return PropertyKind::Unknown(property.to_string()),
        };

        if let Some(values) = schema.enum_values.filter(|v| !v.is_empty()) {
            return PropertyKind::Enum(values);
        }

        match schema.property_type {
            None => PropertyKind::String,
            Some(Value::String(t)) => match t.as_str() {
                "string" => PropertyKind::String,
                "number" => PropertyKind::Number,
                "integer" => PropertyKind::Integer,
                "boolean" => PropertyKind::Boolean,
                "array" => PropertyKind::Array,
                "object" => PropertyKind::Object,
                _ => PropertyKind::Unknown(t),
            },
            Some(other) => PropertyKind::Unknown(other.to_string()),
        }
    }

    pub fn widget(&self) -> Widget {
        match self {
            PropertyKind::String | PropertyKind::Unknown(_) => Widget::TextField,
            PropertyKind::Number | PropertyKind::Integer => Widget::NumberField,
            PropertyKind::Boolean => Widget::Checkbox,
            PropertyKind::Array | PropertyKind::Object => Widget::JsonTextArea,
            PropertyKind::Enum(_) => Widget::ComboBox,
        }
    }

    pub fn coercion(&self) -> CoercionKind {
        match self {
            PropertyKind::String | PropertyKind::Unknown(_) => CoercionKind::Text,
            PropertyKind::Number | PropertyKind::Integer => CoercionKind::Number,
            PropertyKind::Boolean => CoercionKind::Boolean,
            PropertyKind::Array => CoercionKind::Array,
            PropertyKind::Object => CoercionKind::Object,
            PropertyKind::Enum(_) => CoercionKind::Enum,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Number => "number",
            PropertyKind::Integer => "integer",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Array => "array",
            PropertyKind::Object => "object",
            PropertyKind::Enum(_) => "enum",
            PropertyKind::Unknown(t) => t,
        }
    }
}

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    pub required: bool,
}

impl FieldDescriptor {
    /// Allowed values for enum fields.
    pub fn enum_values(&self) -> Option<&[Value]> {
        match &self.kind {
            PropertyKind::Enum(values) => Some(values),
            _ => None,
        }
    }

    /// Label as shown next to the input widget.
    pub fn label(&self) -> String {
        let mut label = self.name.clone();
        if self.required {
            label.push_str(" *");
        }
        if self.kind.widget() == Widget::JsonTextArea {
            label.push_str(" (JSON)");
        }
        label
    }
}

/// Why a schema could not drive a form.
#[derive(Debug, Clone, PartialEq)]
pub enum Unusable {
    Absent,
    NotAnObject,
    Malformed(String),
    NoProperties,
}

impl fmt::Display for Unusable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unusable::Absent => f.write_str("no schema"),
            Unusable::NotAnObject => f.write_str("schema is not a JSON object"),
            Unusable::Malformed(e) => write!(f, "malformed schema: {}", e),
            Unusable::NoProperties => f.write_str("schema declares no properties"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Fields(Vec<FieldDescriptor>),
    NoUsableSchema(Unusable),
}

/// Turn a raw schema into ordered field descriptors.
pub fn interpret(schema: Option<&Value>) -> Interpretation {
    let raw = match schema {
        None | Some(Value::Null) => return Interpretation::NoUsableSchema(Unusable::Absent),
        Some(v) if !v.is_object() => {
            return Interpretation::NoUsableSchema(Unusable::NotAnObject)
        }
        Some(v) => v,
    };

    let schema: InputSchema = match serde_json::from_value(raw.clone()) {
        Ok(s) => s,
        Err(e) => return Interpretation::NoUsableSchema(Unusable::Malformed(e.to_string())),
    };

    if schema.properties.is_empty() {
        return Interpretation::NoUsableSchema(Unusable::NoProperties);
    }

    let fields = schema
        .properties
        .iter()
        .map(|(name, property)| FieldDescriptor {
            name: name.clone(),
            kind: PropertyKind::classify(property),
            required: schema.required.iter().any(|r| r == name),
        })
        .collect();

    Interpretation::Fields(fields)
}

// Flowdeck — Default form model synthesis

use super::{FieldDescriptor, PropertyKind};
use crate::form::FormModel;
use serde_json::{Map, Value};

/// Initial value for a field of the given kind.
pub fn default_value(kind: &PropertyKind) -> Value {
    match kind {
        PropertyKind::Enum(values) => values.first().cloned().unwrap_or(Value::Null),
        PropertyKind::String => Value::String(String::new()),
        PropertyKind::Number | PropertyKind::Integer => Value::from(0),
        PropertyKind::Boolean => Value::Bool(false),
        PropertyKind::Array => Value::Array(Vec::new()),
        PropertyKind::Object => Value::Object(Map::new()),
        PropertyKind::Unknown(_) => Value::Null,
    }
}

/// Build the model a freshly loaded schema starts from: one entry per field.
pub fn build_default_model(fields: &[FieldDescriptor]) -> FormModel {
    let values = fields
        .iter()
        .map(|f| (f.name.clone(), default_value(&f.kind)))
        .collect::<Map<_, _>>();
    FormModel::new(values)
}

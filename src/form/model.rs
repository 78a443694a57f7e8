// Flowdeck — Form model snapshots

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Field name to current value, in schema declaration order.
///
/// Snapshots are immutable; an edit produces a new model and leaves
/// every earlier snapshot as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormModel(Arc<Map<String, Value>>);

impl FormModel {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(Arc::new(values))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this model with `name` set to `value`.
    pub fn with_value(&self, name: &str, value: Value) -> Self {
        let mut values = Map::clone(&self.0);
        values.insert(name.to_string(), value);
        Self::new(values)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(Map::clone(&self.0))
    }

    /// Full pretty-printed JSON of the model.
    pub fn to_canonical_text(&self) -> String {
        format!("{:#}", self.to_value())
    }
}

impl Serialize for FormModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

// Flowdeck — Schema-backed input form
//
// Edits arrive as raw widget signals and are coerced by the field's kind.
// Every accepted edit swaps in a new model snapshot and regenerates the
// whole canonical text; a rejected edit leaves both as they were.

pub mod model;
pub mod raw;

pub use model::FormModel;
pub use raw::RawInput;

use crate::schema::{build_default_model, CoercionKind, FieldDescriptor};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldValidationError {
    #[error("Invalid JSON for '{field}': {message}")]
    InvalidJson { field: String, message: String },
    #[error("Invalid number for '{field}': {value}")]
    InvalidNumber { field: String, value: String },
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },
}

impl FieldValidationError {
    pub fn field(&self) -> &str {
        match self {
            FieldValidationError::InvalidJson { field, .. }
            | FieldValidationError::InvalidNumber { field, .. }
            | FieldValidationError::UnknownField { field } => field,
        }
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Turn a raw widget signal into the value stored for a field.
pub fn coerce(
    field: &str,
    raw: &Value,
    kind: CoercionKind,
) -> Result<Value, FieldValidationError> {
    match kind {
        CoercionKind::Text | CoercionKind::Enum => Ok(match raw {
            Value::Null => Value::String(String::new()),
            other => other.clone(),
        }),
        CoercionKind::Number => coerce_number(field, raw),
        CoercionKind::Boolean => Ok(Value::Bool(is_truthy(raw))),
        CoercionKind::Array => coerce_json(field, raw, || Value::Array(Vec::new())),
        CoercionKind::Object => coerce_json(field, raw, || Value::Object(Map::new())),
    }
}

fn coerce_number(field: &str, raw: &Value) -> Result<Value, FieldValidationError> {
    let invalid = || FieldValidationError::InvalidNumber {
        field: field.to_string(),
        value: raw.to_string(),
    };

    match raw {
        // Cleared input is an explicit null, not zero.
        Value::Null => Ok(Value::Null),
        Value::Number(_) => Ok(raw.clone()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Value::Null);
            }
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Value::from(n));
            }
            s.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn coerce_json(
    field: &str,
    raw: &Value,
    empty: impl FnOnce() -> Value,
) -> Result<Value, FieldValidationError> {
    match raw {
        Value::Null => Ok(empty()),
        Value::String(s) if s.trim().is_empty() => Ok(empty()),
        Value::String(s) => {
            serde_json::from_str(s).map_err(|e| FieldValidationError::InvalidJson {
                field: field.to_string(),
                message: e.to_string(),
            })
        }
        // Already structured.
        other => Ok(other.clone()),
    }
}

fn is_truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Schema form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SchemaForm {
    fields: Vec<FieldDescriptor>,
    model: FormModel,
    canonical: String,
}

impl SchemaForm {
    /// Start a form from freshly interpreted fields, populated with defaults.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        let model = build_default_model(&fields);
        let canonical = model.to_canonical_text();
        Self {
            fields,
            model,
            canonical,
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn model(&self) -> &FormModel {
        &self.model
    }

    /// The JSON text that will be submitted.
    pub fn canonical_text(&self) -> &str {
        &self.canonical
    }

    /// Apply a raw edit to `name`, coercing it as `kind`.
    pub fn on_field_change(
        &mut self,
        name: &str,
        raw: &Value,
        kind: CoercionKind,
    ) -> Result<(), FieldValidationError> {
        if self.field(name).is_none() {
            return Err(FieldValidationError::UnknownField {
                field: name.to_string(),
            });
        }

        let value = coerce(name, raw, kind)?;
        tracing::debug!(field = %name, kind = ?kind, "Field updated");

        self.model = self.model.with_value(name, value);
        self.canonical = self.model.to_canonical_text();
        Ok(())
    }

    /// Apply a raw edit using the field's declared kind.
    pub fn edit(&mut self, name: &str, raw: &Value) -> Result<(), FieldValidationError> {
        let kind = self
            .field(name)
            .map(|f| f.kind.coercion())
            .ok_or_else(|| FieldValidationError::UnknownField {
                field: name.to_string(),
            })?;
        self.on_field_change(name, raw, kind)
    }

    /// Current value of a field as editable text.
    pub fn display_value(&self, name: &str) -> String {
        match self.model.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(v) => format!("{:#}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{interpret, Interpretation};
    use serde_json::json;

    fn form(schema: Value) -> SchemaForm {
        match interpret(Some(&schema)) {
            Interpretation::Fields(f) => SchemaForm::new(f),
            other => panic!("expected fields, got {other:?}"),
        }
    }

    fn person() -> SchemaForm {
        form(json!({
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
            "required": ["name"]
        }))
    }

    fn canonical(f: &SchemaForm) -> Value {
        serde_json::from_str(f.canonical_text()).unwrap()
    }

    #[test]
    fn test_number_edit_updates_model_and_text() {
        let mut f = person();
        f.on_field_change("age", &json!("5"), CoercionKind::Number)
            .unwrap();
        assert_eq!(f.model().to_value(), json!({"name": "", "age": 5}));
        assert_eq!(canonical(&f), json!({"name": "", "age": 5}));
        assert_eq!(f.canonical_text(), f.model().to_canonical_text());
    }

    #[test]
    fn test_cleared_number_is_null_not_zero() {
        let mut f = person();
        f.edit("age", &json!("")).unwrap();
        assert_eq!(f.model().get("age"), Some(&Value::Null));
        f.edit("age", &json!("2.5")).unwrap();
        assert_eq!(f.model().get("age"), Some(&json!(2.5)));
        f.edit("age", &Value::Null).unwrap();
        assert_eq!(canonical(&f)["age"], Value::Null);
    }

    #[test]
    fn test_unparseable_number_keeps_previous_value() {
        let mut f = person();
        f.edit("age", &json!("7")).unwrap();
        let err = f.edit("age", &json!("seven")).unwrap_err();
        assert_eq!(err.field(), "age");
        assert_eq!(f.model().get("age"), Some(&json!(7)));
    }

    #[test]
    fn test_text_passthrough_and_null() {
        let mut f = person();
        f.edit("name", &json!("Ada")).unwrap();
        assert_eq!(f.model().get("name"), Some(&json!("Ada")));
        f.edit("name", &Value::Null).unwrap();
        assert_eq!(f.model().get("name"), Some(&json!("")));
    }

    #[test]
    fn test_boolean_truthiness() {
        let mut f = form(json!({"properties": {"dry_run": {"type": "boolean"}}}));
        for (raw, expected) in [
            (json!(true), true),
            (json!(false), false),
            (json!(""), false),
            (json!("on"), true),
            (json!(0), false),
            (json!(1), true),
            (Value::Null, false),
        ] {
            f.edit("dry_run", &raw).unwrap();
            assert_eq!(f.model().get("dry_run"), Some(&Value::Bool(expected)), "raw = {raw}");
        }
    }

    #[test]
    fn test_valid_json_fields() {
        let mut f = form(json!({
            "properties": {"tags": {"type": "array"}, "meta": {"type": "object"}}
        }));
        f.edit("tags", &json!(r#"["a", "b"]"#)).unwrap();
        f.edit("meta", &json!(r#"{"k": {"nested": 1}}"#)).unwrap();
        assert_eq!(f.model().get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(canonical(&f), json!({"tags": ["a", "b"], "meta": {"k": {"nested": 1}}}));
        assert_eq!(f.display_value("tags"), "[\n  \"a\",\n  \"b\"\n]");
    }

    #[test]
    fn test_empty_json_text_resets_to_empty_container() {
        let mut f = form(json!({
            "properties": {"tags": {"type": "array"}, "meta": {"type": "object"}}
        }));
        f.edit("tags", &json!("[1]")).unwrap();
        f.edit("tags", &json!("")).unwrap();
        f.edit("meta", &json!("  ")).unwrap();
        assert_eq!(f.model().to_value(), json!({"tags": [], "meta": {}}));
    }

    #[test]
    fn test_invalid_json_keeps_last_valid_value() {
        let mut f = form(json!({
            "properties": {"tags": {"type": "array"}, "name": {"type": "string"}}
        }));
        f.edit("tags", &json!("[1, 2]")).unwrap();
        f.edit("name", &json!("kept")).unwrap();
        let before_text = f.canonical_text().to_string();
        let before = f.model().clone();

        let err = f.edit("tags", &json!("[1, 2")).unwrap_err();
        match &err {
            FieldValidationError::InvalidJson { field, message } => {
                assert_eq!(field, "tags");
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("Invalid JSON for 'tags'"));
        assert_eq!(f.model(), &before);
        assert_eq!(f.canonical_text(), before_text);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut f = person();
        let err = f
            .on_field_change("nickname", &json!("x"), CoercionKind::Text)
            .unwrap_err();
        assert_eq!(
            err,
            FieldValidationError::UnknownField {
                field: "nickname".into()
            }
        );
        assert_eq!(f.model().len(), 2);
    }

    #[test]
    fn test_earlier_snapshot_survives_edit() {
        let mut f = person();
        let snapshot = f.model().clone();
        f.edit("name", &json!("Grace")).unwrap();
        assert_eq!(snapshot.get("name"), Some(&json!("")));
        assert_eq!(f.model().get("name"), Some(&json!("Grace")));
    }

    #[test]
    fn test_enum_edit_passthrough() {
        let mut f = form(json!({
            "properties": {"level": {"enum": ["low", "high"]}}
        }));
        assert_eq!(f.display_value("level"), "low");
        f.edit("level", &json!("high")).unwrap();
        assert_eq!(canonical(&f), json!({"level": "high"}));
    }
}

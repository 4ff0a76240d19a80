//! The action record flowing through the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MediatorError;

/// The discriminator field every action carries.
pub const KIND_FIELD: &str = "kind";

/// An event record discriminated by its `kind` field.
///
/// Fields keep their insertion order. Apart from `kind`, every field is opaque
/// to the mediator and passes through derived actions untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Action {
    fields: Map<String, Value>,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(KIND_FIELD.to_string(), Value::String(kind.into()));
        Self { fields }
    }

    /// Add or replace a field. `kind` cannot be changed here; use
    /// [`Action::with_kind`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        if field != KIND_FIELD {
            self.fields.insert(field, value.into());
        }
        self
    }

    pub fn kind(&self) -> &str {
        self.fields
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Shallow copy with only `kind` replaced. The input is left untouched.
    pub fn with_kind(&self, kind: impl Into<String>) -> Self {
        self.clone().into_kind(kind)
    }

    /// Replace `kind` in place of the existing one, keeping field order.
    pub fn into_kind(mut self, kind: impl Into<String>) -> Self {
        self.fields
            .insert(KIND_FIELD.to_string(), Value::String(kind.into()));
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Map<String, Value>> for Action {
    type Error = MediatorError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        match fields.get(KIND_FIELD) {
            Some(Value::String(_)) => Ok(Self { fields }),
            Some(other) => Err(MediatorError::InvalidAction(format!(
                "`{KIND_FIELD}` must be a string, got {other}"
            ))),
            None => Err(MediatorError::InvalidAction(format!(
                "missing `{KIND_FIELD}` field"
            ))),
        }
    }
}

impl TryFrom<Value> for Action {
    type Error = MediatorError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            other => Err(MediatorError::InvalidAction(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl From<Action> for Map<String, Value> {
    fn from(action: Action) -> Self {
        action.fields
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        action.into_value()
    }
}

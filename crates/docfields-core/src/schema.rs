//! Runtime record types built from caller-supplied field descriptors.
//!
//! A [`RecordType`] is a plain descriptor map (member name → type, nullability,
//! metadata). The same descriptor drives the JSON Schema handed to the model and
//! the validator applied to whatever the model returns.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

use crate::error::{DocfieldsError, Result};

pub const RECORD_TYPE_NAME: &str = "ExtractedRecord";
pub const BATCH_TYPE_NAME: &str = "ExtractionBatch";

/// Key under which a batch carries its records.
pub const BATCH_ITEMS_KEY: &str = "items";

/// One validated output record, keyed in member declaration order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
}

impl FieldType {
    /// Resolve a declared type name. Unknown names fall back to `String`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "str" | "string" | "text" => FieldType::String,
            "int" | "integer" => FieldType::Integer,
            "float" | "number" | "double" | "decimal" => FieldType::Float,
            "bool" | "boolean" => FieldType::Boolean,
            _ => {
                tracing::warn!(field_type = %s, "Unknown field type, defaulting to string");
                FieldType::String
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "str",
            FieldType::Integer => "int",
            FieldType::Float => "float",
            FieldType::Boolean => "bool",
        }
    }

    /// JSON Schema `type` keyword for this field type.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::Boolean => "boolean",
        }
    }

    /// Lax coercion of a model-produced value into this type. `Null` passes through.
    pub fn coerce(&self, value: &Value) -> std::result::Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("expected a string, got {}", describe(other))),
            },
            FieldType::Integer => match value {
                Value::Number(n) => integer_from_number(n)
                    .map(Value::from)
                    .ok_or_else(|| format!("expected an integer, got {n}")),
                Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
                Value::String(s) => {
                    let t = s.trim();
                    t.parse::<i64>()
                        .ok()
                        .or_else(|| t.parse::<f64>().ok().and_then(integral_f64))
                        .map(Value::from)
                        .ok_or_else(|| format!("expected an integer, got \"{s}\""))
                }
                other => Err(format!("expected an integer, got {}", describe(other))),
            },
            FieldType::Float => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("expected a number, got \"{s}\"")),
                other => Err(format!("expected a number, got {}", describe(other))),
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(format!("expected a boolean, got {n}")),
                },
                Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
                    "false" | "f" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
                    _ => Err(format!("expected a boolean, got \"{s}\"")),
                },
                other => Err(format!("expected a boolean, got {}", describe(other))),
            },
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn integer_from_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| n.as_f64().and_then(integral_f64))
}

fn integral_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Caller-supplied description of one output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            description: None,
            examples: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordMember {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<String>,
    pub examples: Vec<String>,
}

impl RecordMember {
    /// Optional members are nullable and default to null.
    pub fn is_nullable(&self) -> bool {
        !self.required
    }

    fn json_schema(&self) -> Value {
        let mut schema = Map::new();
        if self.is_nullable() {
            schema.insert("type".into(), json!([self.field_type.json_type(), "null"]));
            schema.insert("default".into(), Value::Null);
        } else {
            schema.insert("type".into(), json!(self.field_type.json_type()));
        }
        if let Some(description) = &self.description {
            schema.insert("description".into(), json!(description));
        }
        if !self.examples.is_empty() {
            schema.insert("examples".into(), json!(self.examples));
        }
        Value::Object(schema)
    }
}

/// The shape of one extracted entity for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub members: Vec<RecordMember>,
}

impl RecordType {
    pub fn member(&self, name: &str) -> Option<&RecordMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .members
            .iter()
            .map(|m| (m.name.clone(), m.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .members
            .iter()
            .filter(|m| m.required)
            .map(|m| m.name.as_str())
            .collect();

        json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Coerce one model-produced object into a record.
    ///
    /// Unknown keys are dropped and absent optional members become null. A required
    /// member must be present as a key but may hold null.
    pub fn validate(&self, value: &Value) -> Result<Record> {
        let object = value.as_object().ok_or_else(|| {
            DocfieldsError::UnitExtraction(format!("expected an object, got {}", describe(value)))
        })?;

        let mut record = Record::new();
        for member in &self.members {
            let coerced = match object.get(&member.name) {
                Some(v) => member.field_type.coerce(v).map_err(|e| {
                    DocfieldsError::UnitExtraction(format!("field '{}': {e}", member.name))
                })?,
                None if member.required => {
                    return Err(DocfieldsError::UnitExtraction(format!(
                        "missing required field '{}'",
                        member.name
                    )));
                }
                None => Value::Null,
            };
            record.insert(member.name.clone(), coerced);
        }

        for key in object.keys().filter(|k| self.member(k).is_none()) {
            tracing::debug!(key = %key, "Dropping unknown key from extracted record");
        }

        Ok(record)
    }
}

/// Named collection wrapper around records of one [`RecordType`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchType {
    pub name: String,
    pub record: RecordType,
}

impl BatchType {
    pub fn json_schema(&self) -> Value {
        json!({
            "title": self.name,
            "type": "object",
            "properties": {
                BATCH_ITEMS_KEY: {
                    "type": "array",
                    "items": self.record.json_schema(),
                }
            },
            "required": [BATCH_ITEMS_KEY],
        })
    }

    /// Unwrap a batch value into validated records. A bare array is accepted too.
    pub fn validate(&self, value: &Value) -> Result<Vec<Record>> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(object) => object
                .get(BATCH_ITEMS_KEY)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    DocfieldsError::UnitExtraction(format!(
                        "batch is missing the '{BATCH_ITEMS_KEY}' array"
                    ))
                })?,
            other => {
                return Err(DocfieldsError::UnitExtraction(format!(
                    "expected a batch object, got {}",
                    describe(other)
                )))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                self.record.validate(item).map_err(|e| match e {
                    DocfieldsError::UnitExtraction(msg) => {
                        DocfieldsError::UnitExtraction(format!("item {i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

/// Build the record and batch types for one run.
///
/// Fails when a name is empty or appears twice.
pub fn build_schema(fields: &[FieldDescriptor]) -> Result<(RecordType, BatchType)> {
    let mut seen = HashSet::with_capacity(fields.len());
    let mut members = Vec::with_capacity(fields.len());

    for field in fields {
        if field.name.trim().is_empty() {
            return Err(DocfieldsError::Schema("field name must not be empty".into()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(DocfieldsError::Schema(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }
        members.push(RecordMember {
            name: field.name.clone(),
            field_type: field.field_type,
            required: field.required,
            description: field.description.clone().filter(|d| !d.trim().is_empty()),
            examples: field.examples.clone(),
        });
    }

    let record = RecordType {
        name: RECORD_TYPE_NAME.to_string(),
        members,
    };
    let batch = BatchType {
        name: BATCH_TYPE_NAME.to_string(),
        record: record.clone(),
    };

    tracing::debug!(fields = record.members.len(), "Built extraction schema");

    Ok((record, batch))
}

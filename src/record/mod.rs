use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::schema::{FieldKind, RecordType};

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Rows(Vec<BTreeMap<String, String>>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> FieldValue {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> &str {
        match self {
            FieldValue::Text(value) => value,
            _ => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(value) => value.trim().is_empty(),
            FieldValue::Flag(_) => false,
            FieldValue::Rows(rows) => rows.is_empty(),
        }
    }

    pub fn blank_for(kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::Flag => FieldValue::Flag(false),
            FieldKind::Rows(_) => FieldValue::Rows(Vec::new()),
            _ => FieldValue::Text(String::new()),
        }
    }

    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Bool(flag) => FieldValue::Flag(*flag),
            Value::String(text) => FieldValue::Text(text.clone()),
            Value::Number(number) => FieldValue::Text(number.to_string()),
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Object(columns) = item {
                        let mut row = BTreeMap::new();
                        for (name, column) in columns {
                            row.insert(name.clone(), json_to_string(column));
                        }
                        rows.push(row);
                    }
                }
                FieldValue::Rows(rows)
            }
            _ => FieldValue::Text(String::new()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Flag(flag) => Value::Bool(*flag),
            FieldValue::Rows(rows) => Value::Array(
                rows.iter()
                    .map(|row| {
                        Value::Object(
                            row.iter()
                                .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                                .collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

fn json_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One submitted form instance tied to a student. The identifier is assigned
/// by the server on creation and never changes afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub author_id: Option<String>,
    pub submitted_at: Option<String>,
}

impl Record {
    pub fn blank(record_type: &RecordType) -> Record {
        let mut fields = BTreeMap::new();
        for spec in record_type.fields {
            fields.insert(spec.name.to_string(), FieldValue::blank_for(spec.kind));
        }
        Record {
            id: None,
            fields,
            author_id: None,
            submitted_at: None,
        }
    }

    pub fn from_json(record_type: &RecordType, value: &Value) -> Record {
        let mut record = Record::blank(record_type);
        let Value::Object(object) = value else {
            return record;
        };
        for spec in record_type.fields {
            if let Some(raw) = object.get(spec.name) {
                if !raw.is_null() {
                    record
                        .fields
                        .insert(spec.name.to_string(), FieldValue::from_json(raw));
                }
            }
        }
        record.id = object
            .get("id")
            .or_else(|| object.get("_id"))
            .and_then(identifier_string);
        record.author_id = object.get("counselor_id").and_then(identifier_string);
        record.submitted_at = object
            .get("submitted_at")
            .or_else(|| object.get("created_at"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        record
    }

    /// The full field mapping sent as the create/update payload.
    pub fn payload(&self, record_type: &RecordType) -> Value {
        let mut object = serde_json::Map::new();
        for spec in record_type.fields {
            if let Some(value) = self.fields.get(spec.name) {
                object.insert(spec.name.to_string(), value.to_json());
            }
        }
        if let Some(author_id) = self.author_id.as_deref() {
            object.insert("counselor_id".to_string(), Value::String(author_id.to_string()));
        }
        Value::Object(object)
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }
}

fn identifier_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Reduces a date-like string to its calendar day (`YYYY-MM-DD`), dropping any
/// time-of-day or zone suffix. Inputs that do not start with a calendar day
/// are returned unchanged.
pub fn normalize_date(raw: &str) -> String {
    let re = Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("date pattern");
    match re.captures(raw.trim()) {
        Some(caps) => caps[1].to_string(),
        None => raw.trim().to_string(),
    }
}

/// Parses a value typed on the command line into the shape the field expects.
pub fn parse_cli_value(kind: FieldKind, raw: &str) -> Result<FieldValue, String> {
    match kind {
        FieldKind::Flag => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(FieldValue::Flag(true)),
            "false" | "no" | "0" => Ok(FieldValue::Flag(false)),
            other => Err(format!("expected true/false, got '{other}'")),
        },
        FieldKind::Rows(_) => {
            let rows: Vec<BTreeMap<String, Value>> = serde_json::from_str(raw)
                .map_err(|e| format!("expected a JSON array of objects: {e}"))?;
            let rows = rows
                .into_iter()
                .map(|row| {
                    row.iter()
                        .map(|(name, value)| (name.clone(), json_to_string(value)))
                        .collect()
                })
                .collect();
            Ok(FieldValue::Rows(rows))
        }
        FieldKind::Date => Ok(FieldValue::Text(normalize_date(raw))),
        _ => Ok(FieldValue::Text(raw.to_string())),
    }
}

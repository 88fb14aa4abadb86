//! FILENAME: tabula-format/src/record.rs
//! PURPOSE: The opaque key-value record every saved object becomes.
//! CONTEXT: A record is a name-to-field map; a field is a primitive, a
//! list or a nested record. Versioning is a convention on top: top-level
//! records carry an integer "version" field that readers check before
//! interpreting anything else. The shape mirrors JSON exactly, so records
//! serialize to plain JSON objects with no wrapper, and any container
//! format that can hold JSON can hold a record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

// ============================================================================
// Field
// ============================================================================

/// One value in a record. Untagged on the wire: each JSON shape maps to
/// exactly one variant, with whole numbers preferring `Integer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    List(Vec<Field>),
    Record(Record),
}

impl Field {
    /// The shape name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Null => "null",
            Field::Boolean(_) => "boolean",
            Field::Integer(_) => "integer",
            Field::Double(_) => "double",
            Field::Text(_) => "text",
            Field::List(_) => "list",
            Field::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Field::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Doubles and integers both answer; everything else does not.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Field::Double(d) => Some(*d),
            Field::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Field::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Field::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Field::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Field {
        Field::Boolean(value)
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Field {
        Field::Integer(value)
    }
}

impl From<u32> for Field {
    fn from(value: u32) -> Field {
        Field::Integer(i64::from(value))
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Field {
        Field::Double(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Field {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Field {
        Field::Text(value)
    }
}

impl From<Vec<Field>> for Field {
    fn from(value: Vec<Field>) -> Field {
        Field::List(value)
    }
}

impl From<Record> for Field {
    fn from(value: Record) -> Field {
        Field::Record(value)
    }
}

impl From<serde_json::Value> for Field {
    fn from(value: serde_json::Value) -> Field {
        match value {
            serde_json::Value::Null => Field::Null,
            serde_json::Value::Bool(b) => Field::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Field::Integer(i),
                None => match n.as_f64() {
                    Some(d) => Field::Double(d),
                    None => Field::Null,
                },
            },
            serde_json::Value::String(s) => Field::Text(s),
            serde_json::Value::Array(items) => {
                Field::List(items.into_iter().map(Field::from).collect())
            }
            serde_json::Value::Object(map) => {
                let mut record = Record::new();
                for (name, item) in map {
                    record.set(name, Field::from(item));
                }
                Field::Record(record)
            }
        }
    }
}

impl From<Field> for serde_json::Value {
    fn from(field: Field) -> serde_json::Value {
        match field {
            Field::Null => serde_json::Value::Null,
            Field::Boolean(b) => serde_json::Value::Bool(b),
            Field::Integer(i) => serde_json::Value::from(i),
            Field::Double(d) => serde_json::Value::from(d),
            Field::Text(s) => serde_json::Value::String(s),
            Field::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Field::Record(record) => serde_json::Value::Object(
                record
                    .fields
                    .into_iter()
                    .map(|(name, item)| (name, serde_json::Value::from(item)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// A named-field container. Field order is not semantic; names are looked
/// up, and the map keeps output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Field>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    /// A record stamped with the "version" field readers check first.
    pub fn versioned(version: u32) -> Record {
        Record::new().with("version", version)
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: impl Into<String>, field: impl Into<Field>) -> Record {
        self.set(name, field);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        self.fields.insert(name.into(), field.into());
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // ========================================================================
    // Typed access
    // ========================================================================

    pub fn require(&self, name: &str) -> Result<&Field, FormatError> {
        self.field(name)
            .ok_or_else(|| FormatError::missing_field(name))
    }

    pub fn text(&self, name: &str) -> Result<&str, FormatError> {
        let field = self.require(name)?;
        field
            .as_text()
            .ok_or_else(|| FormatError::wrong_type(name, "text", field.kind()))
    }

    pub fn integer(&self, name: &str) -> Result<i64, FormatError> {
        let field = self.require(name)?;
        field
            .as_integer()
            .ok_or_else(|| FormatError::wrong_type(name, "integer", field.kind()))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, FormatError> {
        let field = self.require(name)?;
        field
            .as_boolean()
            .ok_or_else(|| FormatError::wrong_type(name, "boolean", field.kind()))
    }

    pub fn record(&self, name: &str) -> Result<&Record, FormatError> {
        let field = self.require(name)?;
        field
            .as_record()
            .ok_or_else(|| FormatError::wrong_type(name, "record", field.kind()))
    }

    pub fn list(&self, name: &str) -> Result<&[Field], FormatError> {
        let field = self.require(name)?;
        field
            .as_list()
            .ok_or_else(|| FormatError::wrong_type(name, "list", field.kind()))
    }

    /// The record's version stamp.
    pub fn version(&self) -> Result<u32, FormatError> {
        let version = self.integer("version")?;
        u32::try_from(version)
            .map_err(|_| FormatError::malformed(format!("version {version} is not a count")))
    }

    // ========================================================================
    // JSON interchange
    // ========================================================================

    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Record, FormatError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record::versioned(1)
            .with("name", "orders")
            .with("rows", 42i64)
            .with("ratio", 0.5)
            .with("active", true)
            .with(
                "tags",
                vec![Field::from("a"), Field::from("b")],
            )
            .with("nested", Record::new().with("inner", 7i64))
    }

    #[test]
    fn test_typed_access_answers_for_matching_shapes() {
        let record = sample();
        assert_eq!(record.version().unwrap(), 1);
        assert_eq!(record.text("name").unwrap(), "orders");
        assert_eq!(record.integer("rows").unwrap(), 42);
        assert!(record.boolean("active").unwrap());
        assert_eq!(record.list("tags").unwrap().len(), 2);
        assert_eq!(record.record("nested").unwrap().integer("inner").unwrap(), 7);
    }

    #[test]
    fn test_missing_and_mismatched_fields_are_told_apart() {
        let record = sample();
        assert!(matches!(
            record.text("absent"),
            Err(FormatError::MissingField(name)) if name == "absent"
        ));
        assert!(matches!(
            record.text("rows"),
            Err(FormatError::WrongType { expected: "text", found: "integer", .. })
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_the_record() {
        let record = sample();
        let json = record.to_json().unwrap();
        let back = Record::from_json(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn test_json_shape_is_a_plain_object() {
        let json = Record::versioned(1).with("name", "x").to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn test_whole_numbers_read_back_as_integers() {
        let back = Record::from_json("{\"n\": 5, \"d\": 5.5, \"none\": null}").unwrap();
        assert_eq!(back.field("n"), Some(&Field::Integer(5)));
        assert_eq!(back.field("d"), Some(&Field::Double(5.5)));
        assert!(back.field("none").is_some_and(Field::is_null));
    }

    #[test]
    fn test_json_value_bridge_is_lossless() {
        let value = serde_json::json!({
            "text": "t",
            "int": 3,
            "double": 2.5,
            "flag": false,
            "gap": null,
            "items": [1, "two"],
            "inner": {"deep": true},
        });
        let field = Field::from(value.clone());
        assert_eq!(serde_json::Value::from(field), value);
    }
}

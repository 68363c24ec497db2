//! Attribute values
//!
//! Raw records carry loosely-typed attribute values. They are modelled as a
//! closed tagged union so that type inference and coercion can match on every
//! case exhaustively.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered attribute mapping (attribute name -> value).
///
/// Insertion order is the order in which the source file presented the
/// attributes, and is preserved through serialization.
pub type Attributes = IndexMap<String, AttributeValue>;

/// A single attribute value.
///
/// Format readers only ever produce `Null`, `Bool`, `Integer`, `Decimal` and
/// `Text`. The temporal variants are produced by coercion during conversion.
///
/// Values serialize as plain JSON scalars; temporal values become ISO-8601
/// strings and therefore read back as `Text`.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::models::AttributeValue;
///
/// let value = AttributeValue::from("42");
/// assert_eq!(value.to_string(), "42");
/// assert!(!value.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl AttributeValue {
    /// Whether the value is null.
    ///
    /// Blank text counts as null: a cell holding only whitespace carries no
    /// type information.
    pub fn is_null(&self) -> bool {
        match self {
            AttributeValue::Null => true,
            AttributeValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "boolean",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Decimal(_) => "decimal",
            AttributeValue::Text(_) => "text",
            AttributeValue::DateTime(_) => "datetime",
            AttributeValue::Date(_) => "date",
            AttributeValue::Time(_) => "time",
        }
    }

    /// Convert a JSON value into an attribute value.
    ///
    /// Numbers become `Integer` when they fit an `i64`, otherwise `Decimal`.
    /// Arrays and objects have no scalar form and are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    AttributeValue::Integer(i)
                } else {
                    n.as_f64()
                        .map(AttributeValue::Decimal)
                        .unwrap_or(AttributeValue::Null)
                }
            }
            serde_json::Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Decimal(d) => write!(f, "{}", d),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            AttributeValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AttributeValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Decimal(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

//! Value coercion to category field types
//!
//! Coercion reuses the inference detectors, so a value that inference found
//! compatible with a type always coerces to it.

use chrono::{NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::inference::detect::{
    parse_boolean, parse_date, parse_datetime, parse_integer, parse_numeric, parse_time,
};
use crate::models::{AttributeValue, FieldDefinition, FieldType};

/// A value could not be coerced to a field type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CoercionError {
    #[error("Cannot convert {kind} value '{value}' to {target}")]
    Incompatible {
        value: String,
        kind: String,
        target: FieldType,
    },
    #[error("'{value}' is not one of the allowed options: {}", .options.join(", "))]
    NotAnOption { value: String, options: Vec<String> },
}

/// Coerce `value` to the type of `field`
///
/// Null and blank values stay null whatever the target type.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::convert::coercion::coerce;
/// use geo_import_sdk::models::{AttributeValue, FieldDefinition, FieldType};
///
/// let field = FieldDefinition::new("height", FieldType::Decimal);
/// assert_eq!(
///     coerce(&AttributeValue::from("12.5"), &field).unwrap(),
///     AttributeValue::Decimal(12.5)
/// );
/// assert!(coerce(&AttributeValue::from("tall"), &field).is_err());
/// ```
pub fn coerce(value: &AttributeValue, field: &FieldDefinition) -> Result<AttributeValue, CoercionError> {
    if value.is_null() {
        return Ok(AttributeValue::Null);
    }

    let coerced = match field.field_type {
        FieldType::Text => Some(match value {
            AttributeValue::Text(text) => AttributeValue::Text(text.clone()),
            other => AttributeValue::Text(other.to_string()),
        }),
        FieldType::Boolean => match value {
            AttributeValue::Bool(b) => Some(AttributeValue::Bool(*b)),
            AttributeValue::Text(text) => parse_boolean(text).map(AttributeValue::Bool),
            _ => None,
        },
        FieldType::Integer => match value {
            AttributeValue::Integer(i) => Some(AttributeValue::Integer(*i)),
            AttributeValue::Decimal(d) => whole(*d).map(AttributeValue::Integer),
            AttributeValue::Text(text) => parse_integer(text)
                .or_else(|| parse_numeric(text).and_then(whole))
                .map(AttributeValue::Integer),
            _ => None,
        },
        FieldType::Decimal => match value {
            AttributeValue::Integer(i) => Some(AttributeValue::Decimal(*i as f64)),
            AttributeValue::Decimal(d) => Some(AttributeValue::Decimal(*d)),
            AttributeValue::Text(text) => parse_numeric(text).map(AttributeValue::Decimal),
            _ => None,
        },
        FieldType::Date => match value {
            AttributeValue::Date(d) => Some(AttributeValue::Date(*d)),
            AttributeValue::Text(text) => parse_date(text).map(AttributeValue::Date),
            _ => None,
        },
        FieldType::Time => match value {
            AttributeValue::Time(t) => Some(AttributeValue::Time(*t)),
            AttributeValue::Text(text) => parse_time(text).map(AttributeValue::Time),
            _ => None,
        },
        FieldType::DateTime => match value {
            AttributeValue::DateTime(dt) => Some(AttributeValue::DateTime(*dt)),
            AttributeValue::Date(d) => Some(midnight_utc(*d)),
            AttributeValue::Text(text) => parse_datetime(text)
                .map(AttributeValue::DateTime)
                .or_else(|| parse_date(text).map(midnight_utc)),
            _ => None,
        },
        FieldType::Lookup => {
            let text = value.to_string();
            let text = text.trim();
            return field
                .options
                .iter()
                .find(|option| option.as_str() == text)
                .map(|option| AttributeValue::Text(option.clone()))
                .ok_or_else(|| CoercionError::NotAnOption {
                    value: text.to_string(),
                    options: field.options.clone(),
                });
        }
    };

    coerced.ok_or_else(|| CoercionError::Incompatible {
        value: value.to_string(),
        kind: value.kind().to_string(),
        target: field.field_type,
    })
}

/// Decimal with no fractional part that fits an `i64`
fn whole(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

fn midnight_utc(date: chrono::NaiveDate) -> AttributeValue {
    let naive = date.and_time(NaiveTime::MIN);
    AttributeValue::DateTime(Utc.from_utc_datetime(&naive).fixed_offset())
}

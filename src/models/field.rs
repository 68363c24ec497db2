//! Category field model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value type of a category field
///
/// The variant order is the inference preference order: earlier variants are
/// more specific. `Lookup` is never inferred; it only exists on category
/// fields that restrict values to a fixed set of options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Integer,
    Decimal,
    Date,
    Time,
    #[serde(rename = "datetime")]
    DateTime,
    Text,
    Lookup,
}

impl FieldType {
    /// All field types that can come out of inference, most specific first
    pub const INFERENCE_ORDER: [FieldType; 7] = [
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::Decimal,
        FieldType::Date,
        FieldType::Time,
        FieldType::DateTime,
        FieldType::Text,
    ];

    /// Whether this type accepts any value through its text form
    pub fn accepts_any(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Lookup)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "datetime",
            FieldType::Text => "text",
            FieldType::Lookup => "lookup",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "integer" | "int" => Ok(FieldType::Integer),
            "decimal" | "numeric" | "number" => Ok(FieldType::Decimal),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "datetime" | "timestamp" => Ok(FieldType::DateTime),
            "text" | "string" => Ok(FieldType::Text),
            "lookup" => Ok(FieldType::Lookup),
            _ => Err(format!("Unknown field type: {}", s)),
        }
    }
}

/// A typed field of a category
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::models::{FieldDefinition, FieldType};
///
/// let field = FieldDefinition::new("height", FieldType::Decimal).required();
/// assert!(field.required);
/// assert_eq!(field.name, "height");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Stable key used in contribution values
    pub key: String,
    /// Display name
    pub name: String,
    pub field_type: FieldType,
    /// Whether the platform requires a value for this field
    #[serde(default)]
    pub required: bool,
    /// Allowed values for lookup fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldDefinition {
    /// Create an optional field whose name equals its key
    pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            field_type,
            required: false,
            options: Vec::new(),
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the allowed lookup options
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }
}

/// A field discovered in an uploaded file
///
/// `name` is the attribute name exactly as it appears in the staged
/// features; `key` is its normalized form, suggested when a new category
/// field is created from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredField {
    pub name: String,
    pub key: String,
    /// Most specific type consistent with every observed value
    pub field_type: FieldType,
    /// Every type all observed values are compatible with, most specific first
    pub candidate_types: Vec<FieldType>,
    /// Number of records holding a non-null value
    pub non_null_count: usize,
}

impl InferredField {
    /// Whether a category field of `target` type can hold this field's values
    pub fn is_compatible_with(&self, target: FieldType) -> bool {
        target.accepts_any() || self.candidate_types.contains(&target)
    }
}

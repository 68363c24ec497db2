//! Field mapping model

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::AttributeValue;

/// One source attribute -> category field association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    /// Attribute name in the staged features
    pub source_key: String,
    /// Category field key
    pub target_key: String,
}

/// Mapping from staged attribute keys to category field keys
///
/// Source keys without an entry are dropped at conversion. Target fields
/// without an entry are left unset unless a default is given.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::models::{AttributeValue, FieldMapping};
///
/// let mapping = FieldMapping::new()
///     .map("Name", "name")
///     .with_default("status", AttributeValue::from("surveyed"));
/// assert_eq!(mapping.target_for("Name"), Some("name"));
/// assert_eq!(mapping.target_for("status"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    #[serde(default)]
    pub entries: Vec<MappingEntry>,
    /// Values used for a target field when its source is null or absent
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub defaults: IndexMap<String, AttributeValue>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source -> target entry
    pub fn map(mut self, source_key: impl Into<String>, target_key: impl Into<String>) -> Self {
        self.entries.push(MappingEntry {
            source_key: source_key.into(),
            target_key: target_key.into(),
        });
        self
    }

    /// Add a default value for a target field
    pub fn with_default(mut self, target_key: impl Into<String>, value: AttributeValue) -> Self {
        self.defaults.insert(target_key.into(), value);
        self
    }

    /// Target key mapped from `source_key`
    pub fn target_for(&self, source_key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.source_key == source_key)
            .map(|e| e.target_key.as_str())
    }

    /// Whether `target_key` receives a value from a source or a default
    pub fn fills_target(&self, target_key: &str) -> bool {
        self.defaults.contains_key(target_key)
            || self.entries.iter().any(|e| e.target_key == target_key)
    }

    /// Every target key referenced by entries or defaults
    pub fn target_keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|e| e.target_key.as_str())
            .chain(self.defaults.keys().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.defaults.is_empty()
    }
}

//! Field reconciliation
//!
//! Aligns the fields discovered in an upload with the typed fields of the
//! target category and validates administrator-submitted mappings. Both
//! operations are pure and can be re-run at any time.

use crate::convert::coercion::coerce;
use crate::models::{FieldDefinition, FieldMapping, FieldType, InferredField};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Errors in a submitted field mapping
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MappingError {
    #[error("Source field '{0}' does not exist in the import")]
    UnknownSource(String),
    #[error("Target field '{0}' does not exist in the category")]
    UnknownTarget(String),
    #[error("Source field '{0}' is mapped more than once")]
    DuplicateSource(String),
    #[error("Target field '{0}' is mapped more than once")]
    DuplicateTarget(String),
    #[error("Source field '{source_key}' ({source_type}) cannot fill '{target_key}' ({target_type})")]
    TypeMismatch {
        source_key: String,
        target_key: String,
        source_type: FieldType,
        target_type: FieldType,
    },
    #[error("Default for '{target_key}' is invalid: {reason}")]
    InvalidDefault { target_key: String, reason: String },
}

/// An inferred field that lines up with a category field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatch {
    /// Attribute name in the staged features
    pub source: String,
    /// Category field key
    pub target: String,
    pub source_type: FieldType,
    pub target_type: FieldType,
}

/// An inferred field whose name matches a category field of an
/// incompatible type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConflict {
    pub source: String,
    pub target: String,
    pub source_type: FieldType,
    pub target_type: FieldType,
}

/// Outcome of reconciling an import's fields with a category.
///
/// `matched`, `unmapped_source` and `conflicts` partition the inferred
/// fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "reconciliation results should be presented or turned into a mapping"]
pub struct ReconciliationResult {
    pub matched: Vec<FieldMatch>,
    /// Inferred fields with no counterpart in the category
    pub unmapped_source: Vec<InferredField>,
    /// Required category fields that nothing fills
    pub unfilled_target: Vec<FieldDefinition>,
    pub conflicts: Vec<FieldConflict>,
    pub warnings: Vec<String>,
}

impl ReconciliationResult {
    /// Mapping built from the matched fields
    pub fn suggested_mapping(&self) -> FieldMapping {
        FieldMapping::from_matches(&self.matched)
    }

    pub fn is_complete(&self) -> bool {
        self.unmapped_source.is_empty() && self.unfilled_target.is_empty() && self.conflicts.is_empty()
    }
}

impl FieldMapping {
    /// One entry per match, in match order
    pub fn from_matches(matches: &[FieldMatch]) -> Self {
        matches
            .iter()
            .fold(FieldMapping::new(), |mapping, m| mapping.map(&m.source, &m.target))
    }
}

/// Whether a category field of type `target` can hold the values of `source`
pub fn is_compatible(source: &InferredField, target: &FieldDefinition) -> bool {
    source.is_compatible_with(target.field_type)
}

/// Reconciles inferred fields against category field definitions.
#[derive(Debug, Default, Clone)]
pub struct FieldReconciler;

impl FieldReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Match inferred fields to category fields by name or key.
    ///
    /// A source matches a category field whose key equals the source name or
    /// normalized key, or whose display name equals the source name ignoring
    /// case. Each category field is matched at most once; the first source
    /// wins.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo_import_sdk::mapping::FieldReconciler;
    /// use geo_import_sdk::models::{FieldDefinition, FieldType, InferredField};
    ///
    /// let inferred = vec![InferredField {
    ///     name: "Name".to_string(),
    ///     key: "name".to_string(),
    ///     field_type: FieldType::Text,
    ///     candidate_types: vec![FieldType::Text, FieldType::Lookup],
    ///     non_null_count: 3,
    /// }];
    /// let fields = vec![FieldDefinition::new("name", FieldType::Text).required()];
    ///
    /// let result = FieldReconciler::new().reconcile(&inferred, &fields);
    /// assert_eq!(result.matched.len(), 1);
    /// assert!(result.unfilled_target.is_empty());
    /// ```
    pub fn reconcile(
        &self,
        inferred: &[InferredField],
        fields: &[FieldDefinition],
    ) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        let mut claimed: HashSet<&str> = HashSet::new();

        for source in inferred {
            let target = fields.iter().find(|f| {
                !claimed.contains(f.key.as_str())
                    && (f.key == source.name
                        || f.key == source.key
                        || f.name.eq_ignore_ascii_case(&source.name))
            });

            match target {
                Some(target) if is_compatible(source, target) => {
                    claimed.insert(target.key.as_str());
                    result.matched.push(FieldMatch {
                        source: source.name.clone(),
                        target: target.key.clone(),
                        source_type: source.field_type,
                        target_type: target.field_type,
                    });
                }
                Some(target) => {
                    result.warnings.push(format!(
                        "Field '{}' looks like '{}' but holds {} values, not {}",
                        source.name, target.key, source.field_type, target.field_type
                    ));
                    result.conflicts.push(FieldConflict {
                        source: source.name.clone(),
                        target: target.key.clone(),
                        source_type: source.field_type,
                        target_type: target.field_type,
                    });
                }
                None => result.unmapped_source.push(source.clone()),
            }
        }

        for field in fields.iter().filter(|f| f.required) {
            if !claimed.contains(field.key.as_str()) {
                result
                    .warnings
                    .push(format!("Required field '{}' has no source", field.key));
                result.unfilled_target.push(field.clone());
            }
        }

        debug!(
            matched = result.matched.len(),
            unmapped = result.unmapped_source.len(),
            unfilled = result.unfilled_target.len(),
            conflicts = result.conflicts.len(),
            "Reconciled fields"
        );
        result
    }

    /// Check a submitted mapping against the import and the category.
    ///
    /// Returns warnings for required category fields the mapping leaves
    /// unfilled; these never block the mapping.
    pub fn validate(
        &self,
        inferred: &[InferredField],
        fields: &[FieldDefinition],
        mapping: &FieldMapping,
    ) -> Result<Vec<String>, MappingError> {
        let mut sources = HashSet::new();
        let mut targets = HashSet::new();

        for entry in &mapping.entries {
            let source = inferred
                .iter()
                .find(|f| f.name == entry.source_key)
                .ok_or_else(|| MappingError::UnknownSource(entry.source_key.clone()))?;
            let target = fields
                .iter()
                .find(|f| f.key == entry.target_key)
                .ok_or_else(|| MappingError::UnknownTarget(entry.target_key.clone()))?;

            if !sources.insert(entry.source_key.as_str()) {
                return Err(MappingError::DuplicateSource(entry.source_key.clone()));
            }
            if !targets.insert(entry.target_key.as_str()) {
                return Err(MappingError::DuplicateTarget(entry.target_key.clone()));
            }
            if !is_compatible(source, target) {
                return Err(MappingError::TypeMismatch {
                    source_key: source.name.clone(),
                    target_key: target.key.clone(),
                    source_type: source.field_type,
                    target_type: target.field_type,
                });
            }
        }

        for (target_key, value) in &mapping.defaults {
            let target = fields
                .iter()
                .find(|f| &f.key == target_key)
                .ok_or_else(|| MappingError::UnknownTarget(target_key.clone()))?;
            coerce(value, target).map_err(|e| MappingError::InvalidDefault {
                target_key: target_key.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(fields
            .iter()
            .filter(|f| f.required && !mapping.fills_target(&f.key))
            .map(|f| format!("Required field '{}' is not mapped", f.key))
            .collect())
    }
}

/// Reconcile with the default reconciler.
pub fn reconcile(inferred: &[InferredField], fields: &[FieldDefinition]) -> ReconciliationResult {
    FieldReconciler::new().reconcile(inferred, fields)
}

/// Validate a mapping with the default reconciler.
pub fn validate_mapping(
    inferred: &[InferredField],
    fields: &[FieldDefinition],
    mapping: &FieldMapping,
) -> Result<Vec<String>, MappingError> {
    FieldReconciler::new().validate(inferred, fields, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeValue;

    fn inferred(name: &str, field_type: FieldType) -> InferredField {
        let mut candidate_types = match field_type {
            FieldType::Integer => vec![FieldType::Integer, FieldType::Decimal, FieldType::Text],
            FieldType::Text => vec![FieldType::Text],
            other => vec![other, FieldType::Text],
        };
        candidate_types.push(FieldType::Lookup);
        InferredField {
            name: name.to_string(),
            key: crate::validation::normalize_field_key(name),
            field_type,
            candidate_types,
            non_null_count: 1,
        }
    }

    #[test]
    fn test_partition_of_inferred_fields() {
        let inferred = vec![
            inferred("Name", FieldType::Text),
            inferred("height", FieldType::Integer),
            inferred("planted", FieldType::Text),
            inferred("colour", FieldType::Text),
        ];
        let fields = vec![
            FieldDefinition::new("name", FieldType::Text).required(),
            FieldDefinition::new("height", FieldType::Decimal),
            FieldDefinition::new("planted", FieldType::Date),
            FieldDefinition::new("species", FieldType::Text).required(),
        ];

        let result = reconcile(&inferred, &fields);
        let matched: Vec<(&str, &str)> = result
            .matched
            .iter()
            .map(|m| (m.source.as_str(), m.target.as_str()))
            .collect();
        assert_eq!(matched, vec![("Name", "name"), ("height", "height")]);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].target, "planted");
        assert_eq!(result.unmapped_source.len(), 1);
        assert_eq!(result.unmapped_source[0].name, "colour");
        assert_eq!(result.unfilled_target.len(), 1);
        assert_eq!(result.unfilled_target[0].key, "species");
        assert!(!result.is_complete());

        let total = result.matched.len() + result.conflicts.len() + result.unmapped_source.len();
        assert_eq!(total, inferred.len());
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let inferred = vec![inferred("name", FieldType::Text)];
        let fields = vec![FieldDefinition::new("name", FieldType::Lookup)];
        assert_eq!(reconcile(&inferred, &fields), reconcile(&inferred, &fields));
        assert_eq!(
            reconcile(&inferred, &fields).suggested_mapping(),
            FieldMapping::new().map("name", "name")
        );
    }

    #[test]
    fn test_validate_mapping_errors() {
        let inferred = vec![
            inferred("name", FieldType::Text),
            inferred("count", FieldType::Integer),
        ];
        let fields = vec![
            FieldDefinition::new("title", FieldType::Text),
            FieldDefinition::new("visited", FieldType::Date),
            FieldDefinition::new("total", FieldType::Decimal).required(),
        ];

        assert_eq!(
            validate_mapping(&inferred, &fields, &FieldMapping::new().map("nope", "title")),
            Err(MappingError::UnknownSource("nope".to_string()))
        );
        assert_eq!(
            validate_mapping(&inferred, &fields, &FieldMapping::new().map("name", "nope")),
            Err(MappingError::UnknownTarget("nope".to_string()))
        );
        assert_eq!(
            validate_mapping(
                &inferred,
                &fields,
                &FieldMapping::new().map("name", "title").map("count", "title")
            ),
            Err(MappingError::DuplicateTarget("title".to_string()))
        );
        assert!(matches!(
            validate_mapping(&inferred, &fields, &FieldMapping::new().map("name", "visited")),
            Err(MappingError::TypeMismatch { .. })
        ));
        assert!(matches!(
            validate_mapping(
                &inferred,
                &fields,
                &FieldMapping::new().with_default("visited", AttributeValue::from("soon"))
            ),
            Err(MappingError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn test_validate_mapping_warns_on_unfilled_required() {
        let inferred = vec![inferred("count", FieldType::Integer)];
        let fields = vec![
            FieldDefinition::new("total", FieldType::Decimal).required(),
            FieldDefinition::new("status", FieldType::Text).required(),
        ];

        let warnings = validate_mapping(
            &inferred,
            &fields,
            &FieldMapping::new().map("count", "total"),
        )
        .unwrap();
        assert_eq!(warnings, vec!["Required field 'status' is not mapped".to_string()]);

        let warnings = validate_mapping(
            &inferred,
            &fields,
            &FieldMapping::new()
                .map("count", "total")
                .with_default("status", AttributeValue::from("surveyed")),
        )
        .unwrap();
        assert!(warnings.is_empty());
    }
}

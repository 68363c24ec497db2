//! Schema inference
//!
//! Scans the raw records of one upload and proposes a field per attribute
//! key with the most specific type consistent with every observed value.

pub mod detect;

use crate::models::{AttributeValue, FieldType, InferredField, RawRecord};
use crate::validation::input::normalize_field_key;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

pub use detect::{is_boolean, is_date, is_datetime, is_integer, is_numeric, is_time};

/// Field types a single non-null value is compatible with.
///
/// `Text` is always included. `Lookup` is never included here because it is
/// not an inference result; see [`InferredField::candidate_types`].
pub fn compatible_types(value: &AttributeValue) -> Vec<FieldType> {
    let mut types = match value {
        AttributeValue::Null => return FieldType::INFERENCE_ORDER.to_vec(),
        AttributeValue::Bool(_) => vec![FieldType::Boolean],
        AttributeValue::Integer(_) => vec![FieldType::Integer, FieldType::Decimal],
        AttributeValue::Decimal(_) => vec![FieldType::Decimal],
        AttributeValue::DateTime(_) => vec![FieldType::DateTime],
        AttributeValue::Date(_) => vec![FieldType::Date, FieldType::DateTime],
        AttributeValue::Time(_) => vec![FieldType::Time],
        AttributeValue::Text(text) => {
            let mut types = Vec::new();
            if detect::is_boolean(text) {
                types.push(FieldType::Boolean);
            }
            if detect::is_integer(text) {
                types.push(FieldType::Integer);
            }
            if detect::is_numeric(text) {
                types.push(FieldType::Decimal);
            }
            let is_date = detect::is_date(text);
            if is_date {
                types.push(FieldType::Date);
            }
            if detect::is_time(text) {
                types.push(FieldType::Time);
            }
            if is_date || detect::is_datetime(text) {
                types.push(FieldType::DateTime);
            }
            types
        }
    };
    types.push(FieldType::Text);
    types
}

/// Per-key accumulator
struct Observation {
    candidates: Option<HashSet<FieldType>>,
    non_null: usize,
}

/// Proposes fields for a set of raw records.
///
/// # Example
///
/// ```rust
/// use geo_import_sdk::inference::SchemaInferencer;
/// use geo_import_sdk::models::{Attributes, AttributeValue, FieldType, Geometry, RawRecord};
///
/// let records: Vec<RawRecord> = ["1", "2", "3"]
///     .iter()
///     .map(|v| {
///         let mut attributes = Attributes::new();
///         attributes.insert("count".to_string(), AttributeValue::from(*v));
///         RawRecord::new(Geometry::point(0.0, 0.0).unwrap(), attributes)
///     })
///     .collect();
///
/// let fields = SchemaInferencer::new().infer(&records);
/// assert_eq!(fields[0].field_type, FieldType::Integer);
/// ```
#[derive(Debug, Default, Clone)]
pub struct SchemaInferencer;

impl SchemaInferencer {
    pub fn new() -> Self {
        Self
    }

    /// Infer one field per distinct attribute key, in order of first
    /// occurrence.
    pub fn infer(&self, records: &[RawRecord]) -> Vec<InferredField> {
        let mut observations: IndexMap<&str, Observation> = IndexMap::new();

        for record in records {
            for (name, value) in &record.attributes {
                let observation = observations.entry(name.as_str()).or_insert(Observation {
                    candidates: None,
                    non_null: 0,
                });
                if value.is_null() {
                    continue;
                }
                observation.non_null += 1;
                let compatible: HashSet<FieldType> = compatible_types(value).into_iter().collect();
                observation.candidates = Some(match observation.candidates.take() {
                    Some(current) => current.intersection(&compatible).copied().collect(),
                    None => compatible,
                });
            }
        }

        let mut used_keys = HashSet::new();
        let fields: Vec<InferredField> = observations
            .into_iter()
            .map(|(name, observation)| {
                let mut candidate_types: Vec<FieldType> = match &observation.candidates {
                    Some(set) => FieldType::INFERENCE_ORDER
                        .into_iter()
                        .filter(|t| set.contains(t))
                        .collect(),
                    None => vec![FieldType::Text],
                };
                let field_type = candidate_types.first().copied().unwrap_or(FieldType::Text);
                candidate_types.push(FieldType::Lookup);

                InferredField {
                    name: name.to_string(),
                    key: unique_key(name, &mut used_keys),
                    field_type,
                    candidate_types,
                    non_null_count: observation.non_null,
                }
            })
            .collect();

        debug!(records = records.len(), fields = fields.len(), "Inferred schema");
        fields
    }
}

/// Infer fields with the default inferencer.
pub fn infer_schema(records: &[RawRecord]) -> Vec<InferredField> {
    SchemaInferencer::new().infer(records)
}

/// Normalized key for `name`, suffixed when another field already took it
fn unique_key(name: &str, used: &mut HashSet<String>) -> String {
    let base = normalize_field_key(name);
    let mut key = base.clone();
    let mut n = 2;
    while !used.insert(key.clone()) {
        key = format!("{}_{}", base, n);
        n += 1;
    }
    key
}

//! Contribution handoff types
//!
//! Contributions belong to the platform's content store. The import pipeline
//! only builds the request and keeps the returned reference.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::geometry::Geometry;
use super::value::AttributeValue;

/// Opaque reference to a created contribution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionRef(pub String);

impl ContributionRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContributionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to create one contribution
///
/// `values` holds coerced values keyed by category field key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContribution {
    pub project_id: Uuid,
    pub category_id: Uuid,
    pub geometry: Geometry,
    pub values: IndexMap<String, AttributeValue>,
}

//! Raw records and staged features

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::contribution::ContributionRef;
use super::geometry::Geometry;
use super::value::Attributes;

/// One record produced by a format reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RawRecord {
    pub fn new(geometry: Geometry, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }
}

/// A parsed record awaiting conversion
///
/// `imported` flips from false to true exactly once, through the staging
/// store's `mark_converted`. After that the feature is never converted again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFeature {
    pub id: Uuid,
    /// Owning import job
    pub import_id: Uuid,
    /// Position of the record in the uploaded file (0-based)
    pub sequence: u64,
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub imported: bool,
    /// Contribution created from this feature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution: Option<ContributionRef>,
}

impl StagedFeature {
    /// Create an unconverted feature from a raw record
    pub fn from_record(import_id: Uuid, sequence: u64, record: RawRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            import_id,
            sequence,
            geometry: record.geometry,
            attributes: record.attributes,
            imported: false,
            contribution: None,
        }
    }
}

/// Feature counts of one import job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCounts {
    pub total: usize,
    pub imported: usize,
}

impl FeatureCounts {
    /// Features still awaiting conversion
    pub fn remaining(&self) -> usize {
        self.total - self.imported
    }
}

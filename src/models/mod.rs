//! Models module for the SDK
//!
//! Defines the core data structures shared by readers, staging, mapping and
//! conversion.

pub mod contribution;
pub mod enums;
pub mod feature;
pub mod field;
pub mod geometry;
pub mod import_job;
pub mod mapping;
pub mod value;

pub use contribution::{ContributionRef, NewContribution};
pub use enums::*;
pub use feature::{FeatureCounts, RawRecord, StagedFeature};
pub use field::{FieldDefinition, FieldType, InferredField};
pub use geometry::{Coordinate, Geometry, GeometryError};
pub use import_job::{ImportJob, TransitionError};
pub use mapping::{FieldMapping, MappingEntry};
pub use value::{AttributeValue, Attributes};

//! Geo Import SDK - Geospatial data import pipeline
//!
//! Provides unified interfaces for:
//! - Reading CSV, GeoJSON, KML and GPX uploads into raw records
//! - Inferring a typed schema from the records
//! - Reconciling the inferred fields with a target category
//! - Staging features and converting them into contributions
//! - Driving import jobs through their lifecycle

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod convert;
pub mod import;
pub mod inference;
pub mod mapping;
pub mod models;
pub mod platform;
pub mod staging;
pub mod validation;
pub mod workflow;

// Re-export commonly used types
pub use config::{ConfigError, ImportConfig};
pub use convert::{
    ConversionEngine, ConversionError, ConversionState, ConversionSummary, FeatureError,
    FeatureFailure, FeatureSelection,
};
pub use import::{
    CSVImporter, GPXImporter, GeoJSONImporter, ImportError, ImportResult, KMLImporter,
    ReaderOptions, RecordReader, import_file, reader_for,
};
pub use inference::{SchemaInferencer, infer_schema};
pub use mapping::{FieldReconciler, MappingError, ReconciliationResult, reconcile, validate_mapping};
pub use platform::{
    BlobStore, ContributionSink, FileSystemBlobStore, Platform, ProjectDirectory, SchemaProvider,
};
#[cfg(feature = "duckdb-backend")]
pub use staging::DuckDBStagingStore;
pub use staging::{FeatureCursor, InMemoryStagingStore, StagingError, StagingStore};
pub use validation::{ValidationError, ValidationResult};
pub use workflow::{
    CategoryChoice, ImportProgress, ImportService, NewFieldRequest, UploadRequest, WorkflowError,
};

// Re-export models
pub use models::enums::*;
pub use models::{
    AttributeValue, Attributes, FieldDefinition, FieldMapping, FieldType, Geometry, ImportJob,
    InferredField, RawRecord, StagedFeature,
};

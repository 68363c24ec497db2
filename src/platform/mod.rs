//! Platform collaborators
//!
//! The import pipeline depends on four services owned by the host platform:
//! - `BlobStore`: keeps the uploaded files
//! - `SchemaProvider`: categories and their typed fields
//! - `ContributionSink`: creates contributions
//! - `ProjectDirectory`: project lock state
//!
//! In-memory implementations of all four live in [`memory`]; a filesystem
//! blob store lives in [`filesystem`].

pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ContributionRef, FieldDefinition, NewContribution};

pub use filesystem::FileSystemBlobStore;
pub use memory::{
    InMemoryBlobStore, InMemoryContributionSink, InMemoryProjectDirectory, InMemorySchemaProvider,
};

/// Reference to a stored blob
pub type BlobRef = String;

/// Error type for blob storage
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(String),
}

/// Error type for category/field operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),
    #[error("Field '{0}' already exists in the category")]
    FieldExists(String),
    #[error("Invalid field: {0}")]
    InvalidField(String),
    #[error("Schema provider unavailable: {0}")]
    Unavailable(String),
}

/// Error type for contribution creation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContributionError {
    /// The platform refused the contribution (validation)
    #[error("Contribution rejected: {0}")]
    Rejected(String),
    #[error("Contribution store unavailable: {0}")]
    Unavailable(String),
}

/// Error type for project lookups
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectError {
    #[error("Project not found: {0}")]
    NotFound(Uuid),
    #[error("Project directory unavailable: {0}")]
    Unavailable(String),
}

/// Opaque storage for uploaded files
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a reference to them
    async fn store(&self, name_hint: &str, bytes: &[u8]) -> Result<BlobRef, BlobError>;

    async fn read(&self, blob: &str) -> Result<Vec<u8>, BlobError>;

    /// Release a blob. Deleting a missing blob is not an error.
    async fn delete(&self, blob: &str) -> Result<(), BlobError>;
}

/// Categories and their typed fields
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Fields of a category, in display order
    async fn get_fields(&self, category_id: Uuid) -> Result<Vec<FieldDefinition>, SchemaError>;

    /// Add a field to a category
    async fn create_field(
        &self,
        category_id: Uuid,
        field: FieldDefinition,
    ) -> Result<FieldDefinition, SchemaError>;

    /// Create an empty category in a project and return its id
    async fn create_category(&self, project_id: Uuid, name: &str) -> Result<Uuid, SchemaError>;

    /// Whether `category_id` exists in `project_id`
    async fn category_in_project(
        &self,
        project_id: Uuid,
        category_id: Uuid,
    ) -> Result<bool, SchemaError>;
}

/// Creates contributions on the platform
#[async_trait]
pub trait ContributionSink: Send + Sync {
    async fn create(&self, contribution: NewContribution)
    -> Result<ContributionRef, ContributionError>;
}

/// Project state lookups
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Whether the project is locked against changes
    async fn is_locked(&self, project_id: Uuid) -> Result<bool, ProjectError>;
}

/// The platform services an import service talks to
#[derive(Clone)]
pub struct Platform {
    pub blobs: Arc<dyn BlobStore>,
    pub schema: Arc<dyn SchemaProvider>,
    pub contributions: Arc<dyn ContributionSink>,
    pub projects: Arc<dyn ProjectDirectory>,
}

impl Platform {
    /// Fresh in-memory implementations of every service
    pub fn in_memory() -> Self {
        Self {
            blobs: Arc::new(InMemoryBlobStore::new()),
            schema: Arc::new(InMemorySchemaProvider::new()),
            contributions: Arc::new(InMemoryContributionSink::new()),
            projects: Arc::new(InMemoryProjectDirectory::new()),
        }
    }
}

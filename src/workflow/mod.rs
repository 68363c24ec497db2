//! Import workflow
//!
//! [`ImportService`] drives an import job from upload to conversion:
//!
//! 1. `upload`: parse the file, infer its fields, store the blob and stage
//!    one feature per record
//! 2. `attach_category`: pick an existing category or create one
//! 3. `create_field` / `reconcile` / `submit_mapping`: line the discovered
//!    fields up with the category
//! 4. `convert`: create contributions, as often as needed
//!
//! `remove_for_project` and `remove_for_category` clear out the imports of a
//! project or category the platform has deleted.
//!
//! Every mutating operation fails with [`WorkflowError::ProjectLocked`] when
//! the project is locked. Conversions and deletions of one job never overlap.

pub mod locks;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, DEFAULT_MAX_FILE_SIZE, ImportConfig};
use crate::convert::{ConversionEngine, ConversionError, ConversionSummary, FeatureSelection};
use crate::import::{ImportError, ReaderOptions, import_file};
use crate::inference::infer_schema;
use crate::mapping::{MappingError, ReconciliationResult, is_compatible, reconcile, validate_mapping};
use crate::models::{
    FieldDefinition, FieldMapping, FieldType, ImportJob, ImportStatus, JobOperation,
    TransitionError,
};
use crate::platform::{BlobError, Platform, ProjectError, SchemaError};
use crate::staging::{StagingError, StagingStore};
use crate::validation::input::{
    ValidationError, sanitize_description, sanitize_file_name, validate_description,
    validate_field_key, validate_file_size, validate_import_name,
};

pub use locks::{JobLockGuard, JobLocks};

/// Error type for workflow operations
///
/// A failed operation leaves the job as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    /// Category or mapping missing for the requested operation
    #[error("Import is not configured: {0}")]
    NotConfigured(String),

    #[error("Project {0} is locked")]
    ProjectLocked(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Import not found: {0}")]
    NotFound(Uuid),

    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Staging error: {0}")]
    Staging(StagingError),

    #[error("Blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("Schema error: {0}")]
    Schema(SchemaError),

    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    #[error("Conversion error: {0}")]
    Conversion(String),
}

impl From<StagingError> for WorkflowError {
    fn from(e: StagingError) -> Self {
        match e {
            StagingError::NotFound(id) => WorkflowError::NotFound(id),
            other => WorkflowError::Staging(other),
        }
    }
}

impl From<SchemaError> for WorkflowError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::CategoryNotFound(id) => WorkflowError::CategoryNotFound(id),
            other => WorkflowError::Schema(other),
        }
    }
}

impl From<ConversionError> for WorkflowError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::NotConfigured(reason) => WorkflowError::NotConfigured(reason),
            ConversionError::Staging(e) => e.into(),
            ConversionError::Schema(e) => e.into(),
            ConversionError::State(e) => WorkflowError::Conversion(e.to_string()),
        }
    }
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// An uploaded file and its metadata
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    /// Declared MIME type, if the client sent one
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn new(
        project_id: Uuid,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            project_id,
            name: name.into(),
            description: None,
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Target category of an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryChoice {
    /// A category that already exists in the project
    Existing(Uuid),
    /// Create a new, empty category with this name
    New { name: String },
}

/// Request to add a category field from a discovered field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFieldRequest {
    /// Attribute name of the discovered field
    pub source: String,
    /// Field key; the discovered field's normalized key when absent
    #[serde(default)]
    pub key: Option<String>,
    /// Display name; the attribute name when absent
    #[serde(default)]
    pub name: Option<String>,
    /// Field type; the inferred type when absent
    #[serde(default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub required: bool,
    /// Allowed values for a lookup field
    #[serde(default)]
    pub options: Vec<String>,
}

impl NewFieldRequest {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: None,
            name: None,
            field_type: None,
            required: false,
            options: Vec::new(),
        }
    }
}

/// A stored mapping and the warnings it produced
#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingOutcome {
    pub job: ImportJob,
    /// Required category fields left unfilled
    pub warnings: Vec<String>,
}

/// Conversion progress of an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub import_id: Uuid,
    pub status: ImportStatus,
    pub total: usize,
    pub imported: usize,
    pub remaining: usize,
}

/// Drives import jobs through their lifecycle
pub struct ImportService {
    staging: Arc<dyn StagingStore>,
    platform: Platform,
    reader_options: ReaderOptions,
    max_file_size: u64,
    max_features_per_run: Option<usize>,
    locks: JobLocks,
}

impl ImportService {
    pub fn new(staging: Arc<dyn StagingStore>, platform: Platform) -> Self {
        Self {
            staging,
            platform,
            reader_options: ReaderOptions::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_features_per_run: None,
            locks: JobLocks::new(),
        }
    }

    /// Apply upload, CSV and conversion settings from `config`
    pub fn with_config(mut self, config: &ImportConfig) -> Result<Self, ConfigError> {
        self.reader_options = config.reader_options()?;
        self.max_file_size = config.upload.max_file_size;
        self.max_features_per_run = config.conversion.max_features_per_run;
        Ok(self)
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Parse, stage and record an uploaded file
    ///
    /// Nothing is persisted unless the whole file parses. If staging fails
    /// the job and the stored blob are removed again.
    pub async fn upload(&self, request: UploadRequest) -> WorkflowResult<ImportJob> {
        self.ensure_unlocked(request.project_id).await?;

        let name = request.name.trim();
        validate_import_name(name)?;
        let description = match &request.description {
            Some(desc) => {
                validate_description(desc)?;
                Some(sanitize_description(desc))
            }
            None => None,
        };
        validate_file_size(request.bytes.len() as u64, self.max_file_size)?;

        let file_name = sanitize_file_name(&request.file_name);
        let result = import_file(
            &file_name,
            request.content_type.as_deref(),
            &request.bytes,
            &self.reader_options,
        )?;
        let fields = infer_schema(&result.records);

        let file_ref = self.platform.blobs.store(&file_name, &request.bytes).await?;
        let job = ImportJob::new(
            request.project_id,
            name,
            file_ref.clone(),
            file_name,
            result.format,
            fields,
        )
        .with_description(description);

        if let Err(e) = self.staging.insert_job(&job).await {
            self.release_blob(&file_ref).await;
            return Err(e.into());
        }
        let staged = match self.staging.stage(job.id, result.records).await {
            Ok(staged) => staged,
            Err(e) => {
                if let Err(cleanup) = self.staging.delete_job(job.id).await {
                    warn!(import_id = %job.id, error = %cleanup, "Failed to remove job after staging error");
                }
                self.release_blob(&file_ref).await;
                return Err(e.into());
            }
        };

        info!(
            import_id = %job.id,
            project_id = %job.project_id,
            format = %job.format,
            features = staged,
            fields = job.fields.len(),
            "Import uploaded"
        );
        Ok(job)
    }

    pub async fn get(&self, import_id: Uuid) -> WorkflowResult<ImportJob> {
        Ok(self.staging.get_job(import_id).await?)
    }

    /// Imports of a project, oldest first
    pub async fn list(&self, project_id: Uuid) -> WorkflowResult<Vec<ImportJob>> {
        Ok(self.staging.list_jobs(project_id).await?)
    }

    pub async fn progress(&self, import_id: Uuid) -> WorkflowResult<ImportProgress> {
        let job = self.staging.get_job(import_id).await?;
        let counts = self.staging.feature_counts(import_id).await?;
        Ok(ImportProgress {
            import_id,
            status: job.status,
            total: counts.total,
            imported: counts.imported,
            remaining: counts.remaining(),
        })
    }

    /// Attach the target category (`Uploaded` -> `FieldsPending`)
    pub async fn attach_category(
        &self,
        import_id: Uuid,
        choice: CategoryChoice,
    ) -> WorkflowResult<ImportJob> {
        let _guard = self.locks.acquire(import_id).await;
        let mut job = self.load_for(import_id, JobOperation::AttachCategory).await?;

        let category_id = match choice {
            CategoryChoice::Existing(category_id) => {
                if !self
                    .platform
                    .schema
                    .category_in_project(job.project_id, category_id)
                    .await?
                {
                    return Err(WorkflowError::CategoryNotFound(category_id));
                }
                category_id
            }
            CategoryChoice::New { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ValidationError::Empty("Category name").into());
                }
                self.platform
                    .schema
                    .create_category(job.project_id, name)
                    .await?
            }
        };

        job.attach_category(category_id)?;
        self.staging.update_job(&job).await?;
        info!(import_id = %job.id, %category_id, "Category attached");
        Ok(job)
    }

    /// Create a category field from a discovered field
    pub async fn create_field(
        &self,
        import_id: Uuid,
        request: NewFieldRequest,
    ) -> WorkflowResult<FieldDefinition> {
        let _guard = self.locks.acquire(import_id).await;
        let job = self.load_for(import_id, JobOperation::CreateField).await?;
        let category_id = job
            .category_id
            .ok_or_else(|| WorkflowError::NotConfigured("no category attached".to_string()))?;

        let source = job
            .field(&request.source)
            .ok_or_else(|| MappingError::UnknownSource(request.source.clone()))?;
        let key = request.key.unwrap_or_else(|| source.key.clone());
        validate_field_key(&key)?;

        let field_type = request.field_type.unwrap_or(source.field_type);
        if field_type == FieldType::Lookup && request.options.is_empty() {
            return Err(ValidationError::Empty("Lookup options").into());
        }
        let mut field = FieldDefinition::new(key, field_type)
            .with_name(request.name.unwrap_or_else(|| source.name.clone()))
            .with_options(request.options);
        if request.required {
            field = field.required();
        }
        if !is_compatible(source, &field) {
            return Err(MappingError::TypeMismatch {
                source_key: source.name.clone(),
                target_key: field.key,
                source_type: source.field_type,
                target_type: field_type,
            }
            .into());
        }

        let created = self.platform.schema.create_field(category_id, field).await?;
        info!(import_id = %job.id, %category_id, key = %created.key, "Category field created");
        Ok(created)
    }

    /// Compare the discovered fields with the attached category
    pub async fn reconcile(&self, import_id: Uuid) -> WorkflowResult<ReconciliationResult> {
        let job = self.staging.get_job(import_id).await?;
        let category_id = job
            .category_id
            .ok_or_else(|| WorkflowError::NotConfigured("no category attached".to_string()))?;
        let fields = self.platform.schema.get_fields(category_id).await?;
        Ok(reconcile(&job.fields, &fields))
    }

    /// Validate and store a field mapping (`FieldsPending`/`Ready` -> `Ready`)
    pub async fn submit_mapping(
        &self,
        import_id: Uuid,
        mapping: FieldMapping,
    ) -> WorkflowResult<MappingOutcome> {
        let _guard = self.locks.acquire(import_id).await;
        let mut job = self.load_for(import_id, JobOperation::SubmitMapping).await?;
        let category_id = job
            .category_id
            .ok_or_else(|| WorkflowError::NotConfigured("no category attached".to_string()))?;

        let fields = self.platform.schema.get_fields(category_id).await?;
        let warnings = validate_mapping(&job.fields, &fields, &mapping)?;
        for warning in &warnings {
            warn!(import_id = %job.id, "{}", warning);
        }

        job.apply_mapping(mapping)?;
        self.staging.update_job(&job).await?;
        info!(import_id = %job.id, "Field mapping submitted");
        Ok(MappingOutcome { job, warnings })
    }

    /// Convert the selected features into contributions
    ///
    /// Runs while holding the job's lock, so concurrent calls for the same
    /// job convert each feature once.
    pub async fn convert(
        &self,
        import_id: Uuid,
        selection: FeatureSelection,
    ) -> WorkflowResult<ConversionSummary> {
        let _guard = self.locks.acquire(import_id).await;
        let job = self.staging.get_job(import_id).await?;
        self.ensure_unlocked(job.project_id).await?;

        if job.ensure_permits(JobOperation::Convert).is_err() {
            let missing = if job.category_id.is_none() {
                "no category attached"
            } else {
                "no field mapping submitted"
            };
            return Err(WorkflowError::NotConfigured(missing.to_string()));
        }

        let engine = ConversionEngine::new(
            self.staging.clone(),
            self.platform.schema.clone(),
            self.platform.contributions.clone(),
        )
        .with_max_features_per_run(self.max_features_per_run);
        Ok(engine.convert(&job, &selection).await?)
    }

    /// Delete an import, its staged features and its blob
    ///
    /// Returns the number of staged features removed.
    pub async fn delete(&self, import_id: Uuid) -> WorkflowResult<usize> {
        let _guard = self.locks.acquire(import_id).await;
        let job = self.load_for(import_id, JobOperation::Delete).await?;

        let removed = self.staging.delete_job(import_id).await?;
        self.release_blob(&job.file_ref).await;

        info!(import_id = %import_id, features = removed, "Import deleted");
        Ok(removed)
    }

    /// Remove every import of a deleted project
    ///
    /// Returns the number of imports removed.
    pub async fn remove_for_project(&self, project_id: Uuid) -> WorkflowResult<usize> {
        let jobs = self.staging.list_jobs(project_id).await?;
        let removed = self.cascade(jobs).await?;
        info!(%project_id, imports = removed, "Removed imports of deleted project");
        Ok(removed)
    }

    /// Remove every import attached to a deleted category
    ///
    /// Returns the number of imports removed.
    pub async fn remove_for_category(&self, category_id: Uuid) -> WorkflowResult<usize> {
        let jobs = self.staging.list_jobs_for_category(category_id).await?;
        let removed = self.cascade(jobs).await?;
        info!(%category_id, imports = removed, "Removed imports of deleted category");
        Ok(removed)
    }

    /// Delete `jobs` regardless of status or project lock, one job lock at a time
    async fn cascade(&self, jobs: Vec<ImportJob>) -> WorkflowResult<usize> {
        let mut removed = 0;
        for job in jobs {
            let _guard = self.locks.acquire(job.id).await;
            match self.staging.delete_job(job.id).await {
                Ok(features) => {
                    debug!(import_id = %job.id, features, "Cascade deleted import");
                    self.release_blob(&job.file_ref).await;
                    removed += 1;
                }
                // Deleted concurrently while waiting for the lock
                Err(StagingError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Load a job and check that `operation` may run on it now
    async fn load_for(&self, import_id: Uuid, operation: JobOperation) -> WorkflowResult<ImportJob> {
        let job = self.staging.get_job(import_id).await?;
        self.ensure_unlocked(job.project_id).await?;
        job.ensure_permits(operation)?;
        Ok(job)
    }

    async fn ensure_unlocked(&self, project_id: Uuid) -> WorkflowResult<()> {
        if self.platform.projects.is_locked(project_id).await? {
            return Err(WorkflowError::ProjectLocked(project_id));
        }
        Ok(())
    }

    async fn release_blob(&self, file_ref: &str) {
        if let Err(e) = self.platform.blobs.delete(file_ref).await {
            warn!(file_ref, error = %e, "Failed to release uploaded file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InMemoryProjectDirectory, InMemorySchemaProvider, SchemaProvider};
    use crate::staging::InMemoryStagingStore;

    const TREES: &[u8] = b"name,height,lat,lon\nOak,12.5,51.5,-0.12\nAsh,8,51.6,-0.13\n";

    struct Fixture {
        service: ImportService,
        schema: Arc<InMemorySchemaProvider>,
        projects: Arc<InMemoryProjectDirectory>,
        project_id: Uuid,
    }

    fn fixture() -> Fixture {
        let schema = Arc::new(InMemorySchemaProvider::new());
        let projects = Arc::new(InMemoryProjectDirectory::new());
        let platform = Platform {
            schema: schema.clone(),
            projects: projects.clone(),
            ..Platform::in_memory()
        };
        Fixture {
            service: ImportService::new(Arc::new(InMemoryStagingStore::new()), platform),
            schema,
            projects,
            project_id: Uuid::new_v4(),
        }
    }

    async fn upload(f: &Fixture) -> ImportJob {
        f.service
            .upload(UploadRequest::new(f.project_id, "Trees", "trees.csv", TREES.to_vec()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_infers_fields() {
        let f = fixture();
        let job = upload(&f).await;
        assert_eq!(job.status, ImportStatus::Uploaded);
        assert_eq!(job.format, crate::models::DataFormat::Csv);
        let types: Vec<(&str, FieldType)> = job
            .fields
            .iter()
            .map(|field| (field.name.as_str(), field.field_type))
            .collect();
        assert_eq!(
            types,
            vec![("name", FieldType::Text), ("height", FieldType::Decimal)]
        );

        let progress = f.service.progress(job.id).await.unwrap();
        assert_eq!((progress.total, progress.imported), (2, 0));
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_input() {
        let f = fixture();
        let err = f
            .service
            .upload(UploadRequest::new(f.project_id, " ", "trees.csv", TREES.to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let err = f
            .service
            .upload(UploadRequest::new(f.project_id, "Trees", "trees.csv", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(f.service.list(f.project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_new_category_and_create_field() {
        let f = fixture();
        let job = upload(&f).await;

        let job = f
            .service
            .attach_category(job.id, CategoryChoice::New { name: "Trees".into() })
            .await
            .unwrap();
        assert_eq!(job.status, ImportStatus::FieldsPending);
        let category_id = job.category_id.unwrap();
        assert_eq!(f.schema.category_name(category_id), Some("Trees".to_string()));

        let field = f
            .service
            .create_field(job.id, NewFieldRequest::from_source("height"))
            .await
            .unwrap();
        assert_eq!(field.key, "height");
        assert_eq!(field.field_type, FieldType::Decimal);

        let mismatch = NewFieldRequest {
            field_type: Some(FieldType::Integer),
            key: Some("height_int".into()),
            ..NewFieldRequest::from_source("height")
        };
        assert!(matches!(
            f.service.create_field(job.id, mismatch).await,
            Err(WorkflowError::Mapping(MappingError::TypeMismatch { .. }))
        ));

        let reconciliation = f.service.reconcile(job.id).await.unwrap();
        assert_eq!(reconciliation.matched.len(), 1);
        assert_eq!(reconciliation.unmapped_source.len(), 1);
    }

    #[tokio::test]
    async fn test_category_from_other_project_is_rejected() {
        let f = fixture();
        let job = upload(&f).await;
        let foreign = f.schema.add_category(Uuid::new_v4(), "Other", Vec::new());
        assert_eq!(
            f.service
                .attach_category(job.id, CategoryChoice::Existing(foreign))
                .await,
            Err(WorkflowError::CategoryNotFound(foreign))
        );
        assert_eq!(
            f.service.get(job.id).await.unwrap().status,
            ImportStatus::Uploaded
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let f = fixture();
        let job = upload(&f).await;
        assert!(matches!(
            f.service.submit_mapping(job.id, FieldMapping::new()).await,
            Err(WorkflowError::InvalidTransition(_))
        ));
        assert!(matches!(
            f.service
                .create_field(job.id, NewFieldRequest::from_source("name"))
                .await,
            Err(WorkflowError::InvalidTransition(_))
        ));

        let category = f.schema.add_category(f.project_id, "Trees", Vec::new());
        f.service
            .attach_category(job.id, CategoryChoice::Existing(category))
            .await
            .unwrap();
        assert!(matches!(
            f.service
                .attach_category(job.id, CategoryChoice::Existing(category))
                .await,
            Err(WorkflowError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_locked_project_blocks_mutations() {
        let f = fixture();
        let job = upload(&f).await;
        f.projects.lock(f.project_id);

        assert_eq!(
            f.service
                .upload(UploadRequest::new(f.project_id, "More", "trees.csv", TREES.to_vec()))
                .await,
            Err(WorkflowError::ProjectLocked(f.project_id))
        );
        assert_eq!(
            f.service
                .attach_category(job.id, CategoryChoice::New { name: "Trees".into() })
                .await,
            Err(WorkflowError::ProjectLocked(f.project_id))
        );
        assert_eq!(
            f.service.delete(job.id).await,
            Err(WorkflowError::ProjectLocked(f.project_id))
        );
        assert_eq!(f.service.get(job.id).await.unwrap(), job);

        f.projects.unlock(f.project_id);
        assert_eq!(f.service.delete(job.id).await.unwrap(), 2);
        assert_eq!(
            f.service.get(job.id).await,
            Err(WorkflowError::NotFound(job.id))
        );
    }

    #[tokio::test]
    async fn test_locked_project_blocks_field_setup() {
        let f = fixture();
        let job = upload(&f).await;
        let category = f.schema.add_category(
            f.project_id,
            "Trees",
            vec![FieldDefinition::new("name", FieldType::Text)],
        );
        let job = f
            .service
            .attach_category(job.id, CategoryChoice::Existing(category))
            .await
            .unwrap();
        f.projects.lock(f.project_id);

        assert_eq!(
            f.service
                .submit_mapping(job.id, FieldMapping::new().map("name", "name"))
                .await,
            Err(WorkflowError::ProjectLocked(f.project_id))
        );
        assert_eq!(
            f.service
                .create_field(job.id, NewFieldRequest::from_source("height"))
                .await,
            Err(WorkflowError::ProjectLocked(f.project_id))
        );

        let unchanged = f.service.get(job.id).await.unwrap();
        assert_eq!(unchanged, job);
        assert_eq!(unchanged.status, ImportStatus::FieldsPending);
        assert!(unchanged.keys.is_none());
        assert_eq!(f.schema.get_fields(category).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_imports_leave_no_locks() {
        let f = fixture();
        let missing = Uuid::new_v4();
        assert_eq!(
            f.service.delete(missing).await,
            Err(WorkflowError::NotFound(missing))
        );
        assert_eq!(
            f.service.convert(missing, FeatureSelection::All).await,
            Err(WorkflowError::NotFound(missing))
        );
        assert_eq!(
            f.service
                .submit_mapping(missing, FieldMapping::new())
                .await,
            Err(WorkflowError::NotFound(missing))
        );
        assert!(f.service.locks.is_empty());

        let job = upload(&f).await;
        f.service.delete(job.id).await.unwrap();
        assert!(f.service.locks.is_empty());
    }

    #[tokio::test]
    async fn test_remove_for_project() {
        let f = fixture();
        let first = upload(&f).await;
        let second = upload(&f).await;
        let other = f
            .service
            .upload(UploadRequest::new(Uuid::new_v4(), "Other", "trees.csv", TREES.to_vec()))
            .await
            .unwrap();
        // Removal follows the platform deleting the project, locked or not
        f.projects.lock(f.project_id);

        assert_eq!(f.service.remove_for_project(f.project_id).await.unwrap(), 2);
        for id in [first.id, second.id] {
            assert_eq!(f.service.get(id).await, Err(WorkflowError::NotFound(id)));
        }
        assert!(f.service.get(other.id).await.is_ok());
        assert_eq!(f.service.remove_for_project(f.project_id).await.unwrap(), 0);
        assert!(f.service.locks.is_empty());
    }
}

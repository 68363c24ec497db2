//! Staging store for import jobs and their parsed features
//!
//! Features wait here between upload and conversion. The store is the only
//! place where a feature's `imported` flag changes, through
//! [`StagingStore::mark_converted`].
//!
//! Backends:
//! - [`InMemoryStagingStore`]: always available
//! - `DuckDBStagingStore`: embedded database (`duckdb-backend` feature)

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ContributionRef, FeatureCounts, ImportJob, RawRecord, StagedFeature};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;
pub mod memory;
pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBStagingStore;
pub use memory::InMemoryStagingStore;
pub use schema::StagingSchema;

/// Default number of features fetched per cursor page
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Error type for staging operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StagingError {
    #[error("Import not found: {0}")]
    NotFound(Uuid),

    #[error("Staged feature not found: {0}")]
    FeatureNotFound(Uuid),

    /// The feature was already converted
    #[error("Feature {0} has already been imported")]
    AlreadyImported(Uuid),

    #[error("Import already exists: {0}")]
    DuplicateJob(Uuid),

    /// A record failed structural validation; nothing was staged
    #[error("Record {sequence} is invalid: {reason}")]
    InvalidFeature { sequence: u64, reason: String },

    #[error("Staging backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for staging operations
pub type StagingResult<T> = Result<T, StagingError>;

/// Persistence for import jobs and staged features
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Persist a new job
    async fn insert_job(&self, job: &ImportJob) -> StagingResult<()>;

    async fn get_job(&self, id: Uuid) -> StagingResult<ImportJob>;

    /// Replace a stored job with `job`
    async fn update_job(&self, job: &ImportJob) -> StagingResult<()>;

    /// Jobs of a project, oldest first
    async fn list_jobs(&self, project_id: Uuid) -> StagingResult<Vec<ImportJob>>;

    /// Jobs with `category_id` attached, oldest first
    async fn list_jobs_for_category(&self, category_id: Uuid) -> StagingResult<Vec<ImportJob>>;

    /// Delete a job and all of its features. Returns the number of features removed.
    async fn delete_job(&self, id: Uuid) -> StagingResult<usize>;

    /// Stage one feature per record, all or nothing
    ///
    /// Sequences continue after any features the job already has.
    async fn stage(&self, job_id: Uuid, records: Vec<RawRecord>) -> StagingResult<usize>;

    /// Up to `limit` unconverted features with a sequence greater than `after`,
    /// in creation order
    async fn unconverted_page(
        &self,
        job_id: Uuid,
        after: Option<u64>,
        limit: usize,
    ) -> StagingResult<Vec<StagedFeature>>;

    /// Features of a job by id, in creation order. Unknown ids are omitted.
    async fn get_features(&self, job_id: Uuid, ids: &[Uuid]) -> StagingResult<Vec<StagedFeature>>;

    /// Flip a feature to imported and record its contribution
    ///
    /// Fails with [`StagingError::AlreadyImported`] when another caller got
    /// there first.
    async fn mark_converted(
        &self,
        feature_id: Uuid,
        contribution: &ContributionRef,
    ) -> StagingResult<StagedFeature>;

    async fn feature_counts(&self, job_id: Uuid) -> StagingResult<FeatureCounts>;
}

/// Check the structural validity of records before staging them
pub(crate) fn validate_records(first_sequence: u64, records: &[RawRecord]) -> StagingResult<()> {
    for (offset, record) in records.iter().enumerate() {
        record
            .geometry
            .validate()
            .map_err(|e| StagingError::InvalidFeature {
                sequence: first_sequence + offset as u64,
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// Lazy, restartable iteration over the unconverted features of a job
///
/// Pages are fetched on demand by sequence, so features converted while
/// iterating do not shift later pages.
///
/// # Example
///
/// ```rust,no_run
/// # async fn run(store: &dyn geo_import_sdk::staging::StagingStore, job_id: uuid::Uuid)
/// # -> Result<(), geo_import_sdk::staging::StagingError> {
/// use geo_import_sdk::staging::FeatureCursor;
///
/// let mut cursor = FeatureCursor::new(store, job_id, 100);
/// loop {
///     let page = cursor.next_page().await?;
///     if page.is_empty() {
///         break;
///     }
///     println!("{} features", page.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct FeatureCursor<'a> {
    store: &'a dyn StagingStore,
    job_id: Uuid,
    page_size: usize,
    after: Option<u64>,
    exhausted: bool,
}

impl<'a> FeatureCursor<'a> {
    pub fn new(store: &'a dyn StagingStore, job_id: Uuid, page_size: usize) -> Self {
        Self {
            store,
            job_id,
            page_size: page_size.max(1),
            after: None,
            exhausted: false,
        }
    }

    /// Next page of unconverted features; empty once the cursor is exhausted
    pub async fn next_page(&mut self) -> StagingResult<Vec<StagedFeature>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        let page = self
            .store
            .unconverted_page(self.job_id, self.after, self.page_size)
            .await?;
        match page.last() {
            Some(last) => self.after = Some(last.sequence),
            None => self.exhausted = true,
        }
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        Ok(page)
    }

    /// Start again from the first unconverted feature
    pub fn rewind(&mut self) {
        self.after = None;
        self.exhausted = false;
    }
}

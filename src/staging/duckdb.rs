//! DuckDB staging backend
//!
//! Embedded, file-backed or in-memory persistence for import jobs and staged
//! features. Batch staging runs in a single transaction and
//! `mark_converted` is a conditional update, so both stay atomic when
//! several processes share the database file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::schema::{SCHEMA_VERSION, StagingSchema};
use super::{StagingError, StagingResult, StagingStore, validate_records};
use crate::models::{
    Attributes, ContributionRef, DataFormat, FeatureCounts, FieldMapping, Geometry, ImportJob,
    ImportStatus, InferredField, RawRecord, StagedFeature,
};

const JOB_COLUMNS: &str = "id, project_id, file_ref, file_name, format, name, description, \
     category_id, fields, keys, status, created_at, updated_at";

const FEATURE_COLUMNS: &str = "id, import_id, sequence, geometry, attributes, imported, contribution_ref";

/// Raw `import_jobs` row
struct JobRow {
    id: String,
    project_id: String,
    file_ref: String,
    file_name: String,
    format: String,
    name: String,
    description: Option<String>,
    category_id: Option<String>,
    fields: String,
    keys: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

/// Raw `staged_features` row
struct FeatureRow {
    id: String,
    import_id: String,
    sequence: i64,
    geometry: String,
    attributes: String,
    imported: bool,
    contribution_ref: Option<String>,
}

/// DuckDB staging store
pub struct DuckDBStagingStore {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBStagingStore {
    /// Open (or create) a file-based staging database and initialize its schema
    pub fn new(db_path: impl AsRef<Path>) -> StagingResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path)
            .map_err(|e| StagingError::Backend(format!("Failed to open DuckDB: {}", e)))?;

        let store = Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory staging database
    pub fn in_memory() -> StagingResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            StagingError::Backend(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        let store = Self {
            db_path: None,
            connection: Mutex::new(connection),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> StagingResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| StagingError::Backend(format!("Lock error: {}", e)))
    }

    fn initialize(&self) -> StagingResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(StagingSchema::create_tables_sql())
            .map_err(|e| StagingError::Backend(format!("Failed to create tables: {}", e)))?;
        conn.execute_batch(StagingSchema::create_indexes_sql())
            .map_err(|e| StagingError::Backend(format!("Failed to create indexes: {}", e)))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?) ON CONFLICT (version) DO NOTHING",
            [SCHEMA_VERSION],
        )
        .map_err(|e| {
            StagingError::Backend(format!("Failed to record schema version: {}", e))
        })?;
        Ok(())
    }

    fn job_exists(conn: &duckdb::Connection, id: Uuid) -> StagingResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM import_jobs WHERE id = ?",
                [id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| StagingError::Backend(format!("Query failed: {}", e)))?;
        Ok(count > 0)
    }

    fn query_jobs(
        conn: &duckdb::Connection,
        filter: &str,
        param: String,
    ) -> StagingResult<Vec<ImportJob>> {
        let sql = format!(
            "SELECT {} FROM import_jobs WHERE {} ORDER BY created_at",
            JOB_COLUMNS, filter
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StagingError::Backend(format!("Prepare failed: {}", e)))?;
        let rows = stmt
            .query_map([param], |row| {
                Ok(JobRow {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    file_ref: row.get(2)?,
                    file_name: row.get(3)?,
                    format: row.get(4)?,
                    name: row.get(5)?,
                    description: row.get(6)?,
                    category_id: row.get(7)?,
                    fields: row.get(8)?,
                    keys: row.get(9)?,
                    status: row.get(10)?,
                    created_at: row.get(11)?,
                    updated_at: row.get(12)?,
                })
            })
            .map_err(|e| StagingError::Backend(format!("Query failed: {}", e)))?;

        let mut jobs = Vec::new();
        for row in rows {
            let row = row.map_err(|e| StagingError::Backend(format!("Row fetch error: {}", e)))?;
            jobs.push(job_from_row(row)?);
        }
        Ok(jobs)
    }

    fn query_features(
        conn: &duckdb::Connection,
        filter: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> StagingResult<Vec<StagedFeature>> {
        let sql = format!(
            "SELECT {} FROM staged_features WHERE {}",
            FEATURE_COLUMNS, filter
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StagingError::Backend(format!("Prepare failed: {}", e)))?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(FeatureRow {
                    id: row.get(0)?,
                    import_id: row.get(1)?,
                    sequence: row.get(2)?,
                    geometry: row.get(3)?,
                    attributes: row.get(4)?,
                    imported: row.get(5)?,
                    contribution_ref: row.get(6)?,
                })
            })
            .map_err(|e| StagingError::Backend(format!("Query failed: {}", e)))?;

        let mut features = Vec::new();
        for row in rows {
            let row = row.map_err(|e| StagingError::Backend(format!("Row fetch error: {}", e)))?;
            features.push(feature_from_row(row)?);
        }
        Ok(features)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StagingResult<String> {
    serde_json::to_string(value).map_err(|e| StagingError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> StagingResult<T> {
    serde_json::from_str(text).map_err(|e| StagingError::Serialization(e.to_string()))
}

fn parse_uuid(text: &str) -> StagingResult<Uuid> {
    Uuid::parse_str(text).map_err(|e| StagingError::Serialization(format!("{}: {}", text, e)))
}

fn parse_timestamp(text: &str) -> StagingResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StagingError::Serialization(format!("{}: {}", text, e)))
}

fn job_from_row(row: JobRow) -> StagingResult<ImportJob> {
    Ok(ImportJob {
        id: parse_uuid(&row.id)?,
        project_id: parse_uuid(&row.project_id)?,
        file_ref: row.file_ref,
        file_name: row.file_name,
        format: row
            .format
            .parse::<DataFormat>()
            .map_err(StagingError::Serialization)?,
        name: row.name,
        description: row.description,
        category_id: row.category_id.as_deref().map(parse_uuid).transpose()?,
        fields: from_json::<Vec<InferredField>>(&row.fields)?,
        keys: row
            .keys
            .as_deref()
            .map(from_json::<FieldMapping>)
            .transpose()?,
        status: row
            .status
            .parse::<ImportStatus>()
            .map_err(StagingError::Serialization)?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

fn feature_from_row(row: FeatureRow) -> StagingResult<StagedFeature> {
    Ok(StagedFeature {
        id: parse_uuid(&row.id)?,
        import_id: parse_uuid(&row.import_id)?,
        sequence: row.sequence as u64,
        geometry: from_json::<Geometry>(&row.geometry)?,
        attributes: from_json::<Attributes>(&row.attributes)?,
        imported: row.imported,
        contribution: row.contribution_ref.map(ContributionRef::new),
    })
}

#[async_trait]
impl StagingStore for DuckDBStagingStore {
    async fn insert_job(&self, job: &ImportJob) -> StagingResult<()> {
        let conn = self.lock()?;
        if Self::job_exists(&conn, job.id)? {
            return Err(StagingError::DuplicateJob(job.id));
        }
        conn.execute(
            &format!(
                "INSERT INTO import_jobs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                JOB_COLUMNS
            ),
            duckdb::params![
                job.id.to_string(),
                job.project_id.to_string(),
                &job.file_ref,
                &job.file_name,
                job.format.to_string(),
                &job.name,
                &job.description,
                job.category_id.map(|c| c.to_string()),
                to_json(&job.fields)?,
                job.keys.as_ref().map(to_json).transpose()?,
                job.status.to_string(),
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StagingError::Backend(format!("Failed to insert import {}: {}", job.id, e)))?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StagingResult<ImportJob> {
        let conn = self.lock()?;
        Self::query_jobs(&conn, "id = ?", id.to_string())?
            .into_iter()
            .next()
            .ok_or(StagingError::NotFound(id))
    }

    async fn update_job(&self, job: &ImportJob) -> StagingResult<()> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                r#"
                UPDATE import_jobs SET
                    name = ?, description = ?, category_id = ?, fields = ?, keys = ?,
                    status = ?, updated_at = ?
                WHERE id = ?
                "#,
                duckdb::params![
                    &job.name,
                    &job.description,
                    job.category_id.map(|c| c.to_string()),
                    to_json(&job.fields)?,
                    job.keys.as_ref().map(to_json).transpose()?,
                    job.status.to_string(),
                    job.updated_at.to_rfc3339(),
                    job.id.to_string(),
                ],
            )
            .map_err(|e| {
                StagingError::Backend(format!("Failed to update import {}: {}", job.id, e))
            })?;
        if updated == 0 {
            return Err(StagingError::NotFound(job.id));
        }
        Ok(())
    }

    async fn list_jobs(&self, project_id: Uuid) -> StagingResult<Vec<ImportJob>> {
        let conn = self.lock()?;
        Self::query_jobs(&conn, "project_id = ?", project_id.to_string())
    }

    async fn list_jobs_for_category(&self, category_id: Uuid) -> StagingResult<Vec<ImportJob>> {
        let conn = self.lock()?;
        Self::query_jobs(&conn, "category_id = ?", category_id.to_string())
    }

    async fn delete_job(&self, id: Uuid) -> StagingResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StagingError::Backend(format!("Transaction failed: {}", e)))?;

        let features = tx
            .execute(
                "DELETE FROM staged_features WHERE import_id = ?",
                [id.to_string()],
            )
            .map_err(|e| StagingError::Backend(format!("Failed to delete features: {}", e)))?;
        let jobs = tx
            .execute("DELETE FROM import_jobs WHERE id = ?", [id.to_string()])
            .map_err(|e| StagingError::Backend(format!("Failed to delete import: {}", e)))?;
        if jobs == 0 {
            // Dropping the transaction rolls it back
            return Err(StagingError::NotFound(id));
        }

        tx.commit()
            .map_err(|e| StagingError::Backend(format!("Commit failed: {}", e)))?;
        debug!(import_id = %id, features, "Deleted staged import");
        Ok(features)
    }

    async fn stage(&self, job_id: Uuid, records: Vec<RawRecord>) -> StagingResult<usize> {
        let mut conn = self.lock()?;
        if !Self::job_exists(&conn, job_id)? {
            return Err(StagingError::NotFound(job_id));
        }

        let next_sequence: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sequence) + 1, 0) FROM staged_features WHERE import_id = ?",
                [job_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| StagingError::Backend(format!("Query failed: {}", e)))?;
        let next_sequence = next_sequence as u64;

        validate_records(next_sequence, &records)?;

        let tx = conn
            .transaction()
            .map_err(|e| StagingError::Backend(format!("Transaction failed: {}", e)))?;
        let count = records.len();
        for (offset, record) in records.into_iter().enumerate() {
            let feature =
                StagedFeature::from_record(job_id, next_sequence + offset as u64, record);
            tx.execute(
                &format!(
                    "INSERT INTO staged_features ({}) VALUES (?, ?, ?, ?, ?, FALSE, NULL)",
                    FEATURE_COLUMNS
                ),
                duckdb::params![
                    feature.id.to_string(),
                    job_id.to_string(),
                    feature.sequence as i64,
                    to_json(&feature.geometry)?,
                    to_json(&feature.attributes)?,
                ],
            )
            .map_err(|e| StagingError::Backend(format!("Failed to stage feature: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| StagingError::Backend(format!("Commit failed: {}", e)))?;
        Ok(count)
    }

    async fn unconverted_page(
        &self,
        job_id: Uuid,
        after: Option<u64>,
        limit: usize,
    ) -> StagingResult<Vec<StagedFeature>> {
        let conn = self.lock()?;
        if !Self::job_exists(&conn, job_id)? {
            return Err(StagingError::NotFound(job_id));
        }
        let after = after.map(|a| a as i64).unwrap_or(-1);
        Self::query_features(
            &conn,
            "import_id = ? AND imported = FALSE AND sequence > ? ORDER BY sequence LIMIT ?",
            duckdb::params![job_id.to_string(), after, limit as i64],
        )
    }

    async fn get_features(&self, job_id: Uuid, ids: &[Uuid]) -> StagingResult<Vec<StagedFeature>> {
        let conn = self.lock()?;
        if !Self::job_exists(&conn, job_id)? {
            return Err(StagingError::NotFound(job_id));
        }
        let mut features = Vec::new();
        for id in ids {
            features.extend(Self::query_features(
                &conn,
                "import_id = ? AND id = ?",
                duckdb::params![job_id.to_string(), id.to_string()],
            )?);
        }
        features.sort_by_key(|f| f.sequence);
        features.dedup_by_key(|f| f.id);
        Ok(features)
    }

    async fn mark_converted(
        &self,
        feature_id: Uuid,
        contribution: &ContributionRef,
    ) -> StagingResult<StagedFeature> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE staged_features SET imported = TRUE, contribution_ref = ? \
                 WHERE id = ? AND imported = FALSE",
                duckdb::params![contribution.as_str(), feature_id.to_string()],
            )
            .map_err(|e| StagingError::Backend(format!("Failed to mark feature: {}", e)))?;

        let feature = Self::query_features(&conn, "id = ?", duckdb::params![feature_id.to_string()])?
            .into_iter()
            .next()
            .ok_or(StagingError::FeatureNotFound(feature_id))?;
        if updated == 0 {
            return Err(StagingError::AlreadyImported(feature_id));
        }
        Ok(feature)
    }

    async fn feature_counts(&self, job_id: Uuid) -> StagingResult<FeatureCounts> {
        let conn = self.lock()?;
        if !Self::job_exists(&conn, job_id)? {
            return Err(StagingError::NotFound(job_id));
        }
        let (total, imported): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(*) FILTER (WHERE imported) FROM staged_features WHERE import_id = ?",
                [job_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| StagingError::Backend(format!("Query failed: {}", e)))?;
        Ok(FeatureCounts {
            total: total as usize,
            imported: imported as usize,
        })
    }
}

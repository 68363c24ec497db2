//! Staging schema definitions
//!
//! Identifiers and timestamps are stored as text; geometry, attributes,
//! discovered fields and mappings as JSON text.

/// Schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Staging schema helper
pub struct StagingSchema;

impl StagingSchema {
    /// Table creation SQL
    pub fn create_tables_sql() -> &'static str {
        r#"
-- Import jobs
CREATE TABLE IF NOT EXISTS import_jobs (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    file_ref TEXT NOT NULL,
    file_name TEXT NOT NULL,
    format TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    category_id TEXT,
    fields TEXT NOT NULL,
    keys TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Parsed features awaiting conversion
CREATE TABLE IF NOT EXISTS staged_features (
    id TEXT PRIMARY KEY,
    import_id TEXT NOT NULL,
    sequence BIGINT NOT NULL,
    geometry TEXT NOT NULL,
    attributes TEXT NOT NULL,
    imported BOOLEAN NOT NULL DEFAULT FALSE,
    contribution_ref TEXT,
    UNIQUE(import_id, sequence)
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#
    }

    /// Index creation SQL
    pub fn create_indexes_sql() -> &'static str {
        r#"
CREATE INDEX IF NOT EXISTS idx_import_jobs_project ON import_jobs(project_id);
CREATE INDEX IF NOT EXISTS idx_staged_features_import ON staged_features(import_id, imported);
"#
    }
}

//! Import job model
//!
//! An import job is one upload-to-conversion workflow instance scoped to a
//! project. Status transitions are enforced here so that every persistence
//! backend shares the same rules:
//!
//! ```text
//! Uploaded --attach_category--> FieldsPending --apply_mapping--> Ready
//!                                                  ^                |
//!                                                  +--apply_mapping-+
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DataFormat, ImportStatus, JobOperation};
use super::field::InferredField;
use super::mapping::FieldMapping;

/// An operation was attempted in a status that does not permit it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("Cannot {operation} while import is {status}")]
pub struct TransitionError {
    pub status: ImportStatus,
    pub operation: JobOperation,
}

/// A single data import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Blob store reference of the uploaded file
    pub file_ref: String,
    /// Original file name
    pub file_name: String,
    pub format: DataFormat,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    /// Fields discovered in the uploaded file
    #[serde(default)]
    pub fields: Vec<InferredField>,
    /// Submitted field mapping; `None` until the category is set and fields mapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<FieldMapping>,
    pub status: ImportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportJob {
    /// Create a job for a freshly parsed upload
    pub fn new(
        project_id: Uuid,
        name: impl Into<String>,
        file_ref: impl Into<String>,
        file_name: impl Into<String>,
        format: DataFormat,
        fields: Vec<InferredField>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            file_ref: file_ref.into(),
            file_name: file_name.into(),
            format,
            name: name.into(),
            description: None,
            category_id: None,
            fields,
            keys: None,
            status: ImportStatus::Uploaded,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    /// Fail unless the current status permits `operation`
    pub fn ensure_permits(&self, operation: JobOperation) -> Result<(), TransitionError> {
        if self.status.permits(operation) {
            Ok(())
        } else {
            Err(TransitionError {
                status: self.status,
                operation,
            })
        }
    }

    /// Attach the target category (`Uploaded` -> `FieldsPending`)
    pub fn attach_category(&mut self, category_id: Uuid) -> Result<(), TransitionError> {
        self.ensure_permits(JobOperation::AttachCategory)?;
        self.category_id = Some(category_id);
        self.status = ImportStatus::FieldsPending;
        self.touch();
        Ok(())
    }

    /// Store a field mapping (`FieldsPending`/`Ready` -> `Ready`)
    pub fn apply_mapping(&mut self, mapping: FieldMapping) -> Result<(), TransitionError> {
        self.ensure_permits(JobOperation::SubmitMapping)?;
        self.keys = Some(mapping);
        self.status = ImportStatus::Ready;
        self.touch();
        Ok(())
    }

    /// Category and mapping, when both are present
    pub fn conversion_target(&self) -> Option<(Uuid, &FieldMapping)> {
        match (self.category_id, self.keys.as_ref()) {
            (Some(category_id), Some(mapping)) => Some((category_id, mapping)),
            _ => None,
        }
    }

    /// Discovered field by attribute name
    pub fn field(&self, name: &str) -> Option<&InferredField> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

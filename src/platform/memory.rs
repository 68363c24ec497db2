//! In-memory platform collaborators
//!
//! Suitable for tests, the CLI and embedding hosts that keep no state of
//! their own.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use super::{
    BlobError, BlobRef, BlobStore, ContributionError, ContributionSink, ProjectDirectory,
    ProjectError, SchemaError, SchemaProvider,
};
use crate::models::{ContributionRef, FieldDefinition, NewContribution};
use crate::validation::input::{sanitize_file_name, validate_field_key};

/// Blob store backed by a hash map
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<BlobRef, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store(&self, name_hint: &str, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        let blob = format!("memory://{}/{}", Uuid::new_v4(), sanitize_file_name(name_hint));
        self.blobs
            .lock()
            .map_err(|e| BlobError::IoError(format!("Lock error: {}", e)))?
            .insert(blob.clone(), bytes.to_vec());
        Ok(blob)
    }

    async fn read(&self, blob: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .lock()
            .map_err(|e| BlobError::IoError(format!("Lock error: {}", e)))?
            .get(blob)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(blob.to_string()))
    }

    async fn delete(&self, blob: &str) -> Result<(), BlobError> {
        self.blobs
            .lock()
            .map_err(|e| BlobError::IoError(format!("Lock error: {}", e)))?
            .remove(blob);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Category {
    project_id: Uuid,
    name: String,
    fields: Vec<FieldDefinition>,
}

/// Schema provider holding categories in memory
#[derive(Debug, Default)]
pub struct InMemorySchemaProvider {
    categories: Mutex<HashMap<Uuid, Category>>,
}

impl InMemorySchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category with its fields and return its id
    pub fn add_category(
        &self,
        project_id: Uuid,
        name: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut categories) = self.categories.lock() {
            categories.insert(
                id,
                Category {
                    project_id,
                    name: name.into(),
                    fields,
                },
            );
        }
        id
    }

    /// Name of a category
    pub fn category_name(&self, category_id: Uuid) -> Option<String> {
        self.categories
            .lock()
            .ok()?
            .get(&category_id)
            .map(|c| c.name.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Category>>, SchemaError> {
        self.categories
            .lock()
            .map_err(|e| SchemaError::Unavailable(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl SchemaProvider for InMemorySchemaProvider {
    async fn get_fields(&self, category_id: Uuid) -> Result<Vec<FieldDefinition>, SchemaError> {
        self.lock()?
            .get(&category_id)
            .map(|c| c.fields.clone())
            .ok_or(SchemaError::CategoryNotFound(category_id))
    }

    async fn create_field(
        &self,
        category_id: Uuid,
        field: FieldDefinition,
    ) -> Result<FieldDefinition, SchemaError> {
        validate_field_key(&field.key).map_err(|e| SchemaError::InvalidField(e.to_string()))?;

        let mut categories = self.lock()?;
        let category = categories
            .get_mut(&category_id)
            .ok_or(SchemaError::CategoryNotFound(category_id))?;
        if category.fields.iter().any(|f| f.key == field.key) {
            return Err(SchemaError::FieldExists(field.key));
        }
        category.fields.push(field.clone());
        debug!(%category_id, key = %field.key, "Created category field");
        Ok(field)
    }

    async fn create_category(&self, project_id: Uuid, name: &str) -> Result<Uuid, SchemaError> {
        let id = Uuid::new_v4();
        self.lock()?.insert(
            id,
            Category {
                project_id,
                name: name.to_string(),
                fields: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn category_in_project(
        &self,
        project_id: Uuid,
        category_id: Uuid,
    ) -> Result<bool, SchemaError> {
        Ok(self
            .lock()?
            .get(&category_id)
            .is_some_and(|c| c.project_id == project_id))
    }
}

/// Contribution sink recording every created contribution
///
/// When built with [`InMemoryContributionSink::validating`], contributions
/// missing a value for a required category field are rejected, the way the
/// platform validates contributions against their category.
#[derive(Default)]
pub struct InMemoryContributionSink {
    created: Mutex<Vec<(ContributionRef, NewContribution)>>,
    schema: Option<Arc<dyn SchemaProvider>>,
    unavailable: Mutex<bool>,
}

impl InMemoryContributionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that enforces required fields from `schema`
    pub fn validating(schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            schema: Some(schema),
            ..Default::default()
        }
    }

    /// Make every following `create` fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    /// Contributions created so far, in creation order
    pub fn contributions(&self) -> Vec<(ContributionRef, NewContribution)> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.created.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ContributionSink for InMemoryContributionSink {
    async fn create(
        &self,
        contribution: NewContribution,
    ) -> Result<ContributionRef, ContributionError> {
        let unavailable = self
            .unavailable
            .lock()
            .map(|flag| *flag)
            .map_err(|e| ContributionError::Unavailable(format!("Lock error: {}", e)))?;
        if unavailable {
            return Err(ContributionError::Unavailable(
                "contribution store is offline".to_string(),
            ));
        }

        if let Some(schema) = &self.schema {
            let fields = schema
                .get_fields(contribution.category_id)
                .await
                .map_err(|e| ContributionError::Rejected(e.to_string()))?;
            for field in fields.iter().filter(|f| f.required) {
                let present = contribution
                    .values
                    .get(&field.key)
                    .is_some_and(|v| !v.is_null());
                if !present {
                    return Err(ContributionError::Rejected(format!(
                        "required field '{}' has no value",
                        field.key
                    )));
                }
            }
        }

        let reference = ContributionRef::new(Uuid::new_v4().to_string());
        self.created
            .lock()
            .map_err(|e| ContributionError::Unavailable(format!("Lock error: {}", e)))?
            .push((reference.clone(), contribution));
        Ok(reference)
    }
}

/// Project directory with explicit lock state
#[derive(Debug, Default)]
pub struct InMemoryProjectDirectory {
    locked: Mutex<HashSet<Uuid>>,
}

impl InMemoryProjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, project_id: Uuid) {
        if let Ok(mut locked) = self.locked.lock() {
            locked.insert(project_id);
        }
    }

    pub fn unlock(&self, project_id: Uuid) {
        if let Ok(mut locked) = self.locked.lock() {
            locked.remove(&project_id);
        }
    }
}

#[async_trait]
impl ProjectDirectory for InMemoryProjectDirectory {
    async fn is_locked(&self, project_id: Uuid) -> Result<bool, ProjectError> {
        self.locked
            .lock()
            .map(|locked| locked.contains(&project_id))
            .map_err(|e| ProjectError::Unavailable(format!("Lock error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeValue, FieldType, Geometry};
    use indexmap::IndexMap;

    #[tokio::test]
    async fn test_blob_round_trip() {
        let store = InMemoryBlobStore::new();
        let blob = store.store("../trees.csv", b"a,b").await.unwrap();
        assert!(blob.ends_with("/trees.csv"));
        assert_eq!(store.read(&blob).await.unwrap(), b"a,b");

        store.delete(&blob).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(
            store.read(&blob).await,
            Err(BlobError::NotFound(blob.clone()))
        );
        // Deleting twice is fine
        store.delete(&blob).await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_provider_fields() {
        let schema = InMemorySchemaProvider::new();
        let project = Uuid::new_v4();
        let category = schema.create_category(project, "Trees").await.unwrap();
        assert_eq!(schema.category_name(category), Some("Trees".to_string()));
        assert!(schema.category_in_project(project, category).await.unwrap());
        assert!(!schema.category_in_project(Uuid::new_v4(), category).await.unwrap());

        schema
            .create_field(category, FieldDefinition::new("height", FieldType::Decimal))
            .await
            .unwrap();
        assert_eq!(
            schema
                .create_field(category, FieldDefinition::new("height", FieldType::Text))
                .await,
            Err(SchemaError::FieldExists("height".to_string()))
        );
        assert!(matches!(
            schema
                .create_field(category, FieldDefinition::new("Bad Key", FieldType::Text))
                .await,
            Err(SchemaError::InvalidField(_))
        ));
        assert_eq!(schema.get_fields(category).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validating_sink_rejects_missing_required() {
        let schema = Arc::new(InMemorySchemaProvider::new());
        let project = Uuid::new_v4();
        let category = schema.add_category(
            project,
            "Trees",
            vec![FieldDefinition::new("name", FieldType::Text).required()],
        );
        let sink = InMemoryContributionSink::validating(schema);

        let mut contribution = NewContribution {
            project_id: project,
            category_id: category,
            geometry: Geometry::point(0.0, 0.0).unwrap(),
            values: IndexMap::new(),
        };
        assert!(matches!(
            sink.create(contribution.clone()).await,
            Err(ContributionError::Rejected(_))
        ));

        contribution
            .values
            .insert("name".to_string(), AttributeValue::from("Oak"));
        sink.create(contribution).await.unwrap();
        assert_eq!(sink.count(), 1);

        sink.set_unavailable(true);
        assert!(matches!(
            sink.create(NewContribution {
                project_id: project,
                category_id: category,
                geometry: Geometry::point(0.0, 0.0).unwrap(),
                values: IndexMap::new(),
            })
            .await,
            Err(ContributionError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_project_lock() {
        let directory = InMemoryProjectDirectory::new();
        let project = Uuid::new_v4();
        assert!(!directory.is_locked(project).await.unwrap());
        directory.lock(project);
        assert!(directory.is_locked(project).await.unwrap());
        directory.unlock(project);
        assert!(!directory.is_locked(project).await.unwrap());
    }
}

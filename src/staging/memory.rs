//! In-memory staging store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{StagingError, StagingResult, StagingStore, validate_records};
use crate::models::{ContributionRef, FeatureCounts, ImportJob, RawRecord, StagedFeature};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<Uuid, ImportJob>,
    /// Features per job, ordered by sequence
    features: HashMap<Uuid, Vec<StagedFeature>>,
    /// Feature id -> owning job id
    owners: HashMap<Uuid, Uuid>,
}

/// Staging store holding everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryStagingStore {
    inner: Mutex<Inner>,
}

impl InMemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StagingResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StagingError::Backend(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl StagingStore for InMemoryStagingStore {
    async fn insert_job(&self, job: &ImportJob) -> StagingResult<()> {
        let mut inner = self.lock()?;
        if inner.jobs.contains_key(&job.id) {
            return Err(StagingError::DuplicateJob(job.id));
        }
        inner.jobs.insert(job.id, job.clone());
        inner.features.insert(job.id, Vec::new());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StagingResult<ImportJob> {
        self.lock()?
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StagingError::NotFound(id))
    }

    async fn update_job(&self, job: &ImportJob) -> StagingResult<()> {
        let mut inner = self.lock()?;
        let stored = inner
            .jobs
            .get_mut(&job.id)
            .ok_or(StagingError::NotFound(job.id))?;
        *stored = job.clone();
        Ok(())
    }

    async fn list_jobs(&self, project_id: Uuid) -> StagingResult<Vec<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.project_id == project_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn list_jobs_for_category(&self, category_id: Uuid) -> StagingResult<Vec<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.category_id == Some(category_id))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> StagingResult<usize> {
        let mut inner = self.lock()?;
        if inner.jobs.remove(&id).is_none() {
            return Err(StagingError::NotFound(id));
        }
        let features = inner.features.remove(&id).unwrap_or_default();
        for feature in &features {
            inner.owners.remove(&feature.id);
        }
        debug!(import_id = %id, features = features.len(), "Deleted staged import");
        Ok(features.len())
    }

    async fn stage(&self, job_id: Uuid, records: Vec<RawRecord>) -> StagingResult<usize> {
        let mut inner = self.lock()?;
        let next_sequence = inner
            .features
            .get(&job_id)
            .ok_or(StagingError::NotFound(job_id))?
            .last()
            .map(|f| f.sequence + 1)
            .unwrap_or(0);

        validate_records(next_sequence, &records)?;

        let staged: Vec<StagedFeature> = records
            .into_iter()
            .enumerate()
            .map(|(offset, record)| {
                StagedFeature::from_record(job_id, next_sequence + offset as u64, record)
            })
            .collect();
        let count = staged.len();

        for feature in &staged {
            inner.owners.insert(feature.id, job_id);
        }
        inner.features.entry(job_id).or_default().extend(staged);
        Ok(count)
    }

    async fn unconverted_page(
        &self,
        job_id: Uuid,
        after: Option<u64>,
        limit: usize,
    ) -> StagingResult<Vec<StagedFeature>> {
        let inner = self.lock()?;
        let features = inner
            .features
            .get(&job_id)
            .ok_or(StagingError::NotFound(job_id))?;
        Ok(features
            .iter()
            .filter(|f| !f.imported)
            .filter(|f| after.is_none_or(|after| f.sequence > after))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_features(&self, job_id: Uuid, ids: &[Uuid]) -> StagingResult<Vec<StagedFeature>> {
        let inner = self.lock()?;
        let features = inner
            .features
            .get(&job_id)
            .ok_or(StagingError::NotFound(job_id))?;
        Ok(features
            .iter()
            .filter(|f| ids.contains(&f.id))
            .cloned()
            .collect())
    }

    async fn mark_converted(
        &self,
        feature_id: Uuid,
        contribution: &ContributionRef,
    ) -> StagingResult<StagedFeature> {
        let mut inner = self.lock()?;
        let job_id = *inner
            .owners
            .get(&feature_id)
            .ok_or(StagingError::FeatureNotFound(feature_id))?;
        let feature = inner
            .features
            .get_mut(&job_id)
            .and_then(|features| features.iter_mut().find(|f| f.id == feature_id))
            .ok_or(StagingError::FeatureNotFound(feature_id))?;

        if feature.imported {
            return Err(StagingError::AlreadyImported(feature_id));
        }
        feature.imported = true;
        feature.contribution = Some(contribution.clone());
        Ok(feature.clone())
    }

    async fn feature_counts(&self, job_id: Uuid) -> StagingResult<FeatureCounts> {
        let inner = self.lock()?;
        let features = inner
            .features
            .get(&job_id)
            .ok_or(StagingError::NotFound(job_id))?;
        Ok(FeatureCounts {
            total: features.len(),
            imported: features.iter().filter(|f| f.imported).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeValue, Attributes, Coordinate, DataFormat, Geometry};
    use crate::staging::FeatureCursor;

    fn job() -> ImportJob {
        ImportJob::new(
            Uuid::new_v4(),
            "Trees",
            "memory://trees.csv",
            "trees.csv",
            DataFormat::Csv,
            Vec::new(),
        )
    }

    fn records(n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| {
                let mut attributes = Attributes::new();
                attributes.insert("n".to_string(), AttributeValue::Integer(i as i64));
                RawRecord::new(Geometry::point(i as f64, 0.0).unwrap(), attributes)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_job_crud() {
        let store = InMemoryStagingStore::new();
        let mut job = job();
        store.insert_job(&job).await.unwrap();
        assert_eq!(
            store.insert_job(&job).await,
            Err(StagingError::DuplicateJob(job.id))
        );

        job.attach_category(Uuid::new_v4()).unwrap();
        store.update_job(&job).await.unwrap();
        assert_eq!(store.get_job(job.id).await.unwrap(), job);
        assert_eq!(store.list_jobs(job.project_id).await.unwrap().len(), 1);
        assert!(store.list_jobs(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_jobs_for_category() {
        let store = InMemoryStagingStore::new();
        let category_id = Uuid::new_v4();
        let mut attached = job();
        attached.attach_category(category_id).unwrap();
        store.insert_job(&attached).await.unwrap();
        store.insert_job(&job()).await.unwrap();

        let jobs = store.list_jobs_for_category(category_id).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, attached.id);
        assert!(store.list_jobs_for_category(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stage_and_count() {
        let store = InMemoryStagingStore::new();
        let job = job();
        store.insert_job(&job).await.unwrap();

        assert_eq!(store.stage(job.id, records(3)).await.unwrap(), 3);
        assert_eq!(store.stage(job.id, records(2)).await.unwrap(), 2);

        let page = store.unconverted_page(job.id, None, 10).await.unwrap();
        let sequences: Vec<u64> = page.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(
            store.feature_counts(job.id).await.unwrap(),
            FeatureCounts {
                total: 5,
                imported: 0
            }
        );
    }

    #[tokio::test]
    async fn test_stage_is_all_or_nothing() {
        let store = InMemoryStagingStore::new();
        let job = job();
        store.insert_job(&job).await.unwrap();

        let mut batch = records(3);
        batch[1].geometry = Geometry::LineString(vec![Coordinate::new(0.0, 0.0)]);
        let err = store.stage(job.id, batch).await.unwrap_err();
        assert!(matches!(err, StagingError::InvalidFeature { sequence: 1, .. }));
        assert_eq!(store.feature_counts(job.id).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_mark_converted_once() {
        let store = InMemoryStagingStore::new();
        let job = job();
        store.insert_job(&job).await.unwrap();
        store.stage(job.id, records(2)).await.unwrap();

        let first = store.unconverted_page(job.id, None, 1).await.unwrap()[0].clone();
        let reference = ContributionRef::new("c-1");
        let marked = store.mark_converted(first.id, &reference).await.unwrap();
        assert!(marked.imported);
        assert_eq!(marked.contribution, Some(reference.clone()));

        assert_eq!(
            store.mark_converted(first.id, &reference).await,
            Err(StagingError::AlreadyImported(first.id))
        );
        let missing = Uuid::new_v4();
        assert_eq!(
            store.mark_converted(missing, &reference).await,
            Err(StagingError::FeatureNotFound(missing))
        );

        let remaining = store.unconverted_page(job.id, None, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].sequence, 1);
    }

    #[tokio::test]
    async fn test_get_features_in_creation_order() {
        let store = InMemoryStagingStore::new();
        let job = job();
        store.insert_job(&job).await.unwrap();
        store.stage(job.id, records(3)).await.unwrap();
        let all = store.unconverted_page(job.id, None, 10).await.unwrap();

        let ids = [all[2].id, all[0].id, Uuid::new_v4()];
        let found = store.get_features(job.id, &ids).await.unwrap();
        let sequences: Vec<u64> = found.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_cursor_pages_and_rewinds() {
        let store = InMemoryStagingStore::new();
        let job = job();
        store.insert_job(&job).await.unwrap();
        store.stage(job.id, records(5)).await.unwrap();

        let mut cursor = FeatureCursor::new(&store, job.id, 2);
        let mut seen = Vec::new();
        loop {
            let page = cursor.next_page().await.unwrap();
            if page.is_empty() {
                break;
            }
            for feature in page {
                // Converting while iterating must not skip anything
                store
                    .mark_converted(feature.id, &ContributionRef::new(feature.id.to_string()))
                    .await
                    .unwrap();
                seen.push(feature.sequence);
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        cursor.rewind();
        assert!(cursor.next_page().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = InMemoryStagingStore::new();
        let job = job();
        store.insert_job(&job).await.unwrap();
        store.stage(job.id, records(4)).await.unwrap();
        let feature = store.unconverted_page(job.id, None, 1).await.unwrap()[0].clone();

        assert_eq!(store.delete_job(job.id).await.unwrap(), 4);
        assert_eq!(store.get_job(job.id).await, Err(StagingError::NotFound(job.id)));
        assert_eq!(
            store.mark_converted(feature.id, &ContributionRef::new("c")).await,
            Err(StagingError::FeatureNotFound(feature.id))
        );
        assert_eq!(
            store.delete_job(job.id).await,
            Err(StagingError::NotFound(job.id))
        );
    }
}

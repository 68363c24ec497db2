//! Conversion engine
//!
//! Turns staged features into contributions. Each feature is mapped,
//! coerced, created and then marked as converted; a failure only affects the
//! feature it happened on. Features already marked as imported are never
//! converted again.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::coercion::coerce;
use super::state::{ConversionState, StateError};
use crate::models::{
    AttributeValue, ContributionRef, FieldDefinition, FieldMapping, ImportJob, NewContribution,
    StagedFeature,
};
use crate::platform::{ContributionSink, SchemaError, SchemaProvider};
use crate::staging::{DEFAULT_PAGE_SIZE, FeatureCursor, StagingError, StagingStore};

/// Run-level conversion errors; nothing was converted
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Category or mapping missing, or the mapping no longer fits the category
    #[error("Import is not configured for conversion: {0}")]
    NotConfigured(String),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Why a single feature was not converted
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FeatureError {
    /// A mapped value does not fit its target field
    #[error("Field '{field}': {reason}")]
    Coercion { field: String, reason: String },

    /// The platform refused or could not create the contribution
    #[error("Contribution could not be created: {reason}")]
    ContributionCreation { reason: String },

    /// The selected id is not a feature of this import
    #[error("Feature is not part of this import")]
    UnknownFeature,

    /// The contribution exists but the feature could not be flagged as imported
    #[error("Contribution {contribution} created but feature not marked: {reason}")]
    MarkFailed {
        contribution: ContributionRef,
        reason: String,
    },
}

/// A feature that failed to convert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFailure {
    pub feature_id: Uuid,
    /// Position in the uploaded file; absent for unknown features
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub error: FeatureError,
}

/// Which features to convert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureSelection {
    /// Every unconverted feature
    All,
    /// Specific features by id
    Ids(Vec<Uuid>),
}

/// Result of one conversion run
#[must_use = "conversion summaries report per-feature failures"]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSummary {
    pub import_id: Uuid,
    pub outcome: ConversionState,
    /// Features converted by this run
    pub converted: usize,
    /// Selected features that were already imported
    pub skipped_already_imported: usize,
    pub failed: Vec<FeatureFailure>,
    /// Contributions created by this run, in feature order
    pub contributions: Vec<ContributionRef>,
    pub warnings: Vec<String>,
    /// Selected features left unattempted because the run hit
    /// `max_features_per_run`
    #[serde(default)]
    pub deferred: usize,
    /// Unconverted features left in the import after this run
    pub remaining: usize,
    pub duration_ms: u64,
}

impl ConversionSummary {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Converts staged features into contributions
pub struct ConversionEngine {
    staging: Arc<dyn StagingStore>,
    schema: Arc<dyn SchemaProvider>,
    sink: Arc<dyn ContributionSink>,
    max_features_per_run: Option<usize>,
    page_size: usize,
}

/// Category fields and mapping resolved for one run
struct Plan<'a> {
    project_id: Uuid,
    category_id: Uuid,
    mapping: &'a FieldMapping,
    fields: HashMap<String, FieldDefinition>,
}

impl ConversionEngine {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        schema: Arc<dyn SchemaProvider>,
        sink: Arc<dyn ContributionSink>,
    ) -> Self {
        Self {
            staging,
            schema,
            sink,
            max_features_per_run: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Bound the number of features attempted per run; callers re-invoke to continue
    pub fn with_max_features_per_run(mut self, max: Option<usize>) -> Self {
        self.max_features_per_run = max.filter(|m| *m > 0);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Convert the selected features of `job`
    ///
    /// Fails with [`ConversionError::NotConfigured`] before touching any
    /// feature when the job has no category or mapping, or when a mapped
    /// target is not a field of the category.
    pub async fn convert(
        &self,
        job: &ImportJob,
        selection: &FeatureSelection,
    ) -> Result<ConversionSummary, ConversionError> {
        let start = Instant::now();
        let mut state = ConversionState::Pending;

        let plan = self.plan(job).await?;
        let warnings = unfilled_required(&plan);
        for warning in &warnings {
            warn!(import_id = %job.id, "{}", warning);
        }

        state = state.transition(ConversionState::Converting)?;
        info!(import_id = %job.id, category_id = %plan.category_id, "Converting staged features");

        let mut run = Run::default();
        match selection {
            FeatureSelection::All => {
                run.skipped = self.staging.feature_counts(job.id).await?.imported;
                let mut cursor = FeatureCursor::new(self.staging.as_ref(), job.id, self.page_size);
                let mut capped = false;
                'pages: loop {
                    let page = cursor.next_page().await?;
                    if page.is_empty() {
                        break;
                    }
                    for feature in page {
                        if self.limit_reached(&run) {
                            capped = true;
                            break 'pages;
                        }
                        self.convert_one(&plan, &feature, &mut run).await;
                    }
                }
                if capped {
                    // Attempted failures stay unconverted; everything else left was never tried
                    let remaining = self.staging.feature_counts(job.id).await?.remaining();
                    run.deferred = remaining.saturating_sub(run.failed.len());
                }
            }
            FeatureSelection::Ids(ids) => {
                let mut unique = ids.clone();
                unique.sort();
                unique.dedup();

                let features = self.staging.get_features(job.id, &unique).await?;
                for id in &unique {
                    if !features.iter().any(|f| f.id == *id) {
                        run.failed.push(FeatureFailure {
                            feature_id: *id,
                            sequence: None,
                            error: FeatureError::UnknownFeature,
                        });
                    }
                }
                for feature in features {
                    if feature.imported {
                        run.skipped += 1;
                        continue;
                    }
                    if self.limit_reached(&run) {
                        run.deferred += 1;
                        continue;
                    }
                    self.convert_one(&plan, &feature, &mut run).await;
                }
            }
        }

        let outcome = ConversionState::outcome(
            run.converted(),
            run.failed.len() + run.deferred,
            run.skipped,
        );
        state = state.transition(outcome)?;
        let remaining = self.staging.feature_counts(job.id).await?.remaining();

        info!(
            import_id = %job.id,
            outcome = %state,
            converted = run.converted(),
            failed = run.failed.len(),
            skipped = run.skipped,
            deferred = run.deferred,
            remaining,
            "Conversion finished"
        );

        Ok(ConversionSummary {
            import_id: job.id,
            outcome: state,
            converted: run.converted(),
            skipped_already_imported: run.skipped,
            failed: run.failed,
            contributions: run.contributions,
            warnings,
            deferred: run.deferred,
            remaining,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn plan<'a>(&self, job: &'a ImportJob) -> Result<Plan<'a>, ConversionError> {
        let Some((category_id, mapping)) = job.conversion_target() else {
            let reason = if job.category_id.is_none() {
                "no category attached"
            } else {
                "no field mapping submitted"
            };
            return Err(ConversionError::NotConfigured(reason.to_string()));
        };

        let fields: HashMap<String, FieldDefinition> = self
            .schema
            .get_fields(category_id)
            .await?
            .into_iter()
            .map(|f| (f.key.clone(), f))
            .collect();

        if let Some(missing) = mapping.target_keys().find(|key| !fields.contains_key(*key)) {
            return Err(ConversionError::NotConfigured(format!(
                "mapping target '{}' is not a field of the category",
                missing
            )));
        }

        Ok(Plan {
            project_id: job.project_id,
            category_id,
            mapping,
            fields,
        })
    }

    fn limit_reached(&self, run: &Run) -> bool {
        self.max_features_per_run
            .is_some_and(|max| run.attempted >= max)
    }

    async fn convert_one(&self, plan: &Plan<'_>, feature: &StagedFeature, run: &mut Run) {
        run.attempted += 1;
        match self.convert_feature(plan, feature).await {
            Ok(contribution) => {
                debug!(feature_id = %feature.id, contribution = %contribution, "Feature converted");
                run.contributions.push(contribution);
            }
            Err(e) => {
                debug!(feature_id = %feature.id, error = %e, "Feature not converted");
                run.failed.push(FeatureFailure {
                    feature_id: feature.id,
                    sequence: Some(feature.sequence),
                    error: e,
                });
            }
        }
    }

    async fn convert_feature(
        &self,
        plan: &Plan<'_>,
        feature: &StagedFeature,
    ) -> Result<ContributionRef, FeatureError> {
        let values = map_values(plan, feature)?;

        let contribution = self
            .sink
            .create(NewContribution {
                project_id: plan.project_id,
                category_id: plan.category_id,
                geometry: feature.geometry.clone(),
                values,
            })
            .await
            .map_err(|e| FeatureError::ContributionCreation {
                reason: e.to_string(),
            })?;

        if let Err(e) = self.staging.mark_converted(feature.id, &contribution).await {
            error!(
                feature_id = %feature.id,
                contribution = %contribution,
                error = %e,
                "Contribution created but feature could not be marked as imported"
            );
            return Err(FeatureError::MarkFailed {
                contribution,
                reason: e.to_string(),
            });
        }
        Ok(contribution)
    }
}

#[derive(Default)]
struct Run {
    attempted: usize,
    skipped: usize,
    deferred: usize,
    contributions: Vec<ContributionRef>,
    failed: Vec<FeatureFailure>,
}

impl Run {
    fn converted(&self) -> usize {
        self.contributions.len()
    }
}

/// Apply the mapping and defaults to a feature and coerce every value
fn map_values(
    plan: &Plan<'_>,
    feature: &StagedFeature,
) -> Result<IndexMap<String, AttributeValue>, FeatureError> {
    let mut values = IndexMap::new();

    let mut put = |target_key: &str, value: &AttributeValue| -> Result<(), FeatureError> {
        let Some(field) = plan.fields.get(target_key) else {
            return Ok(());
        };
        let coerced = coerce(value, field).map_err(|e| FeatureError::Coercion {
            field: target_key.to_string(),
            reason: e.to_string(),
        })?;
        if !coerced.is_null() {
            values.insert(target_key.to_string(), coerced);
        }
        Ok(())
    };

    for entry in &plan.mapping.entries {
        let source = feature
            .attributes
            .get(&entry.source_key)
            .filter(|v| !v.is_null());
        if let Some(value) = source.or_else(|| plan.mapping.defaults.get(&entry.target_key)) {
            put(&entry.target_key, value)?;
        }
    }
    for (target_key, value) in &plan.mapping.defaults {
        if plan.mapping.entries.iter().all(|e| &e.target_key != target_key) {
            put(target_key, value)?;
        }
    }
    Ok(values)
}

/// Warnings for required category fields the mapping leaves empty
fn unfilled_required(plan: &Plan<'_>) -> Vec<String> {
    let mut keys: Vec<&str> = plan
        .fields
        .values()
        .filter(|f| f.required && !plan.mapping.fills_target(&f.key))
        .map(|f| f.key.as_str())
        .collect();
    keys.sort_unstable();
    keys.into_iter()
        .map(|key| format!("Required field '{}' is not mapped", key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, DataFormat, FieldType, Geometry, RawRecord};
    use crate::platform::{InMemoryContributionSink, InMemorySchemaProvider};
    use crate::staging::InMemoryStagingStore;

    struct Fixture {
        staging: Arc<InMemoryStagingStore>,
        sink: Arc<InMemoryContributionSink>,
        engine: ConversionEngine,
        job: ImportJob,
    }

    async fn fixture(heights: &[&str], fields: Vec<FieldDefinition>, mapping: FieldMapping) -> Fixture {
        let staging = Arc::new(InMemoryStagingStore::new());
        let schema = Arc::new(InMemorySchemaProvider::new());
        let sink = Arc::new(InMemoryContributionSink::new());

        let project_id = Uuid::new_v4();
        let category_id = schema.add_category(project_id, "Trees", fields);
        let mut job = ImportJob::new(
            project_id,
            "Trees",
            "memory://trees.csv",
            "trees.csv",
            DataFormat::Csv,
            Vec::new(),
        );
        staging.insert_job(&job).await.unwrap();
        let records = heights
            .iter()
            .enumerate()
            .map(|(i, height)| {
                let mut attributes = Attributes::new();
                attributes.insert("name".to_string(), AttributeValue::from(format!("tree {}", i)));
                attributes.insert("height".to_string(), AttributeValue::from(*height));
                RawRecord::new(Geometry::point(i as f64, 0.0).unwrap(), attributes)
            })
            .collect();
        staging.stage(job.id, records).await.unwrap();

        job.attach_category(category_id).unwrap();
        job.apply_mapping(mapping).unwrap();
        staging.update_job(&job).await.unwrap();

        let engine = ConversionEngine::new(staging.clone(), schema, sink.clone());
        Fixture {
            staging,
            sink,
            engine,
            job,
        }
    }

    fn tree_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("name", FieldType::Text).required(),
            FieldDefinition::new("height", FieldType::Decimal),
        ]
    }

    fn tree_mapping() -> FieldMapping {
        FieldMapping::new().map("name", "name").map("height", "height")
    }

    #[tokio::test]
    async fn test_converts_all_features() {
        let f = fixture(&["1.5", "2", "3.25"], tree_fields(), tree_mapping()).await;
        let summary = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();

        assert_eq!(summary.outcome, ConversionState::Completed);
        assert_eq!(summary.converted, 3);
        assert_eq!(summary.remaining, 0);
        assert!(summary.failed.is_empty());

        let created = f.sink.contributions();
        assert_eq!(created.len(), 3);
        assert_eq!(
            created[1].1.values.get("height"),
            Some(&AttributeValue::Decimal(2.0))
        );
    }

    #[tokio::test]
    async fn test_second_run_converts_nothing() {
        let f = fixture(&["1", "2"], tree_fields(), tree_mapping()).await;
        let _ = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        let summary = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();

        assert_eq!(summary.converted, 0);
        assert_eq!(summary.skipped_already_imported, 2);
        assert_eq!(summary.outcome, ConversionState::Completed);
        assert_eq!(f.sink.count(), 2);
    }

    #[tokio::test]
    async fn test_coercion_failures_are_isolated() {
        let f = fixture(&["1", "tall", "3", "n/a"], tree_fields(), tree_mapping()).await;
        let summary = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();

        assert_eq!(summary.outcome, ConversionState::PartiallyCompleted);
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.failed_count(), 2);
        assert_eq!(summary.remaining, 2);
        assert_eq!(summary.failed[0].sequence, Some(1));
        assert!(matches!(
            &summary.failed[0].error,
            FeatureError::Coercion { field, .. } if field == "height"
        ));
    }

    #[tokio::test]
    async fn test_rejected_contributions_stay_eligible() {
        let f = fixture(&["1", "2"], tree_fields(), tree_mapping()).await;
        f.sink.set_unavailable(true);
        let summary = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        assert_eq!(summary.outcome, ConversionState::Failed);
        assert!(matches!(
            summary.failed[0].error,
            FeatureError::ContributionCreation { .. }
        ));

        f.sink.set_unavailable(false);
        let summary = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        assert_eq!(summary.converted, 2);
    }

    #[tokio::test]
    async fn test_selected_ids() {
        let f = fixture(&["1", "2", "3"], tree_fields(), tree_mapping()).await;
        let features = f.staging.unconverted_page(f.job.id, None, 10).await.unwrap();
        let unknown = Uuid::new_v4();

        let selection = FeatureSelection::Ids(vec![features[2].id, unknown]);
        let summary = f.engine.convert(&f.job, &selection).await.unwrap();
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.outcome, ConversionState::PartiallyCompleted);
        assert_eq!(summary.failed[0].feature_id, unknown);
        assert_eq!(summary.failed[0].error, FeatureError::UnknownFeature);

        let summary = f
            .engine
            .convert(&f.job, &FeatureSelection::Ids(vec![features[2].id]))
            .await
            .unwrap();
        assert_eq!(summary.skipped_already_imported, 1);
        assert_eq!(summary.outcome, ConversionState::Completed);
    }

    #[tokio::test]
    async fn test_not_configured() {
        let mut f = fixture(&["1"], tree_fields(), tree_mapping()).await;
        f.job.keys = None;
        assert!(matches!(
            f.engine.convert(&f.job, &FeatureSelection::All).await,
            Err(ConversionError::NotConfigured(reason)) if reason == "no field mapping submitted"
        ));

        let category_id = f.job.category_id.take();
        assert!(matches!(
            f.engine.convert(&f.job, &FeatureSelection::All).await,
            Err(ConversionError::NotConfigured(reason)) if reason == "no category attached"
        ));
        f.job.category_id = category_id;

        f.job.keys = Some(FieldMapping::new().map("name", "species"));
        assert!(matches!(
            f.engine.convert(&f.job, &FeatureSelection::All).await,
            Err(ConversionError::NotConfigured(_))
        ));
        assert_eq!(f.sink.count(), 0);
    }

    #[tokio::test]
    async fn test_defaults_and_warnings() {
        let fields = vec![
            FieldDefinition::new("name", FieldType::Text).required(),
            FieldDefinition::new("height", FieldType::Decimal),
            FieldDefinition::new("status", FieldType::Text),
            FieldDefinition::new("surveyor", FieldType::Text).required(),
        ];
        let mapping = FieldMapping::new()
            .map("name", "name")
            .map("height", "height")
            .with_default("height", AttributeValue::Decimal(0.0))
            .with_default("status", AttributeValue::from("surveyed"));
        let f = fixture(&["", "4"], fields, mapping).await;

        let summary = f.engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(
            summary.warnings,
            vec!["Required field 'surveyor' is not mapped".to_string()]
        );

        let created = f.sink.contributions();
        assert_eq!(
            created[0].1.values.get("height"),
            Some(&AttributeValue::Decimal(0.0))
        );
        assert_eq!(
            created[1].1.values.get("height"),
            Some(&AttributeValue::Decimal(4.0))
        );
        assert_eq!(
            created[0].1.values.get("status"),
            Some(&AttributeValue::from("surveyed"))
        );
    }

    #[tokio::test]
    async fn test_max_features_per_run() {
        let f = fixture(&["1", "2", "3", "4", "5"], tree_fields(), tree_mapping()).await;
        let engine = f.engine.with_max_features_per_run(Some(2)).with_page_size(1);

        let summary = engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.deferred, 3);
        assert_eq!(summary.remaining, 3);
        assert_eq!(summary.outcome, ConversionState::PartiallyCompleted);

        let _ = engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        let summary = engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.deferred, 0);
        assert_eq!(summary.remaining, 0);
        assert_eq!(summary.outcome, ConversionState::Completed);
        assert_eq!(f.sink.count(), 5);
    }

    #[tokio::test]
    async fn test_max_features_per_run_with_selected_ids() {
        let f = fixture(&["1", "2", "3", "4", "5"], tree_fields(), tree_mapping()).await;
        let features = f.staging.unconverted_page(f.job.id, None, 10).await.unwrap();
        let engine = f.engine.with_max_features_per_run(Some(2));

        let selection = FeatureSelection::Ids(features[..3].iter().map(|feature| feature.id).collect());
        let summary = engine.convert(&f.job, &selection).await.unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.failed_count(), 0);
        assert_eq!(summary.outcome, ConversionState::PartiallyCompleted);

        let summary = engine.convert(&f.job, &selection).await.unwrap();
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.skipped_already_imported, 2);
        assert_eq!(summary.deferred, 0);
        assert_eq!(summary.outcome, ConversionState::Completed);
        assert_eq!(summary.remaining, 2);
    }

    #[tokio::test]
    async fn test_cap_with_failures_counts_only_untried_as_deferred() {
        let f = fixture(&["tall", "2", "3", "4"], tree_fields(), tree_mapping()).await;
        let engine = f.engine.with_max_features_per_run(Some(2));

        let summary = engine.convert(&f.job, &FeatureSelection::All).await.unwrap();
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.deferred, 2);
        assert_eq!(summary.remaining, 3);
        assert_eq!(summary.outcome, ConversionState::PartiallyCompleted);
    }
}

//! Create, update or refresh a reflection so it matches a desired definition.
//!
//! # Design
//! - A run walks `Resolving → Validating → Matching → {Creating | Updating |
//!   Refreshing} → Done`; any error lands in `Failed` and is returned as-is.
//! - The dataset and the composed spec are computed once per run and passed by
//!   value to the later steps.
//! - Remote calls are issued sequentially and never retried.

use std::fmt;

use dremio_client::{CatalogResolver, DremioApi};
use dremio_core::{
    Dataset, DatasetType, FieldRef, ReflectionError, ReflectionRecord, ReflectionResult,
    ReflectionSpec, ReflectionType, RefreshPolicy, diff, merge_update,
};
use dremio_telemetry::record_task_phase;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

/// Step of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Looking up the dataset.
    Resolving,
    /// Checking the request against the dataset.
    Validating,
    /// Looking for an existing reflection with the same name.
    Matching,
    /// Issuing a create call.
    Creating,
    /// Issuing an update call.
    Updating,
    /// Triggering a manual refresh.
    Refreshing,
    /// Finished successfully.
    Done,
    /// Aborted.
    Failed,
}

impl ReconcilePhase {
    /// Lower-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Validating => "validating",
            Self::Matching => "matching",
            Self::Creating => "creating",
            Self::Updating => "updating",
            Self::Refreshing => "refreshing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful run did to the reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// No reflection had the name; one was created.
    Created,
    /// The definition differed and was updated in place.
    Updated,
    /// The definition matched; a refresh was triggered.
    Refreshed,
}

impl ReconcileAction {
    /// Lower-case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Refreshed => "refreshed",
        }
    }
}

/// Inputs of a reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileRequest {
    /// Dot-delimited source path of the dataset.
    pub source: String,
    /// Desired reflection definition.
    pub spec: ReflectionSpec,
    /// Replace display fields with every dataset column.
    pub auto_inference: bool,
    /// SQL text; mandatory for virtual datasets.
    pub sql: Option<String>,
    /// Refresh policy applied to the dataset; defaults to never refresh.
    pub refresh_policy: Option<RefreshPolicy>,
    /// Execution queue assigned to the dataset's reflections.
    pub queue: Option<String>,
}

impl ReconcileRequest {
    /// Request with every optional input unset.
    #[must_use]
    pub fn new(source: impl Into<String>, spec: ReflectionSpec) -> Self {
        Self {
            source: source.into(),
            spec,
            auto_inference: false,
            sql: None,
            refresh_policy: None,
            queue: None,
        }
    }

    /// Set the auto-inference flag.
    #[must_use]
    pub const fn with_auto_inference(mut self, enabled: bool) -> Self {
        self.auto_inference = enabled;
        self
    }

    /// Attach SQL text.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach a refresh policy.
    #[must_use]
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    /// Attach an execution queue.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Checks that need nothing from the remote system.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::Validation`] when the name or type is missing,
    /// or when a raw reflection has no display fields and inference is off.
    pub fn validate_spec(&self) -> ReflectionResult<()> {
        if self.source.trim().is_empty() {
            return Err(ReflectionError::validation("source", "must not be empty"));
        }
        if self.spec.name.as_deref().is_none_or(str::is_empty) {
            return Err(ReflectionError::validation(
                "name",
                "is mandatory but not present in the reflection spec",
            ));
        }
        if self.spec.reflection_type.is_none() {
            return Err(ReflectionError::validation(
                "type",
                "is mandatory but not present in the reflection spec",
            ));
        }
        if self.spec.reflection_type == Some(ReflectionType::Raw)
            && !self.spec.has_display_fields()
            && !self.auto_inference
        {
            return Err(ReflectionError::validation(
                "displayFields",
                "are required for raw reflections when auto inference is disabled",
            ));
        }
        Ok(())
    }

    /// Checks that depend on the resolved dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::Validation`] for a virtual dataset without SQL.
    pub fn validate_against(&self, dataset: &Dataset) -> ReflectionResult<()> {
        let has_sql = self.sql.as_deref().is_some_and(|sql| !sql.trim().is_empty());
        if dataset.dataset_type == DatasetType::Virtual && !has_sql {
            return Err(ReflectionError::validation(
                "sql",
                "is required for virtual datasets",
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.spec.name.as_deref().unwrap_or_default()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Identifier of the created, updated or refreshed reflection.
    pub reflection_id: String,
    /// Dataset the reflection belongs to.
    pub dataset_id: String,
    /// What the run did.
    pub action: ReconcileAction,
}

/// Drives reconciliation runs against one remote system.
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    api: DremioApi,
    catalog: CatalogResolver,
}

impl ReconciliationEngine {
    /// Engine issuing calls through `api`.
    #[must_use]
    pub fn new(api: DremioApi) -> Self {
        let catalog = CatalogResolver::new(api.clone());
        Self { api, catalog }
    }

    /// Bring the named reflection in line with `request.spec`.
    ///
    /// # Errors
    ///
    /// Returns the first validation, lookup or remote failure encountered.
    pub async fn reconcile(&self, request: &ReconcileRequest) -> ReflectionResult<ReconcileOutcome> {
        let mut phase = ReconcilePhase::Validating;
        let result = self.run(request, &mut phase).await;
        let metrics = self.api.metrics();
        match &result {
            Ok(outcome) => {
                enter(ReconcilePhase::Done, &mut phase);
                info!(
                    reflection_id = %outcome.reflection_id,
                    dataset_id = %outcome.dataset_id,
                    action = outcome.action.as_str(),
                    "reconciliation finished"
                );
                if let Some(metrics) = metrics {
                    metrics.inc_reconciliation(outcome.action.as_str());
                }
            }
            Err(err) => {
                let failed_in = phase;
                enter(ReconcilePhase::Failed, &mut phase);
                error!(phase = failed_in.as_str(), source = %request.source, error = %err, "reconciliation failed");
                if let Some(metrics) = metrics {
                    metrics.inc_reconciliation_failure();
                }
            }
        }
        result
    }

    async fn run(
        &self,
        request: &ReconcileRequest,
        phase: &mut ReconcilePhase,
    ) -> ReflectionResult<ReconcileOutcome> {
        request.validate_spec()?;

        enter(ReconcilePhase::Resolving, phase);
        let dataset = self.catalog.resolve(&request.source).await?;

        enter(ReconcilePhase::Validating, phase);
        request.validate_against(&dataset)?;
        self.prepare_dataset(request, &dataset).await?;
        let desired = compose_spec(request, &dataset);

        enter(ReconcilePhase::Matching, phase);
        let existing = self
            .catalog
            .list_reflections(&dataset.id)
            .await?
            .into_iter()
            .find(|reflection| reflection.name() == Some(request.name()));

        let Some(existing) = existing else {
            enter(ReconcilePhase::Creating, phase);
            info!(name = request.name(), source = %request.source, "creating reflection");
            let created = self.api.create_reflection(desired).await?;
            return outcome(&created, &dataset, ReconcileAction::Created, "reflection.create");
        };

        let existing_id = record_id(&existing, "dataset.reflections")?;
        info!(name = request.name(), reflection_id = %existing_id, "reflection already exists");
        let changes = diff(&desired, existing.as_map());

        if changes.is_empty() {
            enter(ReconcilePhase::Refreshing, phase);
            info!(reflection_id = %existing_id, "no changes; triggering refresh");
            self.api.trigger_reflection_refresh(&dataset.id).await?;
            return Ok(ReconcileOutcome {
                reflection_id: existing_id,
                dataset_id: dataset.id,
                action: ReconcileAction::Refreshed,
            });
        }

        enter(ReconcilePhase::Updating, phase);
        info!(
            reflection_id = %existing_id,
            changed = ?changes.keys().collect::<Vec<_>>(),
            "updating reflection"
        );
        let body = merge_update(existing.as_map(), &changes);
        let updated = self.api.update_reflection(&existing_id, body).await?;
        let reflection_id = updated.id().map_or(existing_id, str::to_string);
        Ok(ReconcileOutcome {
            reflection_id,
            dataset_id: dataset.id,
            action: ReconcileAction::Updated,
        })
    }

    async fn prepare_dataset(
        &self,
        request: &ReconcileRequest,
        dataset: &Dataset,
    ) -> ReflectionResult<()> {
        if dataset.dataset_type == DatasetType::Physical {
            self.api
                .refresh_table_metadata(&request.source, None)
                .await?;
        }

        let policy = request.refresh_policy.clone().unwrap_or_default();
        self.api
            .update_catalog(
                &dataset.id,
                json!({
                    "entityType": "dataset",
                    "id": dataset.id,
                    "type": dataset.dataset_type.as_str(),
                    "path": dataset.path,
                    "accelerationRefreshPolicy": policy,
                }),
            )
            .await?;

        if let Some(queue) = request.queue.as_deref().filter(|queue| !queue.is_empty()) {
            info!(dataset_id = %dataset.id, queue, "assigning reflection queue");
            self.api
                .execute_sql(&format!("ALTER DATASET {} QUEUE {queue}", dataset.id), None)
                .await?;
        }
        Ok(())
    }
}

fn enter(next: ReconcilePhase, phase: &mut ReconcilePhase) {
    *phase = next;
    record_task_phase(next.as_str());
    info!(phase = next.as_str(), "reconciliation phase");
}

/// Desired spec with inferred display fields and the dataset reference filled in.
fn compose_spec(request: &ReconcileRequest, dataset: &Dataset) -> Map<String, Value> {
    let mut spec = request.spec.clone();
    if request.auto_inference {
        if spec.has_display_fields() {
            warn!(
                name = request.name(),
                "auto inference overrides the supplied display fields"
            );
        }
        let names = dataset.field_names();
        info!(fields = ?names, "inferred display fields from dataset");
        spec.display_fields = Some(names.into_iter().map(FieldRef::new).collect());
    }
    if spec.dataset_id.is_none() {
        spec.dataset_id = Some(dataset.id.clone());
    }
    let mut body = spec.to_body();
    body.entry("entityType")
        .or_insert_with(|| Value::String("reflection".to_string()));
    body
}

fn record_id(record: &ReflectionRecord, operation: &'static str) -> ReflectionResult<String> {
    record
        .id()
        .map(str::to_string)
        .ok_or_else(|| ReflectionError::UnexpectedResponse {
            operation,
            detail: "reflection has no id".to_string(),
        })
}

fn outcome(
    record: &ReflectionRecord,
    dataset: &Dataset,
    action: ReconcileAction,
    operation: &'static str,
) -> ReflectionResult<ReconcileOutcome> {
    Ok(ReconcileOutcome {
        reflection_id: record_id(record, operation)?,
        dataset_id: dataset.id.clone(),
        action,
    })
}

//! Typed wrappers over the REST endpoints used by reflection management.
//!
//! # Design
//! - Each wrapper names its operation; transport failures surface as
//!   [`ReflectionError::RemoteCall`] tagged with that operation.
//! - Status strings are validated against their taxonomy before being returned.

use std::sync::Arc;

use dremio_core::{
    JobStatus, ReflectionError, ReflectionRecord, ReflectionRefreshStatus, ReflectionResult,
    StatusTaxonomy,
};
use dremio_telemetry::Metrics;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::remote::{ApiRequest, RemoteClient};

/// Scope of a property statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyLevel {
    /// Cluster-wide.
    System,
    /// Current session only.
    Session,
}

impl PropertyLevel {
    /// Keyword used in `ALTER` statements.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Session => "SESSION",
        }
    }
}

/// Endpoint-level API over a [`RemoteClient`].
#[derive(Clone)]
pub struct DremioApi {
    client: Arc<dyn RemoteClient>,
    metrics: Option<Metrics>,
}

impl std::fmt::Debug for DremioApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DremioApi")
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl DremioApi {
    /// Wrap a transport.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self {
            client,
            metrics: None,
        }
    }

    /// Count every call in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Metrics registry attached to this API, if any.
    #[must_use]
    pub const fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    async fn send(
        &self,
        operation: &'static str,
        request: ApiRequest,
    ) -> Result<Option<Value>, ClientError> {
        debug!(operation, method = request.method.as_str(), endpoint = %request.endpoint, "remote call");
        let result = self.client.send(request).await;
        if let Some(metrics) = &self.metrics {
            metrics.inc_remote_call(operation, result.is_ok());
        }
        result
    }

    async fn call(
        &self,
        operation: &'static str,
        request: ApiRequest,
    ) -> ReflectionResult<Option<Value>> {
        self.send(operation, request)
            .await
            .map_err(|err| ReflectionError::remote(operation, err))
    }

    async fn call_object(
        &self,
        operation: &'static str,
        request: ApiRequest,
    ) -> ReflectionResult<Map<String, Value>> {
        match self.call(operation, request).await? {
            Some(Value::Object(body)) => Ok(body),
            Some(other) => Err(ReflectionError::UnexpectedResponse {
                operation,
                detail: format!("expected a JSON object, got {other}"),
            }),
            None => Err(ReflectionError::UnexpectedResponse {
                operation,
                detail: "response had no body".to_string(),
            }),
        }
    }

    /// `GET catalog/by-path/{path}`; `Ok(None)` when the entity does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] for failures other than 404.
    pub async fn catalog_by_path(
        &self,
        catalog_path: &str,
    ) -> ReflectionResult<Option<Map<String, Value>>> {
        const OPERATION: &str = "catalog.by_path";
        let request = ApiRequest::get(format!("catalog/by-path/{catalog_path}"));
        match self.send(OPERATION, request).await {
            Ok(Some(Value::Object(body))) => Ok(Some(body)),
            Ok(_) => Err(ReflectionError::UnexpectedResponse {
                operation: OPERATION,
                detail: "catalog entry was not a JSON object".to_string(),
            }),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(ReflectionError::remote(OPERATION, err)),
        }
    }

    /// `GET catalog/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn catalog(&self, catalog_id: &str) -> ReflectionResult<Map<String, Value>> {
        self.call_object("catalog.get", ApiRequest::get(format!("catalog/{catalog_id}")))
            .await
    }

    /// `PUT catalog/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn update_catalog(
        &self,
        catalog_id: &str,
        body: Value,
    ) -> ReflectionResult<Option<Value>> {
        self.call(
            "catalog.update",
            ApiRequest::put(format!("catalog/{catalog_id}"), body),
        )
        .await
    }

    /// `POST catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn create_catalog_entity(&self, body: Value) -> ReflectionResult<Option<Value>> {
        self.call("catalog.create", ApiRequest::post("catalog", body))
            .await
    }

    /// `GET dataset/{id}/reflection`, unwrapping the `data` array.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure and
    /// [`ReflectionError::UnexpectedResponse`] for malformed listings.
    pub async fn dataset_reflections(
        &self,
        dataset_id: &str,
    ) -> ReflectionResult<Vec<ReflectionRecord>> {
        const OPERATION: &str = "dataset.reflections";
        let mut body = self
            .call_object(
                OPERATION,
                ApiRequest::get(format!("dataset/{dataset_id}/reflection")),
            )
            .await?;
        match body.remove("data") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(ReflectionRecord(map)),
                    other => Err(ReflectionError::UnexpectedResponse {
                        operation: OPERATION,
                        detail: format!("reflection entry was not an object: {other}"),
                    }),
                })
                .collect(),
            Some(other) => Err(ReflectionError::UnexpectedResponse {
                operation: OPERATION,
                detail: format!("'data' was not an array: {other}"),
            }),
        }
    }

    /// `GET reflection/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn reflection(&self, reflection_id: &str) -> ReflectionResult<ReflectionRecord> {
        self.call_object(
            "reflection.get",
            ApiRequest::get(format!("reflection/{reflection_id}")),
        )
        .await
        .map(ReflectionRecord)
    }

    /// `POST reflection`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn create_reflection(
        &self,
        body: Map<String, Value>,
    ) -> ReflectionResult<ReflectionRecord> {
        self.call_object(
            "reflection.create",
            ApiRequest::post("reflection", Value::Object(body)),
        )
        .await
        .map(ReflectionRecord)
    }

    /// `PUT reflection/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn update_reflection(
        &self,
        reflection_id: &str,
        body: Map<String, Value>,
    ) -> ReflectionResult<ReflectionRecord> {
        self.call_object(
            "reflection.update",
            ApiRequest::put(format!("reflection/{reflection_id}"), Value::Object(body)),
        )
        .await
        .map(ReflectionRecord)
    }

    /// `POST catalog/{id}/refresh`: refresh every reflection on the dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn trigger_reflection_refresh(&self, dataset_id: &str) -> ReflectionResult<()> {
        self.call(
            "reflection.refresh",
            ApiRequest::post(format!("catalog/{dataset_id}/refresh"), json!({})),
        )
        .await
        .map(|_| ())
    }

    /// `POST sql` with an optional context path.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn execute_sql(
        &self,
        sql: &str,
        context: Option<&[String]>,
    ) -> ReflectionResult<Option<Value>> {
        info!(sql, "executing SQL statement");
        let mut body = Map::new();
        body.insert("sql".to_string(), Value::String(sql.to_string()));
        if let Some(context) = context.filter(|context| !context.is_empty()) {
            body.insert("context".to_string(), json!(context));
        }
        self.call("sql.execute", ApiRequest::post("sql", Value::Object(body)))
            .await
    }

    /// Submit `ALTER TABLE {table} REFRESH METADATA`; returns the job id.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn refresh_table_metadata(
        &self,
        table: &str,
        context: Option<&[String]>,
    ) -> ReflectionResult<Option<String>> {
        let response = self
            .execute_sql(&format!("ALTER TABLE {table} REFRESH METADATA"), context)
            .await?;
        let job_id = response
            .as_ref()
            .and_then(|body| body.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        info!(table, job_id = job_id.as_deref().unwrap_or("<none>"), "metadata refresh submitted");
        Ok(job_id)
    }

    /// `ALTER {level} SET {name} = {value}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn set_property(
        &self,
        name: &str,
        value: &str,
        level: PropertyLevel,
    ) -> ReflectionResult<Option<Value>> {
        self.execute_sql(&format!("ALTER {} SET {name} = {value}", level.as_str()), None)
            .await
    }

    /// `ALTER {level} RESET {name}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn unset_property(
        &self,
        name: &str,
        level: PropertyLevel,
    ) -> ReflectionResult<Option<Value>> {
        self.execute_sql(&format!("ALTER {} RESET {name}", level.as_str()), None)
            .await
    }

    /// `GET job/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn job(&self, job_id: &str) -> ReflectionResult<Map<String, Value>> {
        self.call_object("job.get", ApiRequest::get(format!("job/{job_id}")))
            .await
    }

    /// `GET job/{id}` with `jobState` validated against [`JobStatus`].
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::InvalidStatus`] for unknown states.
    pub async fn job_status(
        &self,
        job_id: &str,
    ) -> ReflectionResult<(JobStatus, Map<String, Value>)> {
        let job = self.job(job_id).await?;
        let raw = job
            .get("jobState")
            .and_then(Value::as_str)
            .ok_or_else(|| ReflectionError::UnexpectedResponse {
                operation: "job.get",
                detail: format!("job {job_id} has no jobState"),
            })?;
        let status = JobStatus::parse(raw)?;
        Ok((status, job))
    }

    /// `GET job/{id}/results`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn job_results(&self, job_id: &str) -> ReflectionResult<Value> {
        self.call("job.results", ApiRequest::get(format!("job/{job_id}/results")))
            .await
            .map(Option::unwrap_or_default)
    }

    /// Current `status.combinedStatus` of a reflection.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::InvalidStatus`] for unknown states and
    /// [`ReflectionError::UnexpectedResponse`] when the status is absent.
    pub async fn reflection_status(
        &self,
        reflection_id: &str,
    ) -> ReflectionResult<ReflectionRefreshStatus> {
        let record = self.reflection(reflection_id).await?;
        let raw = record
            .combined_status()
            .ok_or_else(|| ReflectionError::UnexpectedResponse {
                operation: "reflection.get",
                detail: format!("reflection {reflection_id} has no combinedStatus"),
            })?;
        let status = ReflectionRefreshStatus::parse(raw)?;
        info!(reflection_id, %status, "reflection refresh status");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::http::HttpRemoteClient;
    use anyhow::Result;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn api(server: &MockServer) -> Result<DremioApi> {
        let client = HttpRemoteClient::new(
            &server.base_url(),
            "api/v3",
            Credentials::Pat("pat".into()),
            Duration::from_secs(5),
        )?;
        Ok(DremioApi::new(Arc::new(client)))
    }

    #[tokio::test]
    async fn catalog_lookup_maps_missing_entities_to_none() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/catalog/by-path/source/missing");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/catalog/by-path/source/broken");
            then.status(500).body("boom");
        });

        let api = api(&server)?;
        assert!(api.catalog_by_path("source/missing").await?.is_none());
        let err = api.catalog_by_path("source/broken").await.err();
        assert!(matches!(
            err,
            Some(ReflectionError::RemoteCall { operation: "catalog.by_path", .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn property_statements_use_level_keyword() -> Result<()> {
        let server = MockServer::start_async().await;
        let set = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v3/sql")
                .json_body(json!({"sql": "ALTER SYSTEM SET planner.slice_target = 10"}));
            then.status(200).json_body(json!({"id": "job-1"}));
        });
        let reset = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v3/sql")
                .json_body(json!({"sql": "ALTER SESSION RESET planner.slice_target"}));
            then.status(200).json_body(json!({"id": "job-2"}));
        });

        let api = api(&server)?;
        api.set_property("planner.slice_target", "10", PropertyLevel::System)
            .await?;
        api.unset_property("planner.slice_target", PropertyLevel::Session)
            .await?;
        set.assert();
        reset.assert();
        Ok(())
    }

    #[tokio::test]
    async fn metadata_refresh_returns_job_id() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/v3/sql").json_body(json!({
                "sql": "ALTER TABLE source.schema.table REFRESH METADATA",
                "context": ["source"]
            }));
            then.status(200).json_body(json!({"id": "job-7"}));
        });

        let api = api(&server)?;
        let context = vec!["source".to_string()];
        let job_id = api
            .refresh_table_metadata("source.schema.table", Some(&context))
            .await?;
        assert_eq!(job_id.as_deref(), Some("job-7"));
        Ok(())
    }

    #[tokio::test]
    async fn reflection_status_is_validated() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/reflection/r-1");
            then.status(200)
                .json_body(json!({"id": "r-1", "status": {"combinedStatus": "REFRESHING"}}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/reflection/r-2");
            then.status(200)
                .json_body(json!({"id": "r-2", "status": {"combinedStatus": "MELTING"}}));
        });

        let api = api(&server)?;
        assert_eq!(
            api.reflection_status("r-1").await?,
            ReflectionRefreshStatus::Refreshing
        );
        assert!(matches!(
            api.reflection_status("r-2").await,
            Err(ReflectionError::InvalidStatus { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn dataset_reflections_unwrap_data_and_count_calls() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/dataset/ds-1/reflection");
            then.status(200).json_body(json!({
                "data": [{"id": "r-1", "name": "raw_reflection"}, {"id": "r-2", "name": "agg"}]
            }));
        });

        let metrics = Metrics::new()?;
        let api = api(&server)?.with_metrics(metrics.clone());
        let reflections = api.dataset_reflections("ds-1").await?;
        let names: Vec<_> = reflections.iter().filter_map(ReflectionRecord::name).collect();
        assert_eq!(names, vec!["raw_reflection", "agg"]);
        assert_eq!(metrics.snapshot().remote_call_failures_total, 0);
        assert!(metrics.render()?.contains("dataset.reflections"));
        Ok(())
    }
}

//! Dataset resolution through the remote catalog.

use dremio_core::{Dataset, ReflectionError, ReflectionRecord, ReflectionResult};
use serde_json::Value;
use tracing::debug;

use crate::api::DremioApi;

/// Catalog lookup path for a dot-delimited source path.
///
/// Each segment is percent-encoded and the segments are joined with `/`.
#[must_use]
pub fn catalog_path(source_path: &str) -> String {
    source_path
        .split('.')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolves source paths to datasets and lists their reflections.
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    api: DremioApi,
}

impl CatalogResolver {
    /// Resolver backed by `api`.
    #[must_use]
    pub const fn new(api: DremioApi) -> Self {
        Self { api }
    }

    /// Resolve a dotted source path to a dataset snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::NotFound`] when the catalog has no such entity,
    /// [`ReflectionError::UnexpectedResponse`] when the entity is not a dataset,
    /// and [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn resolve(&self, source_path: &str) -> ReflectionResult<Dataset> {
        let lookup = catalog_path(source_path);
        debug!(source_path, lookup = %lookup, "resolving dataset");
        let entry = self
            .api
            .catalog_by_path(&lookup)
            .await?
            .ok_or_else(|| ReflectionError::NotFound {
                path: source_path.to_string(),
            })?;
        serde_json::from_value(Value::Object(entry)).map_err(|err| {
            ReflectionError::UnexpectedResponse {
                operation: "catalog.by_path",
                detail: format!("'{source_path}' is not a dataset: {err}"),
            }
        })
    }

    /// Reflections attached to a dataset, in remote order.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectionError::RemoteCall`] on transport failure.
    pub async fn list_reflections(&self, dataset_id: &str) -> ReflectionResult<Vec<ReflectionRecord>> {
        self.api.dataset_reflections(dataset_id).await
    }

    /// Resolve `source_path` and list its reflections.
    ///
    /// # Errors
    ///
    /// See [`CatalogResolver::resolve`] and [`CatalogResolver::list_reflections`].
    pub async fn reflections_for_source(
        &self,
        source_path: &str,
    ) -> ReflectionResult<Vec<ReflectionRecord>> {
        let dataset = self.resolve(source_path).await?;
        self.list_reflections(&dataset.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::http::HttpRemoteClient;
    use anyhow::Result;
    use dremio_core::DatasetType;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver(server: &MockServer) -> Result<CatalogResolver> {
        let client = HttpRemoteClient::new(
            &server.base_url(),
            "api/v3",
            Credentials::Anonymous,
            Duration::from_secs(5),
        )?;
        Ok(CatalogResolver::new(DremioApi::new(Arc::new(client))))
    }

    #[test]
    fn catalog_path_joins_encoded_segments() {
        assert_eq!(catalog_path("source.schema.table"), "source/schema/table");
        assert_eq!(catalog_path("my space.sales data"), "my%20space/sales%20data");
    }

    #[tokio::test]
    async fn resolves_dataset_with_fields() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v3/catalog/by-path/source/schema/table");
            then.status(200).json_body(json!({
                "entityType": "dataset",
                "id": "ds-1",
                "type": "PHYSICAL_DATASET",
                "path": ["source", "schema", "table"],
                "fields": [{"name": "a", "type": {"name": "VARCHAR"}}, {"name": "b", "type": {"name": "BIGINT"}}]
            }));
        });

        let dataset = resolver(&server)?.resolve("source.schema.table").await?;
        assert_eq!(dataset.id, "ds-1");
        assert_eq!(dataset.dataset_type, DatasetType::Physical);
        assert_eq!(dataset.field_names(), vec!["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_path_is_not_found() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/catalog/by-path/source/nope");
            then.status(404);
        });

        let result = resolver(&server)?.resolve("source.nope").await;
        assert!(matches!(
            result,
            Err(ReflectionError::NotFound { path }) if path == "source.nope"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn folders_are_not_datasets() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v3/catalog/by-path/source");
            then.status(200)
                .json_body(json!({"entityType": "source", "id": "src-1", "children": []}));
        });

        let result = resolver(&server)?.resolve("source").await;
        assert!(matches!(result, Err(ReflectionError::UnexpectedResponse { .. })));
        Ok(())
    }
}

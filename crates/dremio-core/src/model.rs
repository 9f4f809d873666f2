//! Catalog and reflection DTOs exchanged with the remote service.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReflectionError;

/// Catalog classification of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetType {
    /// Table backed by a physical source.
    #[serde(rename = "PHYSICAL_DATASET")]
    Physical,
    /// View defined by SQL over other datasets.
    #[serde(rename = "VIRTUAL_DATASET")]
    Virtual,
}

impl DatasetType {
    /// Wire representation used by the catalog API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "PHYSICAL_DATASET",
            Self::Virtual => "VIRTUAL_DATASET",
        }
    }
}

/// Column of a dataset as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetField {
    /// Column name.
    pub name: String,
    /// Remote type descriptor, kept opaque.
    #[serde(rename = "type", default)]
    pub data_type: Value,
}

/// Snapshot of a dataset resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Catalog identifier.
    pub id: String,
    /// Physical or virtual.
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    /// Ordered path segments.
    #[serde(default)]
    pub path: Vec<String>,
    /// Column list.
    #[serde(default)]
    pub fields: Vec<DatasetField>,
}

impl Dataset {
    /// Names of every column in catalog order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }
}

/// Reflection flavour.
///
/// Decoding ignores case; encoding always uses the upper-case wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ReflectionType {
    /// Row-level materialization.
    #[serde(rename = "RAW")]
    Raw,
    /// Pre-aggregated materialization.
    #[serde(rename = "AGGREGATION")]
    Aggregation,
}

impl FromStr for ReflectionType {
    type Err = ReflectionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RAW" => Ok(Self::Raw),
            "AGGREGATION" => Ok(Self::Aggregation),
            _ => Err(ReflectionError::validation("type", "must be RAW or AGGREGATION")),
        }
    }
}

impl TryFrom<String> for ReflectionType {
    type Error = ReflectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Reference to a dataset column inside a reflection definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Column name.
    pub name: String,
}

impl FieldRef {
    /// Construct a reference to the named column.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Desired reflection definition supplied by the caller.
///
/// Name and type are optional at the type level so that incomplete requests
/// can be rejected with a validation error instead of a decode error. Any
/// member not modelled explicitly (dimension, measure, partition fields, ...)
/// is carried verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionSpec {
    /// Natural key of the reflection within its dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw or aggregation.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub reflection_type: Option<ReflectionType>,
    /// Whether the reflection is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Columns materialized by a raw reflection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_fields: Option<Vec<FieldRef>>,
    /// Owning dataset; filled from the resolved catalog entry when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    /// Additional members passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReflectionSpec {
    /// Start a spec with the mandatory members set.
    #[must_use]
    pub fn new(name: impl Into<String>, reflection_type: ReflectionType) -> Self {
        Self {
            name: Some(name.into()),
            reflection_type: Some(reflection_type),
            ..Self::default()
        }
    }

    /// Whether the caller supplied at least one display field.
    #[must_use]
    pub fn has_display_fields(&self) -> bool {
        self.display_fields
            .as_ref()
            .is_some_and(|fields| !fields.is_empty())
    }

    /// JSON object form of the spec, omitting unset members.
    #[must_use]
    pub fn to_body(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(body)) => body,
            _ => Map::new(),
        }
    }
}

/// Reflection as returned by the remote system, server-only members included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReflectionRecord(pub Map<String, Value>);

impl ReflectionRecord {
    /// Remote identifier.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Reflection name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Raw `status.combinedStatus` value, when present.
    #[must_use]
    pub fn combined_status(&self) -> Option<&str> {
        self.0
            .get("status")
            .and_then(|status| status.get("combinedStatus"))
            .and_then(Value::as_str)
    }

    /// Borrow the underlying JSON members.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Refresh policy flavour applied to a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RefreshPolicyType {
    /// Never refresh automatically.
    #[default]
    Never,
    /// Refresh every `refresh_period_ms`.
    Period,
    /// Refresh on `refresh_schedule`.
    Schedule,
}

/// How refreshes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RefreshMethod {
    /// Let the remote system decide.
    #[default]
    Auto,
    /// Always rebuild.
    Full,
    /// Append only new data.
    Incremental,
}

/// Acceleration refresh policy of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPolicy {
    /// Active policy flavour.
    pub active_policy_type: RefreshPolicyType,
    /// Interval between periodic refreshes.
    pub refresh_period_ms: u64,
    /// Cron-like schedule used by `SCHEDULE` policies.
    pub refresh_schedule: String,
    /// How long a materialization stays usable after expiry.
    pub grace_period_ms: u64,
    /// Refresh computation method.
    pub method: RefreshMethod,
    /// Materializations never expire.
    pub never_expire: bool,
    /// Disable automatic refresh.
    pub never_refresh: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            active_policy_type: RefreshPolicyType::Never,
            refresh_period_ms: 3_600_000,
            refresh_schedule: "0 0 8 * * ?".to_string(),
            grace_period_ms: 0,
            method: RefreshMethod::Auto,
            never_expire: true,
            never_refresh: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dataset_decodes_catalog_payload() -> anyhow::Result<()> {
        let dataset: Dataset = serde_json::from_value(json!({
            "entityType": "dataset",
            "id": "ds-1",
            "type": "PHYSICAL_DATASET",
            "path": ["source", "schema", "table"],
            "fields": [
                {"name": "a", "type": {"name": "VARCHAR"}},
                {"name": "b", "type": {"name": "BIGINT"}}
            ]
        }))?;
        assert_eq!(dataset.dataset_type, DatasetType::Physical);
        assert_eq!(dataset.field_names(), vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn reflection_spec_round_trips_unknown_members() -> anyhow::Result<()> {
        let spec: ReflectionSpec = serde_json::from_value(json!({
            "name": "agg",
            "type": "aggregation",
            "dimensionFields": [{"name": "region"}],
            "arrowCachingEnabled": false
        }))?;
        assert_eq!(spec.reflection_type, Some(ReflectionType::Aggregation));
        assert!(!spec.has_display_fields());

        let body = spec.to_body();
        assert_eq!(body.get("type"), Some(&json!("AGGREGATION")));
        assert_eq!(body.get("dimensionFields"), Some(&json!([{"name": "region"}])));
        assert!(!body.contains_key("enabled"));
        assert!(!body.contains_key("displayFields"));
        Ok(())
    }

    #[test]
    fn reflection_type_decodes_any_casing() -> anyhow::Result<()> {
        for raw in ["RAW", "raw", "Raw", "rAw"] {
            let decoded: ReflectionType = serde_json::from_value(json!(raw))?;
            assert_eq!(decoded, ReflectionType::Raw);
        }
        let decoded: ReflectionType = serde_json::from_value(json!("aggREGATION"))?;
        assert_eq!(decoded, ReflectionType::Aggregation);
        assert_eq!(serde_json::to_value(ReflectionType::Raw)?, json!("RAW"));
        assert!(serde_json::from_value::<ReflectionType>(json!("columnar")).is_err());
        assert!(matches!(
            "columnar".parse::<ReflectionType>(),
            Err(ReflectionError::Validation { field: "type", .. })
        ));
        Ok(())
    }

    #[test]
    fn empty_display_fields_count_as_missing() {
        let mut spec = ReflectionSpec::new("raw", ReflectionType::Raw);
        spec.display_fields = Some(Vec::new());
        assert!(!spec.has_display_fields());
        spec.display_fields = Some(vec![FieldRef::new("a")]);
        assert!(spec.has_display_fields());
    }

    #[test]
    fn reflection_record_exposes_server_members() -> anyhow::Result<()> {
        let record: ReflectionRecord = serde_json::from_value(json!({
            "id": "r-1",
            "name": "raw_reflection",
            "status": {"combinedStatus": "REFRESHING"}
        }))?;
        assert_eq!(record.id(), Some("r-1"));
        assert_eq!(record.name(), Some("raw_reflection"));
        assert_eq!(record.combined_status(), Some("REFRESHING"));
        Ok(())
    }

    #[test]
    fn default_refresh_policy_never_expires() -> anyhow::Result<()> {
        let value = serde_json::to_value(RefreshPolicy::default())?;
        assert_eq!(
            value,
            json!({
                "activePolicyType": "NEVER",
                "refreshPeriodMs": 3_600_000,
                "refreshSchedule": "0 0 8 * * ?",
                "gracePeriodMs": 0,
                "method": "AUTO",
                "neverExpire": true,
                "neverRefresh": true
            })
        );
        Ok(())
    }
}

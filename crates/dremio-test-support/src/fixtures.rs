//! Catalog and reflection payloads as returned by the remote service.

use serde_json::{Value, json};

/// Catalog entry for a dataset with the given columns.
#[must_use]
pub fn dataset_json(id: &str, dataset_type: &str, source_path: &str, fields: &[&str]) -> Value {
    let path: Vec<&str> = source_path.split('.').collect();
    let fields: Vec<Value> = fields
        .iter()
        .map(|name| json!({"name": name, "type": {"name": "VARCHAR"}}))
        .collect();
    json!({
        "entityType": "dataset",
        "id": id,
        "type": dataset_type,
        "path": path,
        "tag": "0",
        "fields": fields,
    })
}

/// Physical dataset `source.schema.table` (id `ds-1`) with columns `a` and `b`.
#[must_use]
pub fn physical_dataset() -> Value {
    dataset_json("ds-1", "PHYSICAL_DATASET", "source.schema.table", &["a", "b"])
}

/// Virtual dataset `space.view` (id `vds-1`) with column `a`.
#[must_use]
pub fn virtual_dataset() -> Value {
    dataset_json("vds-1", "VIRTUAL_DATASET", "space.view", &["a"])
}

/// Reflection as returned by `GET reflection/{id}`, server-only members included.
#[must_use]
pub fn reflection_json(id: &str, name: &str, display_fields: &[&str], status: &str) -> Value {
    let fields: Vec<Value> = display_fields
        .iter()
        .map(|name| json!({"name": name}))
        .collect();
    json!({
        "entityType": "reflection",
        "id": id,
        "tag": "tag-1",
        "name": name,
        "type": "RAW",
        "enabled": true,
        "datasetId": "ds-1",
        "displayFields": fields,
        "createdAt": "2024-01-01T00:00:00.000Z",
        "updatedAt": "2024-01-01T00:00:00.000Z",
        "currentSizeBytes": 1024,
        "totalSizeBytes": 2048,
        "status": {
            "config": "OK",
            "refresh": "SCHEDULED",
            "availability": "AVAILABLE",
            "combinedStatus": status,
            "failureCount": 0,
        },
    })
}

/// Body of `GET dataset/{id}/reflection`.
#[must_use]
pub fn reflection_listing(reflections: Vec<Value>) -> Value {
    json!({ "data": reflections })
}

/// Minimal reflection payload carrying only a combined status.
#[must_use]
pub fn reflection_status(id: &str, status: &str) -> Value {
    json!({"id": id, "status": {"combinedStatus": status}})
}

/// Body of `GET job/{id}`.
#[must_use]
pub fn job_json(id: &str, state: &str, error_message: Option<&str>) -> Value {
    let mut job = json!({"id": id, "jobState": state, "rowCount": 0});
    if let (Some(message), Some(map)) = (error_message, job.as_object_mut()) {
        map.insert("errorMessage".to_string(), Value::String(message.to_string()));
    }
    job
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_carry_expected_members() {
        let dataset = physical_dataset();
        assert_eq!(dataset["path"], json!(["source", "schema", "table"]));
        assert_eq!(dataset["fields"][1]["name"], json!("b"));

        let reflection = reflection_json("r-1", "raw_reflection", &["b", "a"], "CAN_ACCELERATE");
        assert_eq!(reflection["status"]["combinedStatus"], json!("CAN_ACCELERATE"));
        assert_eq!(reflection["displayFields"][0]["name"], json!("b"));

        assert_eq!(job_json("j", "FAILED", Some("boom"))["errorMessage"], json!("boom"));
        assert!(job_json("j", "COMPLETED", None).get("errorMessage").is_none());
    }
}

//! Comparison of a desired reflection definition against the remote one.
//!
//! # Design
//! - Server-managed members are stripped before comparing.
//! - List members are compared order-insensitively (sorted by element `name`).
//! - A member only counts as changed when the existing side already defines it
//!   with a non-empty value; members the remote spec lacks are never reported.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Members managed by the remote system and excluded from comparison.
pub const COMPARISON_EXCLUDED_FIELDS: [&str; 9] = [
    "id",
    "status",
    "currentSizeBytes",
    "totalSizeBytes",
    "createdAt",
    "updatedAt",
    "entityType",
    "datasetId",
    "tag",
];

/// Members removed from an existing reflection before it is sent back as an update.
///
/// `id`, `tag` and `datasetId` stay so the remote concurrency check can run.
pub const UPDATE_EXCLUDED_FIELDS: [&str; 5] = [
    "status",
    "currentSizeBytes",
    "totalSizeBytes",
    "createdAt",
    "updatedAt",
];

/// Changed member name mapped to its desired value.
pub type SpecDiff = Map<String, Value>;

/// Copy of `spec` without the listed members.
#[must_use]
pub fn strip_fields(spec: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    spec.iter()
        .filter(|(key, _)| !fields.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// JSON truthiness: `null`, `false`, zero and empty strings/lists/objects are undefined.
#[must_use]
pub fn is_defined(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => !members.is_empty(),
    }
}

/// Members of `desired` whose value differs from the defined value in `existing_raw`.
///
/// An empty result means the reflection needs a refresh, not an update.
#[must_use]
pub fn diff(desired: &Map<String, Value>, existing_raw: &Map<String, Value>) -> SpecDiff {
    let existing = strip_fields(existing_raw, &COMPARISON_EXCLUDED_FIELDS);
    let mut changes = SpecDiff::new();

    for (key, desired_value) in desired {
        let current = existing.get(key).cloned().unwrap_or(Value::Null);
        let (wanted, current) = match desired_value {
            Value::Array(items) => (Value::Array(sorted_by_name(items)), sort_if_list(current)),
            other => (other.clone(), current),
        };

        if wanted != current && is_defined(&current) {
            changes.insert(key.clone(), wanted);
        }
    }

    changes
}

/// Existing reflection with server bookkeeping removed and `changes` applied on top.
#[must_use]
pub fn merge_update(existing: &Map<String, Value>, changes: &SpecDiff) -> Map<String, Value> {
    let mut body = strip_fields(existing, &UPDATE_EXCLUDED_FIELDS);
    for (key, value) in changes {
        body.insert(key.clone(), value.clone());
    }
    body
}

fn sort_if_list(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(sorted_by_name(&items)),
        other => other,
    }
}

fn sorted_by_name(items: &[Value]) -> Vec<Value> {
    let mut sorted = items.to_vec();
    sorted.sort_by(compare_by_name);
    sorted
}

fn compare_by_name(left: &Value, right: &Value) -> Ordering {
    match (element_name(left), element_name(right)) {
        (Some(left), Some(right)) => left.cmp(right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.to_string().cmp(&right.to_string()),
    }
}

fn element_name(item: &Value) -> Option<&str> {
    item.get("name").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn existing() -> Map<String, Value> {
        object(json!({
            "id": "r-1",
            "tag": "v7",
            "type": "RAW",
            "name": "raw_reflection",
            "datasetId": "ds-1",
            "entityType": "reflection",
            "enabled": true,
            "status": {"combinedStatus": "CAN_ACCELERATE"},
            "currentSizeBytes": 10,
            "totalSizeBytes": 20,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "displayFields": [{"name": "b"}, {"name": "a"}]
        }))
    }

    #[test]
    fn identical_specs_have_no_changes() {
        let desired = strip_fields(&existing(), &COMPARISON_EXCLUDED_FIELDS);
        assert!(diff(&desired, &existing()).is_empty());
    }

    #[test]
    fn list_order_is_ignored() {
        let desired = object(json!({
            "name": "raw_reflection",
            "type": "RAW",
            "displayFields": [{"name": "a"}, {"name": "b"}]
        }));
        assert!(diff(&desired, &existing()).is_empty());
    }

    #[test]
    fn changed_list_reports_sorted_desired_value() {
        let desired = object(json!({
            "displayFields": [{"name": "c"}, {"name": "a"}]
        }));
        let changes = diff(&desired, &existing());
        assert_eq!(
            changes.get("displayFields"),
            Some(&json!([{"name": "a"}, {"name": "c"}]))
        );
    }

    #[test]
    fn members_missing_on_existing_side_are_not_changes() {
        let desired = object(json!({
            "name": "raw_reflection",
            "partitionFields": [{"name": "a"}],
            "arrowCachingEnabled": true
        }));
        assert!(diff(&desired, &existing()).is_empty());
    }

    #[test]
    fn falsy_existing_values_are_not_changes() {
        let mut current = existing();
        current.insert("enabled".into(), json!(false));
        current.insert("distributionFields".into(), json!([]));
        let desired = object(json!({
            "enabled": true,
            "distributionFields": [{"name": "a"}]
        }));
        assert!(diff(&desired, &current).is_empty());
    }

    #[test]
    fn server_only_members_never_register() {
        let desired = object(json!({
            "datasetId": "ds-other",
            "tag": "v1",
            "id": "r-2",
            "entityType": "reflection"
        }));
        assert!(diff(&desired, &existing()).is_empty());
    }

    #[test]
    fn scalar_changes_are_reported() {
        let desired = object(json!({"type": "AGGREGATION", "name": "raw_reflection"}));
        let changes = diff(&desired, &existing());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("type"), Some(&json!("AGGREGATION")));
    }

    #[test]
    fn merge_update_keeps_identity_and_drops_bookkeeping() {
        let changes = object(json!({"displayFields": [{"name": "a"}]}));
        let body = merge_update(&existing(), &changes);
        assert_eq!(body.get("id"), Some(&json!("r-1")));
        assert_eq!(body.get("tag"), Some(&json!("v7")));
        assert_eq!(body.get("displayFields"), Some(&json!([{"name": "a"}])));
        for key in UPDATE_EXCLUDED_FIELDS {
            assert!(!body.contains_key(key), "{key} should be stripped");
        }
    }

    #[test]
    fn truthiness_matches_json_semantics() {
        assert!(!is_defined(&Value::Null));
        assert!(!is_defined(&json!(0)));
        assert!(!is_defined(&json!("")));
        assert!(!is_defined(&json!({})));
        assert!(is_defined(&json!(0.5)));
        assert!(is_defined(&json!({"a": 1})));
    }
}

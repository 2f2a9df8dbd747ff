//! Schema drift detection.
//!
//! A definition's declared output schema is advisory: runs are persisted
//! regardless of shape, and drift is a warning flag, not an error. The
//! comparison is best-effort and structural — declared top-level field
//! set vs. the output object's actual keys.

use std::collections::BTreeSet;

use serde_json::Value;

/// Extract the declared top-level field set from a schema.
///
/// Understands three shapes:
/// - JSON-Schema style: `{"properties": {"title": ..., "price": ...}}`
/// - the generation service's envelope: `{"entities": {"product":
///   {"fields": {"title": ..., "price": ...}}}}` (union across entities)
/// - a bare field map: `{"title": ..., "price": ...}`
///
/// Returns `None` when the schema is not a JSON object (nothing usable
/// to compare against).
pub fn expected_fields(schema: &Value) -> Option<BTreeSet<String>> {
    let obj = schema.as_object()?;

    if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
        return Some(properties.keys().cloned().collect());
    }

    if let Some(entities) = obj.get("entities").and_then(Value::as_object) {
        let fields = entities
            .values()
            .filter_map(|entity| entity.get("fields").and_then(Value::as_object))
            .flat_map(|fields| fields.keys().cloned())
            .collect();
        return Some(fields);
    }

    Some(obj.keys().cloned().collect())
}

/// Whether `output` drifted from the declared `schema`.
///
/// Drift means an expected field is missing from the output's top-level
/// keys (or the output is not an object at all). Extra fields are
/// tolerated — schemas describe what was promised, not an exhaustive
/// contract.
pub fn drift_against(schema: &Value, output: &Value) -> bool {
    let Some(expected) = expected_fields(schema) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }

    match output.as_object() {
        Some(actual) => expected.iter().any(|field| !actual.contains_key(field)),
        None => true,
    }
}

//! Flattens MyJKKN responses into rows whose values are all scalars.
//!
//! The API embeds relations as nested objects (`{"department": {"id": 3,
//! "department_name": "CSE"}}`); display code wants `"department": "CSE"`. Each
//! nested object is reduced to one representative string, in priority order:
//!
//! 1. `metadata` objects are kept verbatim (pagination info).
//! 2. Field-specific rules for `status`, `employee_id` and `date_of_joining`.
//! 3. Known relation shapes: `{first_name, last_name}` and the `*_name` fields.
//! 4. Generic fallback fields: `name`, `title`, `label`, `description`, `code`, `value`.
//! 5. Otherwise `"N/A"` in [`NormalizeMode::Lenient`], or
//!    [`ApiError::UnrecognizedShape`] in [`NormalizeMode::Strict`].
//!
//! After flattening, each record gains `status` (from `is_active`), `employee_id`
//! (from `staff_id`) and `name` (from `first_name` + `last_name`) when missing.

use super::error::{ApiError, ApiResult};
use serde_json::{Map, Value};
use tracing::warn;

/// Placeholder emitted for nested objects with no recognisable display field.
pub const NOT_AVAILABLE: &str = "N/A";

const STATUS_FIELDS: &[&str] = &["status", "is_active", "active", "state", "value"];
const EMPLOYEE_ID_FIELDS: &[&str] = &["employee_id", "staff_id", "code", "value", "id"];
const DATE_FIELDS: &[&str] = &["date_of_joining", "date", "value"];
const RELATION_NAME_FIELDS: &[&str] = &[
    "department_name",
    "institution_name",
    "program_name",
    "degree_name",
    "designation_name",
    "course_name",
    "section_name",
    "name",
];
const FALLBACK_FIELDS: &[&str] = &["name", "title", "label", "description", "code", "value"];

/// What to do with a nested object that matches no known shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
    /// Substitute `"N/A"` and log a warning
    #[default]
    Lenient,
    /// Fail with [`ApiError::UnrecognizedShape`]
    Strict,
}

/// Normalises a whole response body.
///
/// Arrays are treated as lists of records, objects with a `data` key as
/// pagination envelopes, and any other object as a single record.
pub fn normalize_document(value: Value, mode: NormalizeMode) -> ApiResult<Value> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => normalize_record(map, mode).map(Value::Object),
                other => normalize_field("", other, mode),
            })
            .collect::<ApiResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) if map.contains_key("data") => normalize_envelope(map, mode),
        Value::Object(map) => normalize_record(map, mode).map(Value::Object),
        other => Ok(other),
    }
}

fn normalize_envelope(map: Map<String, Value>, mode: NormalizeMode) -> ApiResult<Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let normalized = match key.as_str() {
            "data" => normalize_document(value, mode)?,
            _ => normalize_field(&key, value, mode)?,
        };
        out.insert(key, normalized);
    }
    Ok(Value::Object(out))
}

/// Flattens one record and fills in the derived convenience fields.
pub fn normalize_record(
    map: Map<String, Value>,
    mode: NormalizeMode,
) -> ApiResult<Map<String, Value>> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let normalized = normalize_field(&key, value, mode)?;
        out.insert(key, normalized);
    }
    derive_convenience_fields(&mut out);
    Ok(out)
}

fn normalize_field(key: &str, value: Value, mode: NormalizeMode) -> ApiResult<Value> {
    match value {
        Value::Object(obj) => collapse_object(key, obj, mode),
        Value::Array(items) => items
            .into_iter()
            .map(|item| normalize_field(key, item, mode))
            .collect::<ApiResult<Vec<_>>>()
            .map(Value::Array),
        scalar => Ok(scalar),
    }
}

fn collapse_object(key: &str, obj: Map<String, Value>, mode: NormalizeMode) -> ApiResult<Value> {
    if key == "metadata" {
        return Ok(Value::Object(obj));
    }

    let special = match key {
        "status" => status_text(&obj),
        "employee_id" => first_text(&obj, EMPLOYEE_ID_FIELDS),
        "date_of_joining" => first_text(&obj, DATE_FIELDS),
        _ => None,
    };

    let collapsed = special
        .or_else(|| relation_text(&obj))
        .or_else(|| first_text(&obj, FALLBACK_FIELDS));

    match (collapsed, mode) {
        (Some(text), _) => Ok(Value::String(text)),
        (None, NormalizeMode::Lenient) => {
            warn!(
                field = key,
                keys = ?obj.keys().collect::<Vec<_>>(),
                "Unrecognised nested shape, substituting N/A"
            );
            Ok(Value::String(NOT_AVAILABLE.to_string()))
        }
        (None, NormalizeMode::Strict) => Err(ApiError::UnrecognizedShape {
            field: key.to_string(),
        }),
    }
}

fn status_text(obj: &Map<String, Value>) -> Option<String> {
    STATUS_FIELDS.iter().find_map(|field| match obj.get(*field)? {
        Value::Bool(active) => Some(active_label(*active).to_string()),
        other => scalar_text(other),
    })
}

fn relation_text(obj: &Map<String, Value>) -> Option<String> {
    full_name(obj).or_else(|| first_text(obj, RELATION_NAME_FIELDS))
}

fn full_name(obj: &Map<String, Value>) -> Option<String> {
    let first = obj.get("first_name").and_then(scalar_text)?;
    let name = match obj.get("last_name").and_then(scalar_text) {
        Some(last) => format!("{first} {last}"),
        None => first,
    };
    Some(name)
}

fn first_text(obj: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| obj.get(*field).and_then(scalar_text))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

const fn active_label(active: bool) -> &'static str {
    if active { "active" } else { "inactive" }
}

fn is_missing(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).is_none_or(Value::is_null)
}

fn derive_convenience_fields(record: &mut Map<String, Value>) {
    if is_missing(record, "status") {
        if let Some(Value::Bool(active)) = record.get("is_active") {
            let status = active_label(*active);
            record.insert("status".to_string(), Value::String(status.to_string()));
        }
    }

    if is_missing(record, "employee_id") {
        if let Some(staff_id) = record.get("staff_id").filter(|v| !v.is_null()).cloned() {
            record.insert("employee_id".to_string(), staff_id);
        }
    }

    if is_missing(record, "name") {
        if let Some(name) = full_name(record) {
            record.insert("name".to_string(), Value::String(name));
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    fn lenient(value: Value) -> Value {
        normalize_document(value, NormalizeMode::Lenient).unwrap()
    }

    #[test]
    fn test_relation_with_name_collapses_to_name() {
        let out = lenient(json!({"id": "s1", "program": {"id": "1", "name": "Foo"}}));
        assert_eq!(out["program"], json!("Foo"));
    }

    #[test]
    fn test_known_relation_fields() {
        let out = lenient(json!({
            "department": {"id": 3, "department_name": "CSE"},
            "institution": {"id": 1, "institution_name": "JKKN College of Engineering"},
            "mentor": {"first_name": "Asha", "last_name": "Raman"},
        }));
        assert_eq!(out["department"], json!("CSE"));
        assert_eq!(out["institution"], json!("JKKN College of Engineering"));
        assert_eq!(out["mentor"], json!("Asha Raman"));
    }

    #[test]
    fn test_fallback_fields_and_unknown_shape() {
        let out = lenient(json!({
            "category": {"id": 9, "label": "Aided"},
            "degree": {"id": 2, "code": "BE"},
            "mystery": {"id": 7, "colour": "blue"},
            "empty_name": {"id": 8, "name": ""},
        }));
        assert_eq!(out["category"], json!("Aided"));
        assert_eq!(out["degree"], json!("BE"));
        assert_eq!(out["mystery"], json!(NOT_AVAILABLE));
        assert_eq!(out["empty_name"], json!(NOT_AVAILABLE));
    }

    #[test]
    fn test_strict_mode_reports_unknown_shape() {
        let result = normalize_document(
            json!({"data": [{"id": 1, "mystery": {"id": 7}}]}),
            NormalizeMode::Strict,
        );
        assert_eq!(
            result.unwrap_err(),
            ApiError::UnrecognizedShape {
                field: "mystery".to_string()
            }
        );
    }

    #[test]
    fn test_metadata_is_left_untouched() {
        let metadata = json!({
            "page": 2,
            "total": 25,
            "totalPages": 3,
            "links": {"next": {"href": "/students?page=3"}}
        });
        let out = lenient(json!({
            "data": [{"id": 1, "department": {"department_name": "ECE"}}],
            "metadata": metadata.clone(),
        }));
        assert_eq!(out["metadata"], metadata);
        assert_eq!(out["data"][0]["department"], json!("ECE"));
    }

    #[test]
    fn test_status_special_cases() {
        let out = lenient(json!([
            {"status": {"is_active": true}},
            {"status": {"state": "suspended"}},
            {"status": {"active": false}},
            {"is_active": false},
            {"status": "graduated", "is_active": true},
        ]));
        assert_eq!(out[0]["status"], json!("active"));
        assert_eq!(out[1]["status"], json!("suspended"));
        assert_eq!(out[2]["status"], json!("inactive"));
        assert_eq!(out[3]["status"], json!("inactive"));
        assert_eq!(out[4]["status"], json!("graduated"));
    }

    #[test]
    fn test_employee_id_and_joining_date() {
        let out = lenient(json!([
            {"employee_id": {"id": 42, "code": "JK042"}, "date_of_joining": {"date": "2019-06-01"}},
            {"staff_id": "JK007"},
            {"staff_id": "JK008", "employee_id": "EMP-8"},
        ]));
        assert_eq!(out[0]["employee_id"], json!("JK042"));
        assert_eq!(out[0]["date_of_joining"], json!("2019-06-01"));
        assert_eq!(out[1]["employee_id"], json!("JK007"));
        assert_eq!(out[2]["employee_id"], json!("EMP-8"));
    }

    #[test]
    fn test_name_derived_from_parts() {
        let out = lenient(json!([
            {"first_name": "Kavin", "last_name": "S"},
            {"first_name": "Meena"},
            {"first_name": "Ravi", "last_name": "K", "name": "Dr. Ravi K"},
        ]));
        assert_eq!(out[0]["name"], json!("Kavin S"));
        assert_eq!(out[1]["name"], json!("Meena"));
        assert_eq!(out[2]["name"], json!("Dr. Ravi K"));
    }

    #[test]
    fn test_arrays_of_relations_collapse_elementwise() {
        let out = lenient(json!({
            "subjects": [{"id": 1, "title": "Maths"}, {"id": 2, "name": "Physics"}, "Chemistry"],
        }));
        assert_eq!(out["subjects"], json!(["Maths", "Physics", "Chemistry"]));
    }

    #[test]
    fn test_output_has_no_nested_objects_outside_metadata() {
        fn assert_flat(value: &Value, under_metadata: bool) {
            match value {
                Value::Object(map) => {
                    for (key, v) in map {
                        if key == "metadata" {
                            continue;
                        }
                        if let Value::Object(_) = v {
                            assert!(under_metadata, "nested object left in field {key}");
                        }
                        assert_flat(v, under_metadata);
                    }
                }
                Value::Array(items) => items.iter().for_each(|v| assert_flat(v, under_metadata)),
                _ => {}
            }
        }

        let out = lenient(json!({
            "data": [{
                "id": 1,
                "a": {"b": {"c": 1}},
                "list": [[{"name": "deep"}]],
                "status": {"nothing": true},
            }],
            "total": 1,
            "extra": {"name": "envelope-level"},
            "metadata": {"page": 1, "nested": {"kept": true}},
        }));
        assert_flat(&out["data"], false);
        assert_eq!(out["extra"], json!("envelope-level"));
        assert_eq!(out["data"][0]["list"], json!([["deep"]]));
        assert_eq!(out["data"][0]["status"], json!(NOT_AVAILABLE));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(lenient(json!(null)), json!(null));
        assert_eq!(lenient(json!("plain")), json!("plain"));
        let out = lenient(json!({"id": 5, "is_profile_complete": true, "cgpa": 8.4}));
        assert_eq!(out, json!({"id": 5, "is_profile_complete": true, "cgpa": 8.4}));
    }
}

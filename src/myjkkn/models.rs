//! Typed views of MyJKKN records and paginated responses.
//!
//! Records are deserialised from *normalised* rows (see [`super::normalize`]), so
//! relation fields are plain strings. Foreign keys such as `institution_id` and
//! `degree_id` are kept as raw identifiers; nothing resolves them client-side.

use super::error::{ApiError, ApiResult};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accepts `"12"`, `12` or `null` for an optional identifier/text field.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Same as [`lenient_text`] for required identifiers.
fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

/// A student as listed by the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentData {
    /// Student id
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    /// University roll number
    #[serde(deserialize_with = "lenient_text")]
    pub roll_number: Option<String>,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Display name (derived from the parts when absent)
    pub name: Option<String>,
    /// Personal e-mail
    pub student_email: Option<String>,
    /// College e-mail
    pub college_email: Option<String>,
    /// Institution display name
    #[serde(deserialize_with = "lenient_text")]
    pub institution: Option<String>,
    /// Department display name
    #[serde(deserialize_with = "lenient_text")]
    pub department: Option<String>,
    /// Program display name
    #[serde(deserialize_with = "lenient_text")]
    pub program: Option<String>,
    /// Whether the student finished their profile
    pub is_profile_complete: Option<bool>,
    /// Derived or reported status
    pub status: Option<String>,
}

/// A staff member as listed by the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffData {
    /// Staff id
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    /// Employee code (derived from `staff_id` when absent)
    #[serde(deserialize_with = "lenient_text")]
    pub employee_id: Option<String>,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Official e-mail
    pub email: Option<String>,
    /// Phone number
    #[serde(deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    /// Designation display name
    #[serde(deserialize_with = "lenient_text")]
    pub designation: Option<String>,
    /// Department display name
    #[serde(deserialize_with = "lenient_text")]
    pub department: Option<String>,
    /// Institution display name
    #[serde(deserialize_with = "lenient_text")]
    pub institution: Option<String>,
    /// Joining date as sent by the API
    pub date_of_joining: Option<String>,
    /// Activity flag
    pub is_active: Option<bool>,
    /// Derived or reported status
    pub status: Option<String>,
}

/// An institution (college) of the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstitutionData {
    /// Institution id
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    /// Institution name
    pub name: Option<String>,
    /// Short code
    #[serde(deserialize_with = "lenient_text")]
    pub code: Option<String>,
    /// Counselling code used in admissions
    #[serde(deserialize_with = "lenient_text")]
    pub counselling_code: Option<String>,
    /// Category (engineering, arts, ...)
    #[serde(deserialize_with = "lenient_text")]
    pub category: Option<String>,
    /// Activity flag
    pub is_active: Option<bool>,
    /// Derived status
    pub status: Option<String>,
}

/// A department within an institution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentData {
    /// Department id
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    /// Department name
    pub department_name: Option<String>,
    /// Short code
    #[serde(deserialize_with = "lenient_text")]
    pub department_code: Option<String>,
    /// Raw institution id
    #[serde(deserialize_with = "lenient_text")]
    pub institution_id: Option<String>,
    /// Raw degree id
    #[serde(deserialize_with = "lenient_text")]
    pub degree_id: Option<String>,
    /// Activity flag
    pub is_active: Option<bool>,
    /// Derived status
    pub status: Option<String>,
}

/// A degree program offered by a department.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramData {
    /// Program id
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    /// Program name
    pub program_name: Option<String>,
    /// Short code
    #[serde(deserialize_with = "lenient_text")]
    pub program_code: Option<String>,
    /// Raw institution id
    #[serde(deserialize_with = "lenient_text")]
    pub institution_id: Option<String>,
    /// Raw department id
    #[serde(deserialize_with = "lenient_text")]
    pub department_id: Option<String>,
    /// Raw degree id
    #[serde(deserialize_with = "lenient_text")]
    pub degree_id: Option<String>,
    /// Activity flag
    pub is_active: Option<bool>,
    /// Derived status
    pub status: Option<String>,
}

/// Pagination block of a [`Page`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    /// 1-based page number
    pub page: u32,
    /// Number of pages at the requested page size
    pub total_pages: u32,
    /// Number of matching records
    pub total: u64,
}

/// One page of records in `{data, metadata}` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records on this page
    pub data: Vec<T>,
    /// Pagination info
    pub metadata: PaginationMetadata,
}

fn read_number(source: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match source.get(*key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Pages needed for `total` records at `limit` per page.
#[must_use]
pub const fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return if total > 0 { 1 } else { 0 };
    }
    let pages = total.div_ceil(limit as u64);
    if pages > u32::MAX as u64 {
        u32::MAX
    } else {
        pages as u32
    }
}

/// Builds a [`Page`] from a normalised response.
///
/// Accepts the API's top-level `{data, total, page, totalPages}` envelope, an
/// envelope that already carries `metadata`, or a bare array. `totalPages` is
/// computed from `total` and `limit` when the API leaves it out.
pub fn into_page<T: DeserializeOwned>(
    value: Value,
    requested_page: u32,
    limit: u32,
) -> ApiResult<Page<T>> {
    let (rows, envelope) = match value {
        Value::Array(rows) => (rows, Map::new()),
        Value::Object(mut map) => {
            let rows = match map.remove("data") {
                Some(Value::Array(rows)) => rows,
                None | Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(ApiError::Decode(format!(
                        "expected `data` to be an array, got {other}"
                    )));
                }
            };
            (rows, map)
        }
        other => {
            return Err(ApiError::Decode(format!(
                "expected a paginated object, got {other}"
            )));
        }
    };

    let row_count = rows.len() as u64;
    let data = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ApiError::Decode(e.to_string()))?;

    let source = match envelope.get("metadata") {
        Some(Value::Object(metadata)) => metadata,
        _ => &envelope,
    };
    let total = read_number(source, &["total", "count"]).unwrap_or(row_count);
    let page = read_number(source, &["page", "currentPage", "current_page"])
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(requested_page)
        .max(1);
    let total_pages = read_number(source, &["totalPages", "total_pages"])
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or_else(|| total_pages(total, limit));

    Ok(Page {
        data,
        metadata: PaginationMetadata {
            page,
            total_pages,
            total,
        },
    })
}

/// Extracts a single record from a `{data: {...}}` wrapper, a bare object, or a
/// one-element array. An empty array is not found; a longer one is a list, not a
/// record, and is refused.
pub fn into_record<T: DeserializeOwned>(value: Value, endpoint: &str) -> ApiResult<T> {
    let record = match value {
        Value::Object(mut map) if map.contains_key("data") => map.remove("data").unwrap_or_default(),
        other => other,
    };
    let record = match record {
        Value::Array(rows) if rows.len() > 1 => {
            return Err(ApiError::Decode(format!(
                "expected a single record from {endpoint}, got {} rows",
                rows.len()
            )));
        }
        Value::Array(rows) => rows.into_iter().next().unwrap_or_default(),
        other => other,
    };
    if record.is_null() {
        return Err(ApiError::NotFound {
            endpoint: endpoint.to_string(),
        });
    }
    serde_json::from_value(record).map_err(|e| ApiError::Decode(e.to_string()))
}

//! Boundary decoding of records served by the data service.
//!
//! The spreadsheet-backed service returns loosely typed rows: lists flattened to
//! `", "`-joined strings, booleans and numbers as text, fields missing on older
//! rows. Everything is normalized here, once, so the rest of the workspace only
//! sees well-formed [`SchoolVisit`] and [`School`] values.

use serde_json::{Map, Value};
use siap_core::{Coordinate, EmpathyMetrics, School, SchoolVisit, SubmissionStatus};
use tracing::{debug, warn};

use crate::SyncError;

/// Decode a single visit row.
pub fn decode_visit(raw: Value) -> Result<SchoolVisit, SyncError> {
    let Value::Object(mut row) = raw else {
        return Err(SyncError::Malformed("visit row is not an object".into()));
    };

    stringify(&mut row, "id");
    if !matches!(row.get("id"), Some(Value::String(s)) if !s.is_empty()) {
        return Err(SyncError::Malformed("visit row has no id".into()));
    }

    for key in [
        "inspectorId",
        "schoolName",
        "principalName",
        "date",
        "jam",
        "type",
        "locationStatus",
        "notes",
    ] {
        stringify(&mut row, key);
        row.entry(key).or_insert_with(|| Value::String(String::new()));
    }
    stringify(&mut row, "schoolId");

    let metrics = match row.remove("empathyMetrics") {
        Some(v @ Value::Object(_)) => {
            serde_json::from_value::<EmpathyMetrics>(v).unwrap_or_default()
        }
        _ => EmpathyMetrics::default(),
    };
    row.insert("empathyMetrics".into(), serde_json::to_value(metrics)?);

    for key in ["keyFindings", "agreedActions"] {
        let list = split_list(row.remove(key));
        row.insert(key.into(), Value::from(list));
    }

    let verified = parse_bool(row.get("locationVerified"));
    row.insert("locationVerified".into(), Value::Bool(verified));

    let distance = parse_distance(row.get("distanceMeter"));
    row.insert("distanceMeter".into(), Value::from(distance));

    let status = parse_status(row.get("status"));
    row.insert("status".into(), serde_json::to_value(status)?);

    if let Some(location) = row.remove("location") {
        match serde_json::from_value::<Coordinate>(location) {
            Ok(coord) => {
                row.insert("location".into(), serde_json::to_value(coord)?);
            }
            Err(e) => debug!(error = %e, "dropping unreadable visit location"),
        }
    }

    for key in ["photoUrl", "signatureSupervisor", "signaturePrincipal", "link_pdf"] {
        if !matches!(row.get(key), Some(Value::String(_))) {
            row.remove(key);
        }
    }

    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Decode a batch, skipping rows that cannot be read.
pub fn decode_visits(rows: Vec<Value>) -> Vec<SchoolVisit> {
    let total = rows.len();
    let visits: Vec<SchoolVisit> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match decode_visit(row) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed visit row");
                None
            }
        })
        .collect();
    if visits.len() < total {
        warn!(total, decoded = visits.len(), "some visit rows were skipped");
    }
    visits
}

/// Decode a single school row. Blank or non-numeric coordinate cells become
/// an absent coordinate rather than failing the row.
pub fn decode_school(raw: Value) -> Result<School, SyncError> {
    let Value::Object(mut row) = raw else {
        return Err(SyncError::Malformed("school row is not an object".into()));
    };

    stringify(&mut row, "id");
    if !matches!(row.get("id"), Some(Value::String(s)) if !s.is_empty()) {
        return Err(SyncError::Malformed("school row has no id".into()));
    }
    for key in ["npsn", "name", "principal", "inspectorId"] {
        stringify(&mut row, key);
        row.entry(key).or_insert_with(|| Value::String(String::new()));
    }

    for key in ["latitude", "longitude"] {
        match parse_degrees(row.remove(key)) {
            Some(deg) => {
                row.insert(key.into(), Value::from(deg));
            }
            None => debug!(field = key, "school row has no usable coordinate"),
        }
    }

    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Decode a batch of school rows, skipping rows that cannot be read.
pub fn decode_schools(rows: Vec<Value>) -> Vec<School> {
    let total = rows.len();
    let schools: Vec<School> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match decode_school(row) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed school row");
                None
            }
        })
        .collect();
    if schools.len() < total {
        warn!(total, decoded = schools.len(), "some school rows were skipped");
    }
    schools
}

/// Numbers become their decimal text; `null` is removed.
fn stringify(row: &mut Map<String, Value>, key: &str) {
    match row.get(key) {
        Some(Value::Number(n)) => {
            let text = n.to_string();
            row.insert(key.into(), Value::String(text));
        }
        Some(Value::Null) => {
            row.remove(key);
        }
        Some(Value::Bool(b)) => {
            let text = b.to_string();
            row.insert(key.into(), Value::String(text));
        }
        _ => {}
    }
}

fn split_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => s.split(", ").map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn parse_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn parse_distance(value: Option<&Value>) -> i64 {
    let meters = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    meters
        .filter(|m| m.is_finite())
        .map(|m| m.round() as i64)
        .unwrap_or(0)
}

fn parse_degrees(value: Option<Value>) -> Option<f64> {
    let degrees = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    degrees.filter(|d| d.is_finite())
}

fn parse_status(value: Option<&Value>) -> SubmissionStatus {
    let Some(Value::String(s)) = value else {
        return SubmissionStatus::default();
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "draft" => SubmissionStatus::Draft,
        "archived" => SubmissionStatus::Archived,
        _ => SubmissionStatus::Submitted,
    }
}

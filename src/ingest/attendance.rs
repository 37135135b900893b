use crate::store::{ConstraintKind, QueryExecutor, StoreError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEntry {
    pub class_id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceBatchResult {
    pub processed_count: usize,
    #[serde(rename = "classId")]
    pub reference_class_id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("at least one attendance record is required")]
    EmptyBatch,
    #[error("attendance record {index} is incomplete: {reason}")]
    BatchValidation { index: usize, reason: String },
    #[error("attendance batch has {count} records, max is {max}")]
    TooManyRecords { count: usize, max: usize },
    #[error("class or student does not exist")]
    ReferenceNotFound(#[source] StoreError),
    #[error(transparent)]
    Store(StoreError),
}

fn id_field(record: &serde_json::Value, key: &str) -> Option<i64> {
    let v = record.get(key)?;
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .filter(|id| *id > 0)
}

fn validate_entry(record: &serde_json::Value) -> Result<AttendanceEntry, String> {
    if !record.is_object() {
        return Err("record must be an object".to_string());
    }
    let class_id = id_field(record, "classId").ok_or("missing/invalid classId")?;
    let student_id = id_field(record, "studentId").ok_or("missing/invalid studentId")?;
    let date_raw = record
        .get("date")
        .and_then(|v| v.as_str())
        .ok_or("missing date")?;
    let date = NaiveDate::parse_from_str(date_raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("date must be YYYY-MM-DD, got {:?}", date_raw))?;
    let status_raw = record
        .get("status")
        .and_then(|v| v.as_str())
        .ok_or("missing status")?;
    let status = AttendanceStatus::parse(status_raw)
        .ok_or_else(|| format!("status must be Present or Absent, got {:?}", status_raw))?;
    Ok(AttendanceEntry {
        class_id,
        student_id,
        date,
        status,
    })
}

/// Validates the whole batch up front; the first bad record rejects everything.
pub fn validate_batch(
    records: &[serde_json::Value],
    max_records: usize,
) -> Result<Vec<AttendanceEntry>, AttendanceError> {
    if records.is_empty() {
        return Err(AttendanceError::EmptyBatch);
    }
    if records.len() > max_records {
        return Err(AttendanceError::TooManyRecords {
            count: records.len(),
            max: max_records,
        });
    }
    records
        .iter()
        .enumerate()
        .map(|(index, r)| {
            validate_entry(r).map_err(|reason| AttendanceError::BatchValidation { index, reason })
        })
        .collect()
}

/// Merges all entries in one statement keyed on (class_id, student_id); the last submission wins.
pub fn upsert_batch(
    exec: &impl QueryExecutor,
    entries: &[AttendanceEntry],
) -> Result<AttendanceBatchResult, AttendanceError> {
    let Some(first) = entries.first() else {
        return Err(AttendanceError::EmptyBatch);
    };

    let placeholders = vec!["(?, ?, ?, ?)"; entries.len()].join(", ");
    let sql = format!(
        "INSERT INTO attendance(class_id, student_id, date, status)
         VALUES {}
         ON CONFLICT(class_id, student_id) DO UPDATE SET
           date = excluded.date,
           status = excluded.status",
        placeholders
    );
    let mut params: Vec<Value> = Vec::with_capacity(entries.len() * 4);
    for e in entries {
        params.push(Value::Integer(e.class_id));
        params.push(Value::Integer(e.student_id));
        params.push(Value::Text(e.date.format("%Y-%m-%d").to_string()));
        params.push(Value::Text(e.status.as_str().to_string()));
    }

    let executed = exec.execute(&sql, &params).map_err(|e| match e.constraint_kind() {
        Some(ConstraintKind::ForeignKey) => AttendanceError::ReferenceNotFound(e),
        _ => AttendanceError::Store(e),
    })?;
    log::debug!("attendance upsert touched {} rows", executed.affected);

    Ok(AttendanceBatchResult {
        processed_count: entries.len(),
        reference_class_id: first.class_id,
    })
}

pub fn register_batch(
    exec: &impl QueryExecutor,
    records: &[serde_json::Value],
    max_records: usize,
) -> Result<AttendanceBatchResult, AttendanceError> {
    let entries = validate_batch(records, max_records)?;
    upsert_batch(exec, &entries)
}

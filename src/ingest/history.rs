use crate::ingest::import::ImportReport;
use crate::store::{opt_text, value_i64, value_text, QueryExecutor, StoreError};
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub id: String,
    pub file_name: Option<String>,
    pub file_sha256: String,
    pub inserted_count: i64,
    pub failed_count: i64,
    pub error_details: Vec<String>,
    pub imported_at: String,
}

pub fn file_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn previous_import(exec: &impl QueryExecutor, digest: &str) -> Result<Option<String>, StoreError> {
    let rows = exec.fetch(
        "SELECT id FROM import_batches WHERE file_sha256 = ? ORDER BY rowid DESC LIMIT 1",
        &[Value::Text(digest.to_string())],
    )?;
    Ok(rows.first().and_then(|r| value_text(r.first())))
}

pub fn record_import(
    exec: &impl QueryExecutor,
    file_name: Option<&str>,
    digest: &str,
    report: &ImportReport,
) -> Result<String, StoreError> {
    let id = Uuid::new_v4().to_string();
    let details = serde_json::to_string(&report.error_details)
        .map_err(|e| StoreError::Other(e.to_string()))?;
    exec.execute(
        "INSERT INTO import_batches(
           id, file_name, file_sha256, inserted_count, failed_count, error_details, imported_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?)",
        &[
            Value::Text(id.clone()),
            opt_text(file_name.map(str::to_string)),
            Value::Text(digest.to_string()),
            Value::Integer(report.inserted_count as i64),
            Value::Integer(report.failed_count as i64),
            Value::Text(details),
            Value::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        ],
    )?;
    Ok(id)
}

pub fn recent_imports(exec: &impl QueryExecutor, limit: usize) -> Result<Vec<ImportBatch>, StoreError> {
    let rows = exec.fetch(
        "SELECT id, file_name, file_sha256, inserted_count, failed_count, error_details, imported_at
         FROM import_batches
         ORDER BY rowid DESC
         LIMIT ?",
        &[Value::Integer(limit as i64)],
    )?;
    Ok(rows
        .iter()
        .map(|r| ImportBatch {
            id: value_text(r.first()).unwrap_or_default(),
            file_name: value_text(r.get(1)),
            file_sha256: value_text(r.get(2)).unwrap_or_default(),
            inserted_count: value_i64(r.get(3)).unwrap_or(0),
            failed_count: value_i64(r.get(4)).unwrap_or(0),
            error_details: value_text(r.get(5))
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            imported_at: value_text(r.get(6)).unwrap_or_default(),
        })
        .collect())
}

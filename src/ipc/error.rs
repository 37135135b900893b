use crate::ingest::attendance::AttendanceError;
use crate::ingest::import::ImportError;
use crate::ingest::tabular::TabularError;
use crate::store::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn query(e: impl ToString) -> Self {
        Self::new("db_query_failed", e.to_string())
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        HandlerErr::query(e)
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr::query(e)
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        let message = e.to_string();
        match e {
            ImportError::Tabular(TabularError::Parse(_)) => HandlerErr::new("parse_failed", message),
            ImportError::Tabular(TabularError::EmptyDataset) => {
                HandlerErr::new("empty_dataset", message)
            }
            ImportError::Tabular(TabularError::MissingColumns { missing }) => {
                HandlerErr::new("missing_columns", message).with_details(json!({ "missing": missing }))
            }
            ImportError::References(_) => HandlerErr::query(message),
        }
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let message = e.to_string();
        match e {
            AttendanceError::EmptyBatch => HandlerErr::new("bad_params", message),
            AttendanceError::BatchValidation { index, .. } => {
                HandlerErr::new("bad_params", message).with_details(json!({ "index": index }))
            }
            AttendanceError::TooManyRecords { count, max } => HandlerErr::new("too_many_records", message)
                .with_details(json!({ "count": count, "max": max })),
            AttendanceError::ReferenceNotFound(source) => HandlerErr::new("not_found", message)
                .with_details(json!({ "cause": source.to_string() })),
            AttendanceError::Store(source) => HandlerErr::new("db_update_failed", source.to_string())
                .with_details(json!({ "table": "attendance" })),
        }
    }
}

use crate::ingest::tabular::WorkbookFormat;
use crate::ingest::{history, import};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_limit, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

fn students_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT
           s.id, s.name, s.surname, s.enrollment_code, s.email, s.phone,
           s.school_id, sc.name, s.intended_major, s.municipality, s.accepted, s.notes
         FROM students s
         LEFT JOIN schools sc ON sc.id = s.school_id
         ORDER BY s.name COLLATE NOCASE, s.surname COLLATE NOCASE, s.id",
    )?;
    let students = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "name": r.get::<_, String>(1)?,
                "surname": r.get::<_, String>(2)?,
                "enrollmentCode": r.get::<_, Option<String>>(3)?,
                "email": r.get::<_, String>(4)?,
                "phone": r.get::<_, Option<String>>(5)?,
                "schoolId": r.get::<_, Option<i64>>(6)?,
                "schoolName": r.get::<_, Option<String>>(7)?,
                "intendedMajor": r.get::<_, Option<String>>(8)?,
                "municipality": r.get::<_, Option<String>>(9)?,
                "accepted": r.get::<_, i64>(10)? != 0,
                "notes": r.get::<_, Option<String>>(11)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "students": students }))
}

fn read_spreadsheet(path: &Path, max_bytes: u64) -> Result<(WorkbookFormat, Vec<u8>), HandlerErr> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    let Some(format) = WorkbookFormat::from_extension(&ext) else {
        return Err(HandlerErr::new(
            "unsupported_file",
            "only Excel files (.xls, .xlsx) are accepted",
        )
        .with_details(json!({ "extension": ext })));
    };

    let meta = std::fs::metadata(path).map_err(|e| {
        HandlerErr::new("file_read_failed", e.to_string())
            .with_details(json!({ "path": path.to_string_lossy() }))
    })?;
    if !meta.is_file() {
        return Err(HandlerErr::new("file_read_failed", "path is not a file")
            .with_details(json!({ "path": path.to_string_lossy() })));
    }
    if meta.len() > max_bytes {
        return Err(HandlerErr::new(
            "file_too_large",
            format!("file exceeds upload limit: {} > {} bytes", meta.len(), max_bytes),
        )
        .with_details(json!({ "sizeBytes": meta.len(), "maxBytes": max_bytes })));
    }

    let bytes = std::fs::read(path).map_err(|e| {
        HandlerErr::new("file_read_failed", e.to_string())
            .with_details(json!({ "path": path.to_string_lossy() }))
    })?;
    Ok((format, bytes))
}

fn students_import_spreadsheet(
    conn: &Connection,
    params: &serde_json::Value,
    max_upload_bytes: u64,
) -> Result<serde_json::Value, HandlerErr> {
    let file_path = get_required_str(params, "filePath")?;
    let path = Path::new(&file_path);
    let (format, bytes) = read_spreadsheet(path, max_upload_bytes)?;
    let file_name = path.file_name().and_then(|s| s.to_str());

    let outcome = import::import_workbook(conn, file_name, &bytes, Some(format)).map_err(|e| {
        log::warn!("spreadsheet import rejected: {}", e);
        HandlerErr::from(e)
    })?;

    serde_json::to_value(&outcome).map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))
}

fn students_import_history(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let limit = get_limit(params, 20, 500);
    let batches = history::recent_imports(conn, limit)?;
    Ok(json!({ "imports": batches }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    match students_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_import_spreadsheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_import_spreadsheet(conn, &req.params, state.config.max_upload_bytes) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_import_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "imports": [] }));
    };
    match students_import_history(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.importSpreadsheet" => Some(handle_students_import_spreadsheet(state, req)),
        "students.importHistory" => Some(handle_students_import_history(state, req)),
        _ => None,
    }
}

use crate::ingest::attendance;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_limit, get_required_id};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn attendance_upsert_batch(
    conn: &Connection,
    params: &serde_json::Value,
    max_records: usize,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(records) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing records[]"));
    };
    let result = attendance::register_batch(conn, records, max_records).map_err(|e| {
        log::warn!("attendance batch rejected: {}", e);
        HandlerErr::from(e)
    })?;
    log::info!(
        "attendance batch of {} records merged for class {}",
        result.processed_count,
        result.reference_class_id
    );
    let mut body = serde_json::to_value(result)
        .map_err(|e| HandlerErr::new("serialize_failed", e.to_string()))?;
    body["message"] = json!(format!(
        "Attendance for {} students recorded/updated",
        result.processed_count
    ));
    Ok(body)
}

fn attendance_for_class(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_id(params, "classId")?;
    let exists = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !exists {
        return Err(HandlerErr::new("not_found", "class not found")
            .with_details(json!({ "classId": class_id })));
    }

    let mut stmt = conn.prepare(
        "SELECT a.id, a.date, a.status, s.id, s.name, s.surname, s.email
         FROM attendance a
         JOIN students s ON s.id = a.student_id
         WHERE a.class_id = ?
         ORDER BY s.name COLLATE NOCASE, s.surname COLLATE NOCASE, s.id",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(json!({
                "attendanceId": r.get::<_, i64>(0)?,
                "date": r.get::<_, String>(1)?,
                "status": r.get::<_, String>(2)?,
                "studentId": r.get::<_, i64>(3)?,
                "name": r.get::<_, String>(4)?,
                "surname": r.get::<_, String>(5)?,
                "email": r.get::<_, String>(6)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "classId": class_id, "rows": rows }))
}

fn attendance_summary(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let limit = get_limit(params, 10, 200) as i64;
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.title,
           c.date,
           COALESCE(SUM(CASE WHEN a.status = 'Present' THEN 1 ELSE 0 END), 0) AS present,
           COUNT(a.student_id) AS total
         FROM classes c
         LEFT JOIN attendance a ON a.class_id = c.id
         GROUP BY c.id, c.title, c.date
         ORDER BY c.date DESC, c.id DESC
         LIMIT ?",
    )?;
    let classes = stmt
        .query_map([limit], |r| {
            Ok(json!({
                "classId": r.get::<_, i64>(0)?,
                "title": r.get::<_, String>(1)?,
                "date": r.get::<_, String>(2)?,
                "present": r.get::<_, i64>(3)?,
                "total": r.get::<_, i64>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "classes": classes }))
}

fn handle_attendance_upsert_batch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_upsert_batch(conn, &req.params, state.config.max_attendance_records) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_for_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_for_class(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match attendance_summary(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.upsertBatch" => Some(handle_attendance_upsert_batch(state, req)),
        "attendance.forClass" => Some(handle_attendance_for_class(state, req)),
        "attendance.summary" => Some(handle_attendance_summary(state, req)),
        _ => None,
    }
}

use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_date, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn parse_class_status(raw: Option<String>) -> Result<&'static str, HandlerErr> {
    match raw.as_deref().map(|s| s.to_ascii_lowercase()) {
        None => Ok("Scheduled"),
        Some(s) if s == "scheduled" => Ok("Scheduled"),
        Some(s) if s == "completed" => Ok("Completed"),
        Some(other) => Err(HandlerErr::new(
            "bad_params",
            "status must be one of: Scheduled, Completed",
        )
        .with_details(json!({ "status": other }))),
    }
}

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let title = get_required_str(params, "title")?;
    let date = get_required_date(params, "date")?;
    let status = parse_class_status(get_optional_str(params, "status"))?;
    let location = get_optional_str(params, "location");
    conn.execute(
        "INSERT INTO classes(title, date, status, location) VALUES(?, ?, ?, ?)",
        (&title, &date, status, &location),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "classes" }))
    })?;
    Ok(json!({ "classId": conn.last_insert_rowid(), "title": title }))
}

fn classes_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.title,
           c.date,
           c.status,
           c.location,
           (SELECT COUNT(*) FROM attendance a WHERE a.class_id = c.id) AS attendance_count
         FROM classes c
         ORDER BY c.date DESC, c.id DESC",
    )?;
    let classes = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "title": r.get::<_, String>(1)?,
                "date": r.get::<_, String>(2)?,
                "status": r.get::<_, String>(3)?,
                "location": r.get::<_, Option<String>>(4)?,
                "attendanceCount": r.get::<_, i64>(5)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match classes_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match classes_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        _ => None,
    }
}

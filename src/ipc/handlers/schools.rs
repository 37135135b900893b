use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn schools_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let city = get_optional_str(params, "city");
    let state = get_optional_str(params, "state");
    conn.execute(
        "INSERT INTO schools(name, city, state) VALUES(?, ?, ?)",
        (&name, &city, &state),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "schools" }))
    })?;
    Ok(json!({ "schoolId": conn.last_insert_rowid(), "name": name }))
}

fn schools_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, name, city, state
         FROM schools
         ORDER BY name COLLATE NOCASE, id",
    )?;
    let schools = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "name": r.get::<_, String>(1)?,
                "city": r.get::<_, Option<String>>(2)?,
                "state": r.get::<_, Option<String>>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "schools": schools }))
}

fn handle_schools_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match schools_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_schools_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "schools": [] }));
    };
    match schools_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schools.create" => Some(handle_schools_create(state, req)),
        "schools.list" => Some(handle_schools_list(state, req)),
        _ => None,
    }
}

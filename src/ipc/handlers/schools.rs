use crate::ipc::helpers::{read_or_empty, required_str, to_json, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repo::schools;
use rusqlite::Connection;
use serde_json::{json, Value};

fn schools_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let rows = schools::list(conn)?;
    Ok(json!({ "schools": to_json(&rows)? }))
}

fn schools_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let school_id = schools::insert(conn, name)?;
    tracing::info!(school_id, "school created");
    Ok(json!({ "schoolId": school_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "schools.list" => Some(read_or_empty(state, req, json!({ "schools": [] }), schools_list)),
        "schools.create" => Some(with_db(state, req, schools_create)),
        _ => None,
    }
}

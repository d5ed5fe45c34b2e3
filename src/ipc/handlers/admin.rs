use crate::ipc::helpers::{read_or_empty, require_confirm, to_json, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::repo::admin::{self, SystemCounts};
use rusqlite::Connection;
use serde_json::{json, Value};

fn admin_status(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    to_json(&admin::status(conn)?)
}

fn wipe(
    conn: &Connection,
    params: &Value,
    what: &'static str,
    op: fn(&Connection) -> crate::repo::StoreResult<SystemCounts>,
) -> Result<Value, HandlerErr> {
    require_confirm(params)?;
    let removed = op(conn)?;
    tracing::warn!(
        what,
        schools = removed.schools,
        teachers = removed.teachers,
        students = removed.students,
        attendance = removed.attendance_records,
        assessments = removed.assessment_records,
        "bulk delete"
    );
    Ok(json!({ "removed": to_json(&removed)? }))
}

fn admin_reset(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    require_confirm(params)?;
    admin::reset_system(conn)?;
    tracing::warn!("system reset; all record tables recreated");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "admin.status" => Some(read_or_empty(
            state,
            req,
            to_json(&SystemCounts::default()).unwrap_or_else(|_| json!({})),
            admin_status,
        )),
        "admin.deleteAllStudents" => Some(with_db(state, req, |c, p| {
            wipe(c, p, "students", admin::delete_all_students)
        })),
        "admin.deleteAllTeachers" => Some(with_db(state, req, |c, p| {
            wipe(c, p, "teachers", admin::delete_all_teachers)
        })),
        "admin.deleteAllSchools" => Some(with_db(state, req, |c, p| {
            wipe(c, p, "schools", admin::delete_all_schools)
        })),
        "admin.resetSystem" => Some(with_db(state, req, admin_reset)),
        _ => None,
    }
}

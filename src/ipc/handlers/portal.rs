use crate::ipc::handlers::attendance::parse_status;
use crate::ipc::helpers::{
    entries, optional_str, required_date, required_i64, required_str, to_json, with_db,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::portal;
use rusqlite::Connection;
use serde_json::{json, Value};

fn portal_teacher(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_i64(params, "teacherId")?;
    let view = portal::teacher_portal(conn, teacher_id, optional_str(params, "classGrade"))?;
    to_json(&view)
}

fn portal_teacher_attendance(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_i64(params, "teacherId")?;
    let class_grade = required_str(params, "classGrade")?;
    let date = required_date(params, "date")?;
    let mut batch = Vec::new();
    for (i, raw) in entries(params)?.iter().enumerate() {
        let student_id = required_i64(raw, "studentId").map_err(|e| {
            HandlerErr::bad_params(format!("entry {}: {}", i, e.message))
                .with_details(json!({ "index": i }))
        })?;
        let status = parse_status(i, required_str(raw, "status").unwrap_or_default())?;
        batch.push((student_id, status));
    }
    let ids = portal::record_class_attendance(conn, teacher_id, class_grade, date, &batch)?;
    tracing::info!(teacher_id, class_grade, %date, count = ids.len(), "class attendance recorded");
    Ok(json!({ "attendanceIds": ids }))
}

fn portal_parent(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    to_json(&portal::parent_portal(conn, student_id)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "portal.teacher" => Some(with_db(state, req, portal_teacher)),
        "portal.teacherAttendance" => Some(with_db(state, req, portal_teacher_attendance)),
        "portal.parent" => Some(with_db(state, req, portal_parent)),
        _ => None,
    }
}

use crate::ipc::helpers::{
    fields, optional_str, read_or_empty, required_i64, to_json, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentFields;
use crate::repo::students;
use rusqlite::Connection;
use serde_json::{json, Value};

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let rows = match optional_str(params, "grade") {
        Some(grade) => students::list_by_grade(conn, school_id, grade)?,
        None => students::list_by_school(conn, school_id)?,
    };
    Ok(json!({ "students": to_json(&rows)? }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let f: StudentFields = fields(params)?;
    let student_id = students::insert(conn, school_id, &f)?;
    tracing::info!(school_id, student_id, "student created");
    Ok(json!({ "studentId": student_id }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let f: StudentFields = fields(params)?;
    students::update(conn, student_id, &f)?;
    tracing::info!(student_id, "student updated");
    Ok(json!({ "ok": true }))
}

/// Attendance and assessment rows of the student are kept.
fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    students::delete(conn, student_id)?;
    tracing::info!(student_id, "student deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(read_or_empty(state, req, json!({ "students": [] }), students_list)),
        "students.create" => Some(with_db(state, req, students_create)),
        "students.update" => Some(with_db(state, req, students_update)),
        "students.delete" => Some(with_db(state, req, students_delete)),
        _ => None,
    }
}

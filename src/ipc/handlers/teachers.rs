use crate::ipc::helpers::{
    fields, optional_i64, read_or_empty, required_i64, to_json, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AssignmentFields, TeacherFields};
use crate::repo::teachers;
use rusqlite::Connection;
use serde_json::{json, Value};

fn teachers_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let rows = teachers::list_by_school(conn, school_id)?;
    Ok(json!({ "teachers": to_json(&rows)? }))
}

fn teachers_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let f: TeacherFields = fields(params)?;
    let teacher_id = teachers::insert(conn, school_id, &f)?;
    tracing::info!(school_id, teacher_id, "teacher created");
    Ok(json!({ "teacherId": teacher_id }))
}

fn teachers_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_i64(params, "teacherId")?;
    let f: TeacherFields = fields(params)?;
    teachers::update(conn, teacher_id, &f)?;
    tracing::info!(teacher_id, "teacher updated");
    Ok(json!({ "ok": true }))
}

fn teachers_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_i64(params, "teacherId")?;
    teachers::delete(conn, teacher_id)?;
    tracing::info!(teacher_id, "teacher deleted");
    Ok(json!({ "ok": true }))
}

fn assignments_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let rows = match optional_i64(params, "teacherId")? {
        Some(teacher_id) => teachers::list_assignments_by_teacher(conn, teacher_id)?,
        None => teachers::list_assignments_by_school(conn, required_i64(params, "schoolId")?)?,
    };
    Ok(json!({ "assignments": to_json(&rows)? }))
}

fn assignments_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    required_i64(params, "teacherId")?;
    let f: AssignmentFields = fields(params)?;
    let assignment_id = teachers::insert_assignment(conn, school_id, &f)?;
    tracing::info!(school_id, teacher_id = f.teacher_id, assignment_id, "assignment created");
    Ok(json!({ "assignmentId": assignment_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "teachers.list" => Some(read_or_empty(state, req, json!({ "teachers": [] }), teachers_list)),
        "teachers.create" => Some(with_db(state, req, teachers_create)),
        "teachers.update" => Some(with_db(state, req, teachers_update)),
        "teachers.delete" => Some(with_db(state, req, teachers_delete)),
        "assignments.list" => Some(read_or_empty(
            state,
            req,
            json!({ "assignments": [] }),
            assignments_list,
        )),
        "assignments.create" => Some(with_db(state, req, assignments_create)),
        _ => None,
    }
}

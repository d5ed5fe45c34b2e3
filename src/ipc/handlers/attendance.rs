use crate::ipc::helpers::{
    date_range, entries, entry, optional_i64, read_or_empty, required_date, required_i64, to_json,
    with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, NewAttendance, DEFAULT_BEHAVIOUR_SCORE};
use crate::repo::attendance;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceEntry {
    student_id: i64,
    status: String,
    behaviour_score: Option<i64>,
    comment: Option<String>,
}

pub(super) fn parse_status(index: usize, raw: &str) -> Result<AttendanceStatus, HandlerErr> {
    AttendanceStatus::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params(format!(
            "entry {}: status must be one of Present, Absent, Late",
            index
        ))
        .with_details(json!({ "index": index, "status": raw }))
    })
}

fn attendance_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let rows = match optional_i64(params, "studentId")? {
        Some(student_id) => attendance::list_by_student(conn, student_id)?,
        None => {
            let school_id = required_i64(params, "schoolId")?;
            attendance::list_by_school(conn, school_id, &date_range(params)?)?
        }
    };
    Ok(json!({ "records": to_json(&rows)? }))
}

fn attendance_record(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let date = required_date(params, "date")?;
    let mut batch = Vec::new();
    for (i, raw) in entries(params)?.iter().enumerate() {
        let e: AttendanceEntry = entry(i, raw)?;
        batch.push(NewAttendance {
            student_id: e.student_id,
            status: parse_status(i, &e.status)?,
            behaviour_score: e.behaviour_score.unwrap_or(DEFAULT_BEHAVIOUR_SCORE),
            comment: e.comment.unwrap_or_default(),
        });
    }
    let ids = attendance::insert_batch(conn, school_id, date, &batch)?;
    tracing::info!(school_id, %date, count = ids.len(), "attendance recorded");
    Ok(json!({ "attendanceIds": ids }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.list" => Some(read_or_empty(state, req, json!({ "records": [] }), attendance_list)),
        "attendance.record" => Some(with_db(state, req, attendance_record)),
        _ => None,
    }
}

use crate::ipc::helpers::{
    date_range, entries, entry, optional_i64, read_or_empty, required_date, required_i64,
    required_str, to_json, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::NewAssessment;
use crate::repo::assessments::{self, Sitting};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentEntry {
    student_id: i64,
    marks: i64,
}

fn assessments_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let rows = match optional_i64(params, "studentId")? {
        Some(student_id) => assessments::list_by_student(conn, student_id)?,
        None => {
            let school_id = required_i64(params, "schoolId")?;
            assessments::list_by_school(conn, school_id, &date_range(params)?)?
        }
    };
    Ok(json!({ "records": to_json(&rows)? }))
}

fn assessments_record(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let sitting = Sitting {
        date: required_date(params, "date")?,
        subject: required_str(params, "subject")?.to_string(),
        total: required_i64(params, "total")?,
    };
    let mut batch = Vec::new();
    for (i, raw) in entries(params)?.iter().enumerate() {
        let e: AssessmentEntry = entry(i, raw)?;
        batch.push(NewAssessment {
            student_id: e.student_id,
            marks: e.marks,
        });
    }
    let ids = assessments::insert_batch(conn, school_id, &sitting, &batch)?;
    tracing::info!(
        school_id,
        subject = %sitting.subject,
        count = ids.len(),
        "assessments recorded"
    );
    Ok(json!({ "assessmentIds": ids }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "assessments.list" => Some(read_or_empty(state, req, json!({ "records": [] }), assessments_list)),
        "assessments.record" => Some(with_db(state, req, assessments_record)),
        _ => None,
    }
}

use crate::ipc::helpers::{date_range, required_i64, required_str, to_json, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, ReportKind, SchoolData};
use rusqlite::Connection;
use serde_json::{json, Value};

fn build(conn: &Connection, params: &Value, kind: ReportKind) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let data = SchoolData::load(conn, school_id, date_range(params)?)?;
    tracing::debug!(school_id, kind = kind.as_str(), "generating report");
    to_json(&reports::generate(kind, &data))
}

fn reports_generate(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let raw = required_str(params, "kind")?;
    let kind = ReportKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = ReportKind::ALL.iter().map(|k| k.as_str()).collect();
        HandlerErr::bad_params(format!("unknown report kind: {}", raw))
            .with_details(json!({ "kind": raw, "known": known }))
    })?;
    build(conn, params, kind)
}

fn kind_for_method(method: &str) -> Option<ReportKind> {
    method.strip_prefix("reports.").and_then(ReportKind::parse)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    if req.method == "reports.generate" {
        return Some(with_db(state, req, reports_generate));
    }
    let kind = kind_for_method(&req.method)?;
    Some(with_db(state, req, |conn, params| build(conn, params, kind)))
}

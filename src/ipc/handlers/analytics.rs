use crate::ipc::helpers::{alert_thresholds, date_range, required_i64, to_json, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, SchoolData};
use rusqlite::Connection;
use serde_json::Value;

fn analytics_dashboard(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let data = SchoolData::load(conn, school_id, date_range(params)?)?;
    let dashboard = reports::dashboard(&data, &alert_thresholds(conn));
    tracing::debug!(school_id, alerts = dashboard.alerts.len(), "dashboard built");
    to_json(&dashboard)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "analytics.dashboard" => Some(with_db(state, req, analytics_dashboard)),
        _ => None,
    }
}

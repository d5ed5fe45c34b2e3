use crate::config::ALERT_THRESHOLDS_KEY;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{alert_thresholds, required_str, to_json, with_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::metrics::AlertThresholds;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (creating if needed) the workspace database and makes it current.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.to_string_lossy(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

/// Keys `settings.update` accepts, with the effective value when unset.
fn known_default(key: &str) -> Option<Value> {
    match key {
        ALERT_THRESHOLDS_KEY => serde_json::to_value(AlertThresholds::default()).ok(),
        _ => None,
    }
}

fn settings_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let key = required_str(params, "key")?;
    if key == ALERT_THRESHOLDS_KEY {
        return Ok(json!({ "key": key, "value": to_json(&alert_thresholds(conn))? }));
    }
    let stored = db::settings_get_json(conn, key)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:#}")))?;
    Ok(json!({ "key": key, "value": stored.or_else(|| known_default(key)) }))
}

fn settings_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let key = required_str(params, "key")?;
    if known_default(key).is_none() {
        return Err(HandlerErr::bad_params(format!("unknown setting: {}", key)));
    }
    let value = params
        .get("value")
        .ok_or_else(|| HandlerErr::bad_params("missing value"))?;

    let normalized = match key {
        ALERT_THRESHOLDS_KEY => {
            let t: AlertThresholds = serde_json::from_value(value.clone())
                .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e)))?;
            if !(0.0..=100.0).contains(&t.min_attendance_rate) || !(0.0..=5.0).contains(&t.min_behaviour) {
                return Err(HandlerErr::bad_params(
                    "minAttendanceRate must be within 0..=100 and minBehaviour within 0..=5",
                ));
            }
            to_json(&t)?
        }
        _ => value.clone(),
    };
    db::settings_set_json(conn, key, &normalized)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:#}")))?;
    tracing::info!(key, "setting updated");
    Ok(json!({ "key": key, "value": normalized }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "settings.get" => Some(with_db(state, req, settings_get)),
        "settings.update" => Some(with_db(state, req, settings_update)),
        _ => None,
    }
}

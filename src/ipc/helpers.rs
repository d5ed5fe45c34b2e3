use crate::config::ALERT_THRESHOLDS_KEY;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::metrics::AlertThresholds;
use crate::model::{parse_date, DateRange};
use crate::repo::{BatchError, StoreError};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let details = match &e {
            StoreError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            StoreError::SchoolMismatch {
                entity,
                id,
                school_id,
            } => Some(json!({ "entity": entity, "id": id, "schoolId": school_id })),
            StoreError::DuplicateSchool(name) => Some(json!({ "name": name })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<BatchError> for HandlerErr {
    fn from(e: BatchError) -> Self {
        let index = e.index;
        let mut out = HandlerErr::from(e.source);
        if let Some(i) = index {
            let mut details = out.details.take().unwrap_or_else(|| json!({}));
            details["index"] = json!(i);
            out.details = Some(details);
        }
        out
    }
}

pub fn reply(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

/// Runs `f` against the open workspace, or answers `no_workspace`.
pub fn with_db<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    reply(req, f(conn, &req.params))
}

/// Like [`with_db`], but a read with no workspace yields `empty` instead of an error.
pub fn read_or_empty<F>(state: &AppState, req: &Request, empty: Value, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    match state.db.as_ref() {
        Some(conn) => reply(req, f(conn, &req.params)),
        None => ok(&req.id, empty),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn to_date(key: &str, raw: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date(raw).ok_or_else(|| {
        HandlerErr::bad_params(format!("{} must be a YYYY-MM-DD date", key))
            .with_details(json!({ key: raw }))
    })
}

pub fn required_date(params: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    to_date(key, required_str(params, key)?)
}

/// Optional inclusive `start`/`end` bounds.
pub fn date_range(params: &Value) -> Result<DateRange, HandlerErr> {
    let start = optional_str(params, "start")
        .map(|s| to_date("start", s))
        .transpose()?;
    let end = optional_str(params, "end")
        .map(|s| to_date("end", s))
        .transpose()?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(HandlerErr::bad_params("start must not be after end"));
        }
    }
    Ok(DateRange { start, end })
}

/// Deserializes the whole params object into `T`; unknown keys are ignored.
pub fn fields<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone()).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

pub fn entries(params: &Value) -> Result<&[Value], HandlerErr> {
    params
        .get("entries")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .ok_or_else(|| HandlerErr::bad_params("missing entries"))
}

/// Deserializes one batch entry, tagging failures with its position.
pub fn entry<T: DeserializeOwned>(index: usize, raw: &Value) -> Result<T, HandlerErr> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        HandlerErr::bad_params(format!("entry {}: {}", index, e)).with_details(json!({ "index": index }))
    })
}

/// Destructive calls must carry `confirm: true`.
pub fn require_confirm(params: &Value) -> Result<(), HandlerErr> {
    if params.get("confirm").and_then(|v| v.as_bool()) == Some(true) {
        Ok(())
    } else {
        Err(HandlerErr::new(
            "confirmation_required",
            "this action is irreversible; pass confirm: true",
        ))
    }
}

/// Stored thresholds, falling back to the defaults when unset or unreadable.
pub fn alert_thresholds(conn: &Connection) -> AlertThresholds {
    match db::settings_get_json(conn, ALERT_THRESHOLDS_KEY) {
        Ok(Some(v)) => serde_json::from_value(v).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored alert thresholds are invalid; using defaults");
            AlertThresholds::default()
        }),
        Ok(None) => AlertThresholds::default(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read alert thresholds; using defaults");
            AlertThresholds::default()
        }
    }
}

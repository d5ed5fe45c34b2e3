use crate::export;
use crate::ipc::helpers::{
    optional_str, reply, required_i64, required_str, to_json, with_db, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::DateRange;
use crate::reports::SchoolData;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

fn export_preview(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let data = SchoolData::load(conn, school_id, DateRange::all())?;
    Ok(json!({
        "school": to_json(&data.school)?,
        "counts": to_json(&export::preview(&data))?,
    }))
}

fn export_workbook(
    conn: &Connection,
    params: &Value,
    workspace: Option<&Path>,
) -> Result<Value, HandlerErr> {
    let school_id = required_i64(params, "schoolId")?;
    let data = SchoolData::load(conn, school_id, DateRange::all())?;
    let out_path = match (optional_str(params, "outPath"), workspace) {
        (Some(p), _) => PathBuf::from(p),
        (None, Some(ws)) => ws
            .join("exports")
            .join(export::workbook_file_name(&data.school.name)),
        (None, None) => return Err(HandlerErr::bad_params("missing outPath")),
    };
    let summary = export::write_school_workbook(&data, &out_path)
        .map_err(|e| HandlerErr::new("export_failed", format!("{e:#}")))?;
    tracing::info!(
        school_id,
        path = %out_path.to_string_lossy(),
        export_id = %summary.export_id,
        "workbook exported"
    );
    to_json(&summary)
}

fn export_read_students(params: &Value) -> Result<Value, HandlerErr> {
    let path = required_str(params, "path")?;
    let rows = export::read_students_sheet(Path::new(path))
        .map_err(|e| HandlerErr::new("import_failed", format!("{e:#}")))?;
    Ok(json!({ "students": to_json(&rows)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "export.preview" => Some(with_db(state, req, export_preview)),
        "export.workbook" => {
            let workspace = state.workspace.clone();
            Some(with_db(state, req, |conn, params| {
                export_workbook(conn, params, workspace.as_deref())
            }))
        }
        "export.readStudents" => Some(reply(
            req,
            export_read_students(&req.params),
        )),
        _ => None,
    }
}

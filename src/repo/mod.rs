//! Typed access to the six record tables.
//!
//! Every function takes the connection explicitly. Reference checks
//! (school exists, student belongs to the school, ...) happen here because
//! SQLite foreign keys are not enforced on these tables.

pub mod admin;
pub mod assessments;
pub mod attendance;
pub mod schools;
pub mod students;
pub mod teachers;

use crate::model::{AttendanceStatus, DateRange};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("school already exists: {0}")]
    DuplicateSchool(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{entity} {id} does not belong to school {school_id}")]
    SchoolMismatch {
        entity: &'static str,
        id: i64,
        school_id: i64,
    },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateSchool(_) => "duplicate_name",
            StoreError::NotFound { .. } => "not_found",
            StoreError::SchoolMismatch { .. } => "school_mismatch",
            StoreError::Invalid(_) => "bad_params",
            StoreError::Db(_) => "db_query_failed",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        StoreError::Invalid(message.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl ToSql for AttendanceStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

pub(crate) fn ensure_school(conn: &Connection, school_id: i64) -> StoreResult<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM schools WHERE school_id = ?",
            [school_id],
            |r| r.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound {
            entity: "school",
            id: school_id,
        }),
    }
}

/// Looks up the owning school of a row and checks it against `school_id`.
fn ensure_owned(
    conn: &Connection,
    entity: &'static str,
    sql: &str,
    id: i64,
    school_id: i64,
) -> StoreResult<()> {
    let owner: Option<Option<i64>> = conn.query_row(sql, [id], |r| r.get(0)).optional()?;
    match owner {
        None => Err(StoreError::NotFound { entity, id }),
        Some(Some(s)) if s == school_id => Ok(()),
        Some(_) => Err(StoreError::SchoolMismatch {
            entity,
            id,
            school_id,
        }),
    }
}

pub(crate) fn ensure_student_in_school(
    conn: &Connection,
    student_id: i64,
    school_id: i64,
) -> StoreResult<()> {
    ensure_owned(
        conn,
        "student",
        "SELECT school_id FROM students WHERE student_id = ?",
        student_id,
        school_id,
    )
}

pub(crate) fn ensure_teacher_in_school(
    conn: &Connection,
    teacher_id: i64,
    school_id: i64,
) -> StoreResult<()> {
    ensure_owned(
        conn,
        "teacher",
        "SELECT school_id FROM teachers WHERE teacher_id = ?",
        teacher_id,
        school_id,
    )
}

/// Appends `AND date >= ? AND date <= ?` for the bounds that are set.
/// Comparison is on the stored text, which is always `YYYY-MM-DD`.
pub(crate) fn push_date_range(sql: &mut String, binds: &mut Vec<Value>, range: &DateRange) {
    if let Some(start) = range.start_key() {
        sql.push_str(" AND date >= ?");
        binds.push(Value::Text(start));
    }
    if let Some(end) = range.end_key() {
        sql.push_str(" AND date <= ?");
        binds.push(Value::Text(end));
    }
}

pub(crate) fn required_text(field: &str, value: &str) -> StoreResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(StoreError::invalid(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

/// A batch write that failed; nothing from the batch was kept.
/// `index` names the offending entry when the failure was entry-specific.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct BatchError {
    pub index: Option<usize>,
    #[source]
    pub source: StoreError,
}

impl BatchError {
    pub(crate) fn at(index: usize) -> impl FnOnce(StoreError) -> BatchError {
        move |source| BatchError {
            index: Some(index),
            source,
        }
    }
}

impl From<StoreError> for BatchError {
    fn from(source: StoreError) -> Self {
        BatchError {
            index: None,
            source,
        }
    }
}

impl From<rusqlite::Error> for BatchError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::from(e).into()
    }
}

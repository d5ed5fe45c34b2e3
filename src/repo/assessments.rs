use super::{
    ensure_school, ensure_student_in_school, push_date_range, required_text, BatchError,
    StoreError, StoreResult,
};
use crate::metrics;
use crate::model::{format_date, AssessmentRecord, DateRange, NewAssessment};
use chrono::NaiveDate;
use rusqlite::{params_from_iter, types::Value, Connection, Row};

/// Largest total a sitting may carry.
pub const MAX_TOTAL: i64 = 1_000_000;

const SELECT_COLUMNS: &str =
    "SELECT assessment_id, student_id, school_id, date, subject, marks, total, grade FROM assessments";

fn row_to_record(r: &Row<'_>) -> rusqlite::Result<AssessmentRecord> {
    Ok(AssessmentRecord {
        assessment_id: r.get(0)?,
        student_id: r.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        school_id: r.get::<_, Option<i64>>(2)?.unwrap_or_default(),
        date: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
        subject: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
        marks: r.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        total: r.get::<_, Option<i64>>(6)?.unwrap_or_default(),
        grade: r.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

/// One sitting: every entry shares date, subject and total.
#[derive(Debug, Clone)]
pub struct Sitting {
    pub date: NaiveDate,
    pub subject: String,
    pub total: i64,
}

fn check_sitting(sitting: &Sitting) -> StoreResult<String> {
    let subject = required_text("subject", &sitting.subject)?;
    if !(1..=MAX_TOTAL).contains(&sitting.total) {
        return Err(StoreError::invalid(format!(
            "total must be between 1 and {}",
            MAX_TOTAL
        )));
    }
    Ok(subject)
}

fn insert_one(
    conn: &Connection,
    school_id: i64,
    date: &str,
    subject: &str,
    total: i64,
    entry: &NewAssessment,
) -> StoreResult<i64> {
    if entry.marks < 0 || entry.marks > total {
        return Err(StoreError::invalid(format!(
            "marks must be between 0 and {}",
            total
        )));
    }
    ensure_student_in_school(conn, entry.student_id, school_id)?;
    let grade = metrics::letter_grade(entry.marks as f64, total as f64);
    conn.execute(
        "INSERT INTO assessments(student_id, school_id, date, subject, marks, total, grade)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            entry.student_id,
            school_id,
            date,
            subject,
            entry.marks,
            total,
            grade.as_str(),
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub fn insert(
    conn: &Connection,
    school_id: i64,
    sitting: &Sitting,
    entry: &NewAssessment,
) -> StoreResult<i64> {
    let subject = check_sitting(sitting)?;
    ensure_school(conn, school_id)?;
    insert_one(
        conn,
        school_id,
        &format_date(sitting.date),
        &subject,
        sitting.total,
        entry,
    )
}

pub fn insert_batch(
    conn: &Connection,
    school_id: i64,
    sitting: &Sitting,
    entries: &[NewAssessment],
) -> Result<Vec<i64>, BatchError> {
    let subject = check_sitting(sitting)?;
    ensure_school(conn, school_id)?;
    let date = format_date(sitting.date);
    let tx = conn.unchecked_transaction()?;
    let mut ids = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let id = insert_one(&tx, school_id, &date, &subject, sitting.total, entry)
            .map_err(BatchError::at(i))?;
        ids.push(id);
    }
    tx.commit()?;
    Ok(ids)
}

pub fn list_by_school(
    conn: &Connection,
    school_id: i64,
    range: &DateRange,
) -> StoreResult<Vec<AssessmentRecord>> {
    let mut sql = format!("{} WHERE school_id = ?", SELECT_COLUMNS);
    let mut binds = vec![Value::Integer(school_id)];
    push_date_range(&mut sql, &mut binds, range);
    sql.push_str(" ORDER BY assessment_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_by_student(conn: &Connection, student_id: i64) -> StoreResult<Vec<AssessmentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE student_id = ? ORDER BY date, assessment_id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map([student_id], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

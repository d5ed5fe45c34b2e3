use super::{ensure_school, ensure_student_in_school, push_date_range, BatchError, StoreError, StoreResult};
use crate::model::{
    format_date, AttendanceRecord, AttendanceStatus, DateRange, NewAttendance, MAX_BEHAVIOUR_SCORE,
    MIN_BEHAVIOUR_SCORE,
};
use chrono::NaiveDate;
use rusqlite::{params_from_iter, types::Value, Connection, Row};

const SELECT_COLUMNS: &str = "SELECT attendance_id, student_id, school_id, date, status, behaviour_score, behaviour_comment FROM attendance";

/// `None` for a row whose status is missing or not one of the known values.
fn row_to_record(r: &Row<'_>) -> rusqlite::Result<Option<AttendanceRecord>> {
    let attendance_id: i64 = r.get(0)?;
    let raw_status: Option<String> = r.get(4)?;
    let Some(status) = raw_status.as_deref().and_then(AttendanceStatus::parse) else {
        tracing::warn!(
            attendance_id,
            status = raw_status.as_deref().unwrap_or("NULL"),
            "skipping attendance row with unknown status"
        );
        return Ok(None);
    };
    Ok(Some(AttendanceRecord {
        attendance_id,
        student_id: r.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        school_id: r.get::<_, Option<i64>>(2)?.unwrap_or_default(),
        date: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
        status,
        behaviour_score: r.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        behaviour_comment: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
    }))
}

fn collect_rows<I>(rows: I) -> StoreResult<Vec<AttendanceRecord>>
where
    I: Iterator<Item = rusqlite::Result<Option<AttendanceRecord>>>,
{
    let mut out = Vec::new();
    for row in rows {
        if let Some(record) = row? {
            out.push(record);
        }
    }
    Ok(out)
}

fn check_score(score: i64) -> StoreResult<()> {
    if !(MIN_BEHAVIOUR_SCORE..=MAX_BEHAVIOUR_SCORE).contains(&score) {
        return Err(StoreError::invalid(format!(
            "behaviourScore must be between {} and {}",
            MIN_BEHAVIOUR_SCORE, MAX_BEHAVIOUR_SCORE
        )));
    }
    Ok(())
}

fn insert_one(
    conn: &Connection,
    school_id: i64,
    date: &str,
    entry: &NewAttendance,
) -> StoreResult<i64> {
    check_score(entry.behaviour_score)?;
    ensure_student_in_school(conn, entry.student_id, school_id)?;
    conn.execute(
        "INSERT INTO attendance(student_id, school_id, date, status, behaviour_score, behaviour_comment)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            entry.student_id,
            school_id,
            date,
            entry.status,
            entry.behaviour_score,
            &entry.comment,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub fn insert(
    conn: &Connection,
    school_id: i64,
    date: NaiveDate,
    entry: &NewAttendance,
) -> StoreResult<i64> {
    ensure_school(conn, school_id)?;
    insert_one(conn, school_id, &format_date(date), entry)
}

/// Writes one record per entry for `date`, all or nothing. Repeated
/// submissions for the same day accumulate.
pub fn insert_batch(
    conn: &Connection,
    school_id: i64,
    date: NaiveDate,
    entries: &[NewAttendance],
) -> Result<Vec<i64>, BatchError> {
    ensure_school(conn, school_id)?;
    let date = format_date(date);
    let tx = conn.unchecked_transaction()?;
    let mut ids = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let id = insert_one(&tx, school_id, &date, entry).map_err(BatchError::at(i))?;
        ids.push(id);
    }
    tx.commit()?;
    Ok(ids)
}

pub fn list_by_school(
    conn: &Connection,
    school_id: i64,
    range: &DateRange,
) -> StoreResult<Vec<AttendanceRecord>> {
    let mut sql = format!("{} WHERE school_id = ?", SELECT_COLUMNS);
    let mut binds = vec![Value::Integer(school_id)];
    push_date_range(&mut sql, &mut binds, range);
    sql.push_str(" ORDER BY attendance_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds), row_to_record)?;
    collect_rows(rows)
}

pub fn list_by_student(conn: &Connection, student_id: i64) -> StoreResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE student_id = ? ORDER BY date, attendance_id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt.query_map([student_id], row_to_record)?;
    collect_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{parse_date, AttendanceStatus, StudentFields};
    use crate::repo::{schools, students};

    fn student(conn: &Connection, school: i64, name: &str) -> i64 {
        students::insert(
            conn,
            school,
            &StudentFields {
                name: name.to_string(),
                age: 10,
                grade: "4".to_string(),
                ..Default::default()
            },
        )
        .expect("student")
    }

    fn entry(student_id: i64, status: AttendanceStatus, score: i64) -> NewAttendance {
        NewAttendance {
            student_id,
            status,
            behaviour_score: score,
            comment: String::new(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        parse_date(s).expect("date")
    }

    #[test]
    fn range_filter_is_inclusive_on_both_ends() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let s = student(&conn, school, "Amina");
        for d in ["2024-01-31", "2024-02-01", "2024-02-29", "2024-03-01"] {
            insert(&conn, school, day(d), &entry(s, AttendanceStatus::Present, 4)).expect("insert");
        }

        let feb = DateRange::between(day("2024-02-01"), day("2024-02-29"));
        let rows = list_by_school(&conn, school, &feb).expect("list");
        assert_eq!(
            rows.iter().map(|r| r.date.as_str()).collect::<Vec<_>>(),
            vec!["2024-02-01", "2024-02-29"]
        );
        assert_eq!(list_by_school(&conn, school, &DateRange::all()).expect("all").len(), 4);

        let open_end = DateRange {
            start: Some(day("2024-02-29")),
            end: None,
        };
        assert_eq!(list_by_school(&conn, school, &open_end).expect("open").len(), 2);
    }

    #[test]
    fn batch_is_atomic_and_reports_offending_entry() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let a = student(&conn, school, "A");
        let b = student(&conn, school, "B");

        let err = insert_batch(
            &conn,
            school,
            day("2024-05-02"),
            &[entry(a, AttendanceStatus::Present, 3), entry(b, AttendanceStatus::Late, 6)],
        )
        .expect_err("score out of range");
        assert_eq!(err.index, Some(1));
        assert!(matches!(err.source, StoreError::Invalid(_)));
        assert!(list_by_school(&conn, school, &DateRange::all()).expect("list").is_empty());

        let ids = insert_batch(
            &conn,
            school,
            day("2024-05-02"),
            &[entry(a, AttendanceStatus::Present, 3), entry(b, AttendanceStatus::Late, 5)],
        )
        .expect("batch");
        assert_eq!(ids.len(), 2);
        let rows = list_by_student(&conn, b).expect("by student");
        assert_eq!(rows[0].status, AttendanceStatus::Late);
    }

    #[test]
    fn duplicate_submissions_accumulate() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let a = student(&conn, school, "A");
        let e = [entry(a, AttendanceStatus::Absent, 2)];
        insert_batch(&conn, school, day("2024-05-02"), &e).expect("first");
        insert_batch(&conn, school, day("2024-05-02"), &e).expect("second");
        assert_eq!(list_by_student(&conn, a).expect("rows").len(), 2);
    }

    #[test]
    fn student_from_another_school_is_rejected() {
        let conn = db::open_in_memory().expect("db");
        let alpha = schools::insert(&conn, "Alpha").expect("alpha");
        let beta = schools::insert(&conn, "Beta").expect("beta");
        let a = student(&conn, alpha, "A");
        let e = insert(&conn, beta, day("2024-05-02"), &entry(a, AttendanceStatus::Present, 3))
            .expect_err("mismatch");
        assert_eq!(e.code(), "school_mismatch");
    }

    #[test]
    fn rows_with_unknown_status_are_skipped() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let a = student(&conn, school, "A");
        insert(&conn, school, day("2024-05-02"), &entry(a, AttendanceStatus::Present, 4)).expect("ok row");
        for status in [Some("Sick"), None] {
            conn.execute(
                "INSERT INTO attendance(student_id, school_id, date, status, behaviour_score, behaviour_comment)
                 VALUES(?, ?, '2024-05-03', ?, 3, '')",
                (a, school, status),
            )
            .expect("legacy row");
        }

        let rows = list_by_school(&conn, school, &DateRange::all()).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::Present);
        assert_eq!(list_by_student(&conn, a).expect("by student").len(), 1);
    }
}

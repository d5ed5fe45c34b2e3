use super::StoreResult;
use crate::db;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCounts {
    pub schools: i64,
    pub teachers: i64,
    pub students: i64,
    pub attendance_records: i64,
    pub assessment_records: i64,
}

fn count(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
}

pub fn status(conn: &Connection) -> StoreResult<SystemCounts> {
    Ok(SystemCounts {
        schools: count(conn, "schools")?,
        teachers: count(conn, "teachers")?,
        students: count(conn, "students")?,
        attendance_records: count(conn, "attendance")?,
        assessment_records: count(conn, "assessments")?,
    })
}

/// Deletes every row of `tables`, in order, inside one transaction.
fn wipe(conn: &Connection, tables: &[&str]) -> StoreResult<SystemCounts> {
    let before = status(conn)?;
    let tx = conn.unchecked_transaction()?;
    for table in tables {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }
    tx.commit()?;
    let after = status(conn)?;
    Ok(SystemCounts {
        schools: before.schools - after.schools,
        teachers: before.teachers - after.teachers,
        students: before.students - after.students,
        attendance_records: before.attendance_records - after.attendance_records,
        assessment_records: before.assessment_records - after.assessment_records,
    })
}

/// Students plus their attendance and assessment rows. Returns rows removed.
pub fn delete_all_students(conn: &Connection) -> StoreResult<SystemCounts> {
    wipe(conn, &["attendance", "assessments", "students"])
}

/// Teachers plus their assignments.
pub fn delete_all_teachers(conn: &Connection) -> StoreResult<SystemCounts> {
    wipe(conn, &["teacher_assignments", "teachers"])
}

/// Schools cascade to every dependent table.
pub fn delete_all_schools(conn: &Connection) -> StoreResult<SystemCounts> {
    wipe(conn, &db::TABLES)
}

/// Drops and recreates the record tables. Identifiers restart at 1.
pub fn reset_system(conn: &Connection) -> StoreResult<()> {
    let tx = conn.unchecked_transaction()?;
    db::drop_schema(&tx)?;
    db::create_schema(&tx)?;
    // Identifier counters restart with the tables.
    tx.execute("DELETE FROM sqlite_sequence", [])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        parse_date, AssignmentFields, AttendanceStatus, DateRange, NewAssessment, NewAttendance,
        StudentFields, TeacherFields,
    };
    use crate::repo::{assessments, attendance, schools, students, teachers};

    fn seed(conn: &Connection) -> i64 {
        let school = schools::insert(conn, "Alpha").expect("school");
        let s = students::insert(
            conn,
            school,
            &StudentFields {
                name: "Amina".to_string(),
                age: 11,
                grade: "5".to_string(),
                ..Default::default()
            },
        )
        .expect("student");
        let t = teachers::insert(
            conn,
            school,
            &TeacherFields {
                name: "Otieno".to_string(),
                ..Default::default()
            },
        )
        .expect("teacher");
        teachers::insert_assignment(
            conn,
            school,
            &AssignmentFields {
                teacher_id: t,
                class_grade: "5".to_string(),
                subject: "Math".to_string(),
                academic_year: None,
            },
        )
        .expect("assignment");
        let day = parse_date("2024-03-01").expect("date");
        attendance::insert(
            conn,
            school,
            day,
            &NewAttendance {
                student_id: s,
                status: AttendanceStatus::Present,
                behaviour_score: 4,
                comment: String::new(),
            },
        )
        .expect("attendance");
        assessments::insert(
            conn,
            school,
            &assessments::Sitting {
                date: day,
                subject: "Math".to_string(),
                total: 100,
            },
            &NewAssessment {
                student_id: s,
                marks: 92,
            },
        )
        .expect("assessment");
        school
    }

    #[test]
    fn deleting_schools_cascades_to_every_table() {
        let conn = db::open_in_memory().expect("db");
        let school = seed(&conn);
        let removed = delete_all_schools(&conn).expect("wipe");
        assert_eq!(removed.schools, 1);
        assert_eq!(removed.attendance_records, 1);

        assert!(students::list_by_school(&conn, school).expect("s").is_empty());
        assert!(teachers::list_by_school(&conn, school).expect("t").is_empty());
        assert!(teachers::list_assignments_by_school(&conn, school).expect("a").is_empty());
        assert!(attendance::list_by_school(&conn, school, &DateRange::all()).expect("att").is_empty());
        assert!(assessments::list_by_school(&conn, school, &DateRange::all()).expect("ass").is_empty());
    }

    #[test]
    fn deleting_students_keeps_teachers() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn);
        delete_all_students(&conn).expect("wipe");
        let counts = status(&conn).expect("status");
        assert_eq!(
            counts,
            SystemCounts {
                schools: 1,
                teachers: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn deleting_teachers_removes_assignments() {
        let conn = db::open_in_memory().expect("db");
        let school = seed(&conn);
        delete_all_teachers(&conn).expect("wipe");
        assert!(teachers::list_assignments_by_school(&conn, school).expect("a").is_empty());
        assert_eq!(status(&conn).expect("status").students, 1);
    }

    #[test]
    fn reset_restarts_identifiers() {
        let conn = db::open_in_memory().expect("db");
        seed(&conn);
        reset_system(&conn).expect("reset");
        assert_eq!(status(&conn).expect("status"), SystemCounts::default());
        assert_eq!(schools::insert(&conn, "Fresh").expect("insert"), 1);
    }
}

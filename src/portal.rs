//! Teacher and parent views over one teacher's classes or one student.

use crate::metrics;
use crate::model::{
    AssessmentRecord, AttendanceRecord, AttendanceStatus, NewAttendance, Student, Teacher,
    TeacherAssignment, DEFAULT_BEHAVIOUR_SCORE,
};
use crate::repo::{assessments, attendance, students, teachers, BatchError, StoreError, StoreResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPortal {
    pub teacher: Teacher,
    pub assignments: Vec<TeacherAssignment>,
    /// Distinct class labels, in assignment order.
    pub classes: Vec<String>,
    /// Set when a class was requested.
    pub students: Option<Vec<Student>>,
}

fn distinct_classes(assignments: &[TeacherAssignment]) -> Vec<String> {
    let mut seen = HashSet::new();
    assignments
        .iter()
        .filter(|a| seen.insert(a.class_grade.as_str()))
        .map(|a| a.class_grade.clone())
        .collect()
}

fn ensure_assigned(
    teacher_id: i64,
    assignments: &[TeacherAssignment],
    class_grade: &str,
) -> StoreResult<()> {
    if assignments.iter().any(|a| a.class_grade == class_grade) {
        Ok(())
    } else {
        Err(StoreError::invalid(format!(
            "teacher {} is not assigned to class {}",
            teacher_id, class_grade
        )))
    }
}

/// Rosters are only shown for classes the teacher is assigned to.
pub fn teacher_portal(
    conn: &Connection,
    teacher_id: i64,
    class_grade: Option<&str>,
) -> StoreResult<TeacherPortal> {
    let teacher = teachers::get(conn, teacher_id)?;
    let assignments = teachers::list_assignments_by_teacher(conn, teacher_id)?;
    let classes = distinct_classes(&assignments);
    let students = match class_grade {
        Some(grade) => {
            ensure_assigned(teacher_id, &assignments, grade)?;
            Some(students::list_by_grade(conn, teacher.school_id, grade)?)
        }
        None => None,
    };
    Ok(TeacherPortal {
        teacher,
        assignments,
        classes,
        students,
    })
}

/// Quick attendance for one of the teacher's classes. Behaviour is not
/// rated here, so every row gets the default score.
pub fn record_class_attendance(
    conn: &Connection,
    teacher_id: i64,
    class_grade: &str,
    date: NaiveDate,
    entries: &[(i64, AttendanceStatus)],
) -> Result<Vec<i64>, BatchError> {
    let teacher = teachers::get(conn, teacher_id)?;
    let assignments = teachers::list_assignments_by_teacher(conn, teacher_id)?;
    ensure_assigned(teacher_id, &assignments, class_grade)?;

    let roster: HashSet<i64> = students::list_by_grade(conn, teacher.school_id, class_grade)?
        .into_iter()
        .map(|s| s.student_id)
        .collect();
    let mut batch = Vec::with_capacity(entries.len());
    for (i, (student_id, status)) in entries.iter().enumerate() {
        if !roster.contains(student_id) {
            return Err(BatchError::at(i)(StoreError::invalid(format!(
                "student {} is not in class {}",
                student_id, class_grade
            ))));
        }
        batch.push(NewAttendance {
            student_id: *student_id,
            status: *status,
            behaviour_score: DEFAULT_BEHAVIOUR_SCORE,
            comment: String::new(),
        });
    }
    attendance::insert_batch(conn, teacher.school_id, date, &batch)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentPortal {
    pub student: Student,
    pub assessments: Vec<AssessmentRecord>,
    pub attendance: Vec<AttendanceRecord>,
    /// `None` when the student has no attendance records yet.
    pub attendance_rate: Option<f64>,
}

pub fn parent_portal(conn: &Connection, student_id: i64) -> StoreResult<ParentPortal> {
    let student = students::get(conn, student_id)?;
    let assessments = assessments::list_by_student(conn, student_id)?;
    let attendance = attendance::list_by_student(conn, student_id)?;
    let attendance_rate = (!attendance.is_empty())
        .then(|| metrics::round_to(metrics::attendance_rate(&attendance), 1));
    Ok(ParentPortal {
        student,
        assessments,
        attendance,
        attendance_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{parse_date, AssignmentFields, StudentFields, TeacherFields};
    use crate::repo::schools;

    struct Fixture {
        conn: Connection,
        teacher: i64,
        in_class: i64,
        other_class: i64,
    }

    fn fixture() -> Fixture {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let add = |name: &str, grade: &str| {
            students::insert(
                &conn,
                school,
                &StudentFields {
                    name: name.to_string(),
                    age: 11,
                    grade: grade.to_string(),
                    ..Default::default()
                },
            )
            .expect("student")
        };
        let in_class = add("Amina", "5");
        let other_class = add("Baraka", "6");
        let teacher = teachers::insert(
            &conn,
            school,
            &TeacherFields {
                name: "Otieno".to_string(),
                subject: "Math".to_string(),
                ..Default::default()
            },
        )
        .expect("teacher");
        for subject in ["Math", "Science"] {
            teachers::insert_assignment(
                &conn,
                school,
                &AssignmentFields {
                    teacher_id: teacher,
                    class_grade: "5".to_string(),
                    subject: subject.to_string(),
                    academic_year: None,
                },
            )
            .expect("assignment");
        }
        Fixture {
            conn,
            teacher,
            in_class,
            other_class,
        }
    }

    #[test]
    fn teacher_portal_lists_distinct_classes_and_roster() {
        let f = fixture();
        let view = teacher_portal(&f.conn, f.teacher, Some("5")).expect("portal");
        assert_eq!(view.assignments.len(), 2);
        assert_eq!(view.classes, vec!["5".to_string()]);
        let roster = view.students.expect("roster");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].student_id, f.in_class);

        let bare = teacher_portal(&f.conn, f.teacher, None).expect("portal");
        assert!(bare.students.is_none());
    }

    #[test]
    fn teacher_portal_refuses_unassigned_class() {
        let f = fixture();
        let err = teacher_portal(&f.conn, f.teacher, Some("6")).expect_err("unassigned");
        assert_eq!(err.code(), "bad_params");
    }

    #[test]
    fn class_attendance_uses_each_students_status() {
        let f = fixture();
        let day = parse_date("2024-04-02").expect("date");
        record_class_attendance(&f.conn, f.teacher, "5", day, &[(f.in_class, AttendanceStatus::Late)])
            .expect("record");
        let view = parent_portal(&f.conn, f.in_class).expect("parent");
        assert_eq!(view.attendance.len(), 1);
        assert_eq!(view.attendance[0].status, AttendanceStatus::Late);
        assert_eq!(view.attendance[0].behaviour_score, DEFAULT_BEHAVIOUR_SCORE);
        assert_eq!(view.attendance_rate, Some(0.0));
    }

    #[test]
    fn class_attendance_rejects_students_outside_the_class() {
        let f = fixture();
        let day = parse_date("2024-04-02").expect("date");
        let err = record_class_attendance(
            &f.conn,
            f.teacher,
            "5",
            day,
            &[
                (f.in_class, AttendanceStatus::Present),
                (f.other_class, AttendanceStatus::Present),
            ],
        )
        .expect_err("wrong class");
        assert_eq!(err.index, Some(1));
        assert!(parent_portal(&f.conn, f.in_class).expect("parent").attendance.is_empty());

        let err = record_class_attendance(&f.conn, f.teacher, "6", day, &[])
            .expect_err("unassigned class");
        assert_eq!(err.index, None);
        assert_eq!(err.source.code(), "bad_params");
    }

    #[test]
    fn parent_portal_without_records() {
        let f = fixture();
        let view = parent_portal(&f.conn, f.other_class).expect("parent");
        assert!(view.assessments.is_empty());
        assert_eq!(view.attendance_rate, None);
        assert_eq!(
            parent_portal(&f.conn, 999).expect_err("missing").code(),
            "not_found"
        );
    }
}

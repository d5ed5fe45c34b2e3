use super::{ensure_school, ensure_teacher_in_school, required_text, StoreError, StoreResult};
use crate::model::{
    format_date, parse_date, AssignmentFields, Teacher, TeacherAssignment, TeacherFields,
    DEFAULT_ACADEMIC_YEAR, DEFAULT_TEACHER_STATUS,
};
use rusqlite::{Connection, OptionalExtension, Row};

const SELECT_TEACHERS: &str = "SELECT teacher_id, school_id, name, email, phone, subject, qualification, join_date, COALESCE(status, 'Active') FROM teachers";

const SELECT_ASSIGNMENTS: &str = "SELECT assignment_id, teacher_id, school_id, class_grade, subject, academic_year FROM teacher_assignments";

fn text(r: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(r.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn row_to_teacher(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        teacher_id: r.get(0)?,
        school_id: r.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        name: text(r, 2)?,
        email: text(r, 3)?,
        phone: text(r, 4)?,
        subject: text(r, 5)?,
        qualification: text(r, 6)?,
        join_date: text(r, 7)?,
        status: text(r, 8)?,
    })
}

fn row_to_assignment(r: &Row<'_>) -> rusqlite::Result<TeacherAssignment> {
    Ok(TeacherAssignment {
        assignment_id: r.get(0)?,
        teacher_id: r.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        school_id: r.get::<_, Option<i64>>(2)?.unwrap_or_default(),
        class_grade: text(r, 3)?,
        subject: text(r, 4)?,
        academic_year: text(r, 5)?,
    })
}

struct NormalizedTeacher {
    name: String,
    join_date: String,
    status: String,
}

fn normalize(fields: &TeacherFields) -> StoreResult<NormalizedTeacher> {
    let name = required_text("name", &fields.name)?;
    let join_date = match fields.join_date.as_deref().map(str::trim) {
        None | Some("") => format_date(chrono::Local::now().date_naive()),
        Some(raw) => parse_date(raw)
            .map(format_date)
            .ok_or_else(|| StoreError::invalid("joinDate must be YYYY-MM-DD"))?,
    };
    let status = match fields.status.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_TEACHER_STATUS.to_string(),
        Some(s) => s.to_string(),
    };
    Ok(NormalizedTeacher {
        name,
        join_date,
        status,
    })
}

pub fn insert(conn: &Connection, school_id: i64, fields: &TeacherFields) -> StoreResult<i64> {
    let n = normalize(fields)?;
    ensure_school(conn, school_id)?;
    conn.execute(
        "INSERT INTO teachers(school_id, name, email, phone, subject, qualification, join_date, status)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            school_id,
            &n.name,
            &fields.email,
            &fields.phone,
            &fields.subject,
            &fields.qualification,
            &n.join_date,
            &n.status,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_by_school(conn: &Connection, school_id: i64) -> StoreResult<Vec<Teacher>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE school_id = ? ORDER BY teacher_id",
        SELECT_TEACHERS
    ))?;
    let rows = stmt
        .query_map([school_id], row_to_teacher)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, teacher_id: i64) -> StoreResult<Teacher> {
    conn.query_row(
        &format!("{} WHERE teacher_id = ?", SELECT_TEACHERS),
        [teacher_id],
        row_to_teacher,
    )
    .optional()?
    .ok_or(StoreError::NotFound {
        entity: "teacher",
        id: teacher_id,
    })
}

pub fn update(conn: &Connection, teacher_id: i64, fields: &TeacherFields) -> StoreResult<()> {
    let n = normalize(fields)?;
    let changed = conn.execute(
        "UPDATE teachers
         SET name = ?, email = ?, phone = ?, subject = ?, qualification = ?, join_date = ?, status = ?
         WHERE teacher_id = ?",
        (
            &n.name,
            &fields.email,
            &fields.phone,
            &fields.subject,
            &fields.qualification,
            &n.join_date,
            &n.status,
            teacher_id,
        ),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "teacher",
            id: teacher_id,
        });
    }
    Ok(())
}

/// Removes the teacher row only; assignments are kept and drop out of
/// workload reports because they no longer join to a teacher.
pub fn delete(conn: &Connection, teacher_id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM teachers WHERE teacher_id = ?", [teacher_id])?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "teacher",
            id: teacher_id,
        });
    }
    Ok(())
}

/// Appends an assignment. Repeats of the same class and subject are allowed.
pub fn insert_assignment(
    conn: &Connection,
    school_id: i64,
    fields: &AssignmentFields,
) -> StoreResult<i64> {
    let class_grade = required_text("classGrade", &fields.class_grade)?;
    let subject = required_text("subject", &fields.subject)?;
    let academic_year = match fields.academic_year.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_ACADEMIC_YEAR.to_string(),
        Some(y) => y.to_string(),
    };
    ensure_school(conn, school_id)?;
    ensure_teacher_in_school(conn, fields.teacher_id, school_id)?;
    conn.execute(
        "INSERT INTO teacher_assignments(teacher_id, school_id, class_grade, subject, academic_year)
         VALUES(?, ?, ?, ?, ?)",
        (
            fields.teacher_id,
            school_id,
            &class_grade,
            &subject,
            &academic_year,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_assignments_by_school(
    conn: &Connection,
    school_id: i64,
) -> StoreResult<Vec<TeacherAssignment>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE school_id = ? ORDER BY assignment_id",
        SELECT_ASSIGNMENTS
    ))?;
    let rows = stmt
        .query_map([school_id], row_to_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_assignments_by_teacher(
    conn: &Connection,
    teacher_id: i64,
) -> StoreResult<Vec<TeacherAssignment>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE teacher_id = ? ORDER BY assignment_id",
        SELECT_ASSIGNMENTS
    ))?;
    let rows = stmt
        .query_map([teacher_id], row_to_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

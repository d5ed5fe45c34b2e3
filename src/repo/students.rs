use super::{ensure_school, required_text, StoreError, StoreResult};
use crate::model::{Student, StudentFields};
use rusqlite::{Connection, OptionalExtension, Row};

pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 30;

const SELECT_COLUMNS: &str =
    "SELECT student_id, school_id, name, age, grade, parent_name, parent_contact FROM students";

fn row_to_student(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        student_id: r.get(0)?,
        school_id: r.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        name: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
        age: r.get::<_, Option<i64>>(3)?.unwrap_or_default(),
        grade: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
        parent_name: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
        parent_contact: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}

fn validate(fields: &StudentFields) -> StoreResult<String> {
    let name = required_text("name", &fields.name)?;
    if !(MIN_AGE..=MAX_AGE).contains(&fields.age) {
        return Err(StoreError::invalid(format!(
            "age must be between {} and {}",
            MIN_AGE, MAX_AGE
        )));
    }
    Ok(name)
}

pub fn insert(conn: &Connection, school_id: i64, fields: &StudentFields) -> StoreResult<i64> {
    let name = validate(fields)?;
    ensure_school(conn, school_id)?;
    conn.execute(
        "INSERT INTO students(school_id, name, age, grade, parent_name, parent_contact)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            school_id,
            &name,
            fields.age,
            &fields.grade,
            &fields.parent_name,
            &fields.parent_contact,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_by_school(conn: &Connection, school_id: i64) -> StoreResult<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE school_id = ? ORDER BY student_id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map([school_id], row_to_student)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Students of a school whose class label equals `grade` exactly.
pub fn list_by_grade(conn: &Connection, school_id: i64, grade: &str) -> StoreResult<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE school_id = ? AND grade = ? ORDER BY student_id",
        SELECT_COLUMNS
    ))?;
    let rows = stmt
        .query_map((school_id, grade), row_to_student)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, student_id: i64) -> StoreResult<Student> {
    conn.query_row(
        &format!("{} WHERE student_id = ?", SELECT_COLUMNS),
        [student_id],
        row_to_student,
    )
    .optional()?
    .ok_or(StoreError::NotFound {
        entity: "student",
        id: student_id,
    })
}

pub fn update(conn: &Connection, student_id: i64, fields: &StudentFields) -> StoreResult<()> {
    let name = validate(fields)?;
    let changed = conn.execute(
        "UPDATE students
         SET name = ?, age = ?, grade = ?, parent_name = ?, parent_contact = ?
         WHERE student_id = ?",
        (
            &name,
            fields.age,
            &fields.grade,
            &fields.parent_name,
            &fields.parent_contact,
            student_id,
        ),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "student",
            id: student_id,
        });
    }
    Ok(())
}

/// Removes the student row only. Attendance and assessment rows that point
/// at it stay behind and surface as ungraded in reports.
pub fn delete(conn: &Connection, student_id: i64) -> StoreResult<()> {
    let changed = conn.execute("DELETE FROM students WHERE student_id = ?", [student_id])?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            entity: "student",
            id: student_id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::repo::schools;

    fn fields(name: &str, grade: &str) -> StudentFields {
        StudentFields {
            name: name.to_string(),
            age: 11,
            grade: grade.to_string(),
            parent_name: "Parent".to_string(),
            parent_contact: "0700".to_string(),
        }
    }

    #[test]
    fn crud_lifecycle() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let a = insert(&conn, school, &fields("Amina", "5")).expect("a");
        let b = insert(&conn, school, &fields("Baraka", "6")).expect("b");

        let listed = list_by_school(&conn, school).expect("list");
        assert_eq!(
            listed.iter().map(|s| s.student_id).collect::<Vec<_>>(),
            vec![a, b]
        );

        update(&conn, b, &fields("Baraka O.", "5")).expect("update");
        assert_eq!(get(&conn, b).expect("get").name, "Baraka O.");
        assert_eq!(list_by_grade(&conn, school, "5").expect("grade").len(), 2);

        delete(&conn, a).expect("delete");
        assert!(matches!(get(&conn, a), Err(StoreError::NotFound { .. })));
        assert!(matches!(delete(&conn, a), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn insert_checks_school_and_form_limits() {
        let conn = db::open_in_memory().expect("db");
        assert!(matches!(
            insert(&conn, 99, &fields("Ghost", "1")),
            Err(StoreError::NotFound { entity: "school", .. })
        ));
        let school = schools::insert(&conn, "Alpha").expect("school");
        let mut f = fields("Old", "1");
        f.age = 31;
        assert!(matches!(insert(&conn, school, &f), Err(StoreError::Invalid(_))));
        assert!(matches!(
            insert(&conn, school, &fields(" ", "1")),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn grade_match_is_exact_text() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        insert(&conn, school, &fields("A", "5")).expect("a");
        insert(&conn, school, &fields("B", "Grade 5")).expect("b");
        assert_eq!(list_by_grade(&conn, school, "5").expect("grade").len(), 1);
    }
}

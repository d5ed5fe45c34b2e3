use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "school_records.sqlite3";

/// Tables in the order a full wipe has to visit them (dependents first).
pub const TABLES: [&str; 6] = [
    "attendance",
    "assessments",
    "teacher_assignments",
    "students",
    "teachers",
    "schools",
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    create_schema(&conn).context("failed to create schema")?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Foreign keys are declared for documentation only. `PRAGMA foreign_keys`
/// stays off, so every reference check lives in the repository layer.
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            school_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id INTEGER PRIMARY KEY AUTOINCREMENT,
            school_id INTEGER,
            name TEXT,
            age INTEGER,
            grade TEXT,
            parent_name TEXT,
            parent_contact TEXT,
            FOREIGN KEY(school_id) REFERENCES schools(school_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_school ON students(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            attendance_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            school_id INTEGER,
            date TEXT,
            status TEXT,
            behaviour_score INTEGER,
            behaviour_comment TEXT,
            FOREIGN KEY(student_id) REFERENCES students(student_id),
            FOREIGN KEY(school_id) REFERENCES schools(school_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_school_date ON attendance(school_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            assessment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            school_id INTEGER,
            date TEXT,
            subject TEXT,
            marks INTEGER,
            total INTEGER,
            grade TEXT,
            FOREIGN KEY(student_id) REFERENCES students(student_id),
            FOREIGN KEY(school_id) REFERENCES schools(school_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_school_date ON assessments(school_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_student ON assessments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            teacher_id INTEGER PRIMARY KEY AUTOINCREMENT,
            school_id INTEGER,
            name TEXT,
            email TEXT,
            phone TEXT,
            subject TEXT,
            qualification TEXT,
            join_date TEXT,
            status TEXT DEFAULT 'Active',
            FOREIGN KEY(school_id) REFERENCES schools(school_id)
        )",
        [],
    )?;
    // Workspaces created before teachers had a status column.
    ensure_teachers_status(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_school ON teachers(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_assignments(
            assignment_id INTEGER PRIMARY KEY AUTOINCREMENT,
            teacher_id INTEGER,
            school_id INTEGER,
            class_grade TEXT,
            subject TEXT,
            academic_year TEXT,
            FOREIGN KEY(teacher_id) REFERENCES teachers(teacher_id),
            FOREIGN KEY(school_id) REFERENCES schools(school_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_assignments_school ON teacher_assignments(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Drops the six record tables. Settings survive a reset.
pub fn drop_schema(conn: &Connection) -> rusqlite::Result<()> {
    for table in TABLES {
        conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
    }
    Ok(())
}

fn ensure_teachers_status(conn: &Connection) -> rusqlite::Result<()> {
    if table_has_column(conn, "teachers", "status")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE teachers ADD COLUMN status TEXT DEFAULT 'Active'",
        [],
    )?;
    conn.execute(
        "UPDATE teachers SET status = 'Active' WHERE status IS NULL",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_creation_is_idempotent() {
        let conn = open_in_memory().expect("open");
        create_schema(&conn).expect("second pass");
        for table in TABLES {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
                .expect("count");
            assert_eq!(n, 0, "{}", table);
        }
    }

    #[test]
    fn legacy_teachers_table_gains_status() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute(
            "CREATE TABLE teachers(
                teacher_id INTEGER PRIMARY KEY AUTOINCREMENT,
                school_id INTEGER,
                name TEXT,
                email TEXT,
                phone TEXT,
                subject TEXT,
                qualification TEXT,
                join_date TEXT
            )",
            [],
        )
        .expect("legacy table");
        conn.execute("INSERT INTO teachers(school_id, name) VALUES(1, 'Old')", [])
            .expect("legacy row");
        create_schema(&conn).expect("upgrade");
        let status: String = conn
            .query_row("SELECT status FROM teachers", [], |r| r.get(0))
            .expect("status");
        assert_eq!(status, "Active");
    }

    #[test]
    fn settings_roundtrip_and_overwrite() {
        let conn = open_in_memory().expect("open");
        assert!(settings_get_json(&conn, "k").expect("get").is_none());
        settings_set_json(&conn, "k", &json!({ "a": 1 })).expect("set");
        settings_set_json(&conn, "k", &json!({ "a": 2 })).expect("overwrite");
        assert_eq!(settings_get_json(&conn, "k").expect("get"), Some(json!({ "a": 2 })));
    }

    #[test]
    fn drop_schema_keeps_settings() {
        let conn = open_in_memory().expect("open");
        settings_set_json(&conn, "k", &json!(true)).expect("set");
        drop_schema(&conn).expect("drop");
        create_schema(&conn).expect("recreate");
        assert_eq!(settings_get_json(&conn, "k").expect("get"), Some(json!(true)));
    }
}

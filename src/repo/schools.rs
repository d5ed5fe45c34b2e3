use super::{required_text, StoreError, StoreResult};
use crate::model::School;
use rusqlite::{Connection, ErrorCode};

pub fn insert(conn: &Connection, name: &str) -> StoreResult<i64> {
    let name = required_text("name", name)?;
    match conn.execute("INSERT INTO schools(name) VALUES(?)", [&name]) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(StoreError::DuplicateSchool(name))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn list(conn: &Connection) -> StoreResult<Vec<School>> {
    let mut stmt = conn.prepare("SELECT school_id, name FROM schools ORDER BY school_id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(School {
                school_id: r.get(0)?,
                name: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, school_id: i64) -> StoreResult<School> {
    conn.query_row(
        "SELECT school_id, name FROM schools WHERE school_id = ?",
        [school_id],
        |r| {
            Ok(School {
                school_id: r.get(0)?,
                name: r.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
            entity: "school",
            id: school_id,
        },
        other => other.into(),
    })
}

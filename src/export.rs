//! Per-school workbook export: a zip of CSV sheets plus a manifest that
//! records row counts and a SHA-256 for every sheet.

use crate::metrics;
use crate::model::Student;
use crate::reports::SchoolData;
use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const WORKBOOK_FORMAT: &str = "schoolbook-v1";
pub const WORKBOOK_SUFFIX: &str = ".schoolbook.zip";

const STUDENT_COLUMNS: [&str; 7] = [
    "student_id",
    "school_id",
    "name",
    "age",
    "grade",
    "parent_name",
    "parent_contact",
];
const ATTENDANCE_COLUMNS: [&str; 7] = [
    "attendance_id",
    "student_id",
    "school_id",
    "date",
    "status",
    "behaviour_score",
    "behaviour_comment",
];
const ASSESSMENT_COLUMNS: [&str; 8] = [
    "assessment_id",
    "student_id",
    "school_id",
    "date",
    "subject",
    "marks",
    "total",
    "grade",
];
const TEACHER_COLUMNS: [&str; 9] = [
    "teacher_id",
    "school_id",
    "name",
    "email",
    "phone",
    "subject",
    "qualification",
    "join_date",
    "status",
];
const ASSIGNMENT_COLUMNS: [&str; 6] = [
    "assignment_id",
    "teacher_id",
    "school_id",
    "class_grade",
    "subject",
    "academic_year",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPreview {
    pub students: usize,
    pub teachers: usize,
    pub attendance_records: usize,
    pub assessment_records: usize,
    pub assignments: usize,
}

pub fn preview(data: &SchoolData) -> ExportPreview {
    ExportPreview {
        students: data.students.len(),
        teachers: data.teachers.len(),
        attendance_records: data.attendance.len(),
        assessment_records: data.assessments.len(),
        assignments: data.assignments.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub name: String,
    pub entry: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub path: PathBuf,
    pub export_id: String,
    pub format: &'static str,
    pub sheets: Vec<SheetInfo>,
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

struct Sheet {
    name: &'static str,
    rows: usize,
    text: String,
}

impl Sheet {
    fn new(name: &'static str, columns: &[&str]) -> Self {
        let mut text = columns.join(",");
        text.push_str("\r\n");
        Self {
            name,
            rows: 0,
            text,
        }
    }

    fn push(&mut self, cells: &[String]) {
        let line: Vec<String> = cells.iter().map(|c| csv_quote(c)).collect();
        self.text.push_str(&line.join(","));
        self.text.push_str("\r\n");
        self.rows += 1;
    }

    fn entry(&self) -> String {
        format!("sheets/{}.csv", self.name)
    }
}

fn or_na(present: bool, value: impl FnOnce() -> String) -> String {
    if present {
        value()
    } else {
        "N/A".to_string()
    }
}

fn build_sheets(data: &SchoolData) -> Vec<Sheet> {
    let mut students = Sheet::new("Students", &STUDENT_COLUMNS);
    for s in &data.students {
        students.push(&[
            s.student_id.to_string(),
            s.school_id.to_string(),
            s.name.clone(),
            s.age.to_string(),
            s.grade.clone(),
            s.parent_name.clone(),
            s.parent_contact.clone(),
        ]);
    }

    let mut attendance = Sheet::new("Attendance", &ATTENDANCE_COLUMNS);
    for r in &data.attendance {
        attendance.push(&[
            r.attendance_id.to_string(),
            r.student_id.to_string(),
            r.school_id.to_string(),
            r.date.clone(),
            r.status.as_str().to_string(),
            r.behaviour_score.to_string(),
            r.behaviour_comment.clone(),
        ]);
    }

    let mut assessments = Sheet::new("Assessments", &ASSESSMENT_COLUMNS);
    for r in &data.assessments {
        assessments.push(&[
            r.assessment_id.to_string(),
            r.student_id.to_string(),
            r.school_id.to_string(),
            r.date.clone(),
            r.subject.clone(),
            r.marks.to_string(),
            r.total.to_string(),
            r.grade.clone(),
        ]);
    }

    let mut teachers = Sheet::new("Teachers", &TEACHER_COLUMNS);
    for t in &data.teachers {
        teachers.push(&[
            t.teacher_id.to_string(),
            t.school_id.to_string(),
            t.name.clone(),
            t.email.clone(),
            t.phone.clone(),
            t.subject.clone(),
            t.qualification.clone(),
            t.join_date.clone(),
            t.status.clone(),
        ]);
    }

    let mut assignments = Sheet::new("Assignments", &ASSIGNMENT_COLUMNS);
    for a in &data.assignments {
        assignments.push(&[
            a.assignment_id.to_string(),
            a.teacher_id.to_string(),
            a.school_id.to_string(),
            a.class_grade.clone(),
            a.subject.clone(),
            a.academic_year.clone(),
        ]);
    }

    let has_attendance = !data.attendance.is_empty();
    let has_assessments = !data.assessments.is_empty();
    let mut summary = Sheet::new("Summary", &["Metric", "Value"]);
    for (metric, value) in [
        ("Total Students", data.students.len().to_string()),
        ("Total Teachers", data.teachers.len().to_string()),
        ("Total Attendance Records", data.attendance.len().to_string()),
        ("Total Assessment Records", data.assessments.len().to_string()),
        (
            "Average Attendance Rate",
            or_na(has_attendance, || {
                format!("{:.1}%", metrics::attendance_rate(&data.attendance))
            }),
        ),
        (
            "Average Behaviour Score",
            or_na(has_attendance, || {
                format!("{:.1}/5", metrics::average_behaviour(&data.attendance))
            }),
        ),
        (
            "Average Marks",
            or_na(has_assessments, || {
                format!("{:.1}%", metrics::average_marks(&data.assessments))
            }),
        ),
    ] {
        summary.push(&[metric.to_string(), value]);
    }

    vec![students, attendance, assessments, teachers, assignments, summary]
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `data` as a workbook at `out_path`. Callers pass an unfiltered snapshot.
pub fn write_school_workbook(data: &SchoolData, out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let sheets = build_sheets(data);
    let infos: Vec<SheetInfo> = sheets
        .iter()
        .map(|s| SheetInfo {
            name: s.name.to_string(),
            entry: s.entry(),
            rows: s.rows,
            sha256: sha256_hex(s.text.as_bytes()),
        })
        .collect();

    let export_id = Uuid::new_v4().to_string();
    let manifest = serde_json::json!({
        "format": WORKBOOK_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportId": export_id,
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "school": data.school,
        "sheets": infos,
    });

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for sheet in &sheets {
        zip.start_file(sheet.entry(), opts)
            .with_context(|| format!("failed to start sheet {}", sheet.name))?;
        zip.write_all(sheet.text.as_bytes())
            .with_context(|| format!("failed to write sheet {}", sheet.name))?;
    }
    zip.finish().context("failed to finalize workbook")?;

    Ok(ExportSummary {
        path: out_path.to_path_buf(),
        export_id,
        format: WORKBOOK_FORMAT,
        sheets: infos,
    })
}

/// Default file name for a school's workbook.
pub fn workbook_file_name(school_name: &str) -> String {
    let stem: String = school_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_Complete_Report{}", stem, WORKBOOK_SUFFIX)
}

/// Splits CSV text into records. Quoted fields may span lines.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => record.push(std::mem::take(&mut buf)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut buf));
                records.push(std::mem::take(&mut record));
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() || !record.is_empty() {
        record.push(buf);
        records.push(record);
    }
    records
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> anyhow::Result<String> {
    let mut text = String::new();
    archive
        .by_name(name)
        .with_context(|| format!("workbook missing {}", name))?
        .read_to_string(&mut text)
        .with_context(|| format!("failed to read {}", name))?;
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct Manifest {
    format: String,
    sheets: Vec<SheetInfo>,
}

fn parse_i64(field: &str, value: &str, line: usize) -> anyhow::Result<i64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("line {}: {} is not an integer: {:?}", line, field, value))
}

/// Reads the Students sheet back, checking it against the manifest digest.
pub fn read_students_sheet(path: &Path) -> anyhow::Result<Vec<Student>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open workbook {}", path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(file).context("invalid zip archive")?;

    let manifest: Manifest = serde_json::from_str(&read_entry(&mut archive, MANIFEST_ENTRY)?)
        .context("manifest.json is invalid")?;
    if manifest.format != WORKBOOK_FORMAT {
        bail!("unsupported workbook format: {}", manifest.format);
    }
    let info = manifest
        .sheets
        .iter()
        .find(|s| s.name == "Students")
        .ok_or_else(|| anyhow!("manifest lists no Students sheet"))?;

    let text = read_entry(&mut archive, &info.entry)?;
    let digest = sha256_hex(text.as_bytes());
    if digest != info.sha256 {
        bail!("Students sheet checksum mismatch");
    }

    let mut records = parse_csv(&text).into_iter();
    let header = records.next().unwrap_or_default();
    if header != STUDENT_COLUMNS {
        bail!("unexpected Students header: {}", header.join(","));
    }

    let mut out = Vec::new();
    for (i, rec) in records.enumerate() {
        let line = i + 2;
        let [student_id, school_id, name, age, grade, parent_name, parent_contact]: [String; 7] =
            rec.try_into().map_err(|r: Vec<String>| {
                anyhow!("line {}: expected 7 columns, found {}", line, r.len())
            })?;
        out.push(Student {
            student_id: parse_i64("student_id", &student_id, line)?,
            school_id: parse_i64("school_id", &school_id, line)?,
            name,
            age: parse_i64("age", &age, line)?,
            grade,
            parent_name,
            parent_contact,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::{DateRange, StudentFields};
    use crate::repo::{schools, students};
    use rusqlite::Connection;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn export_school(conn: &Connection, school_id: i64, out: &Path) -> anyhow::Result<ExportSummary> {
        let data = SchoolData::load(conn, school_id, DateRange::all())?;
        write_school_workbook(&data, out)
    }

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}", prefix, nanos));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn students_sheet_round_trips() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        for (name, grade, contact) in [
            ("Amina", "5", "0700 000 001"),
            ("O'Neil, Baraka", "Grade \"6\"", "line one\nline two"),
        ] {
            students::insert(
                &conn,
                school,
                &StudentFields {
                    name: name.to_string(),
                    age: 12,
                    grade: grade.to_string(),
                    parent_name: "Parent".to_string(),
                    parent_contact: contact.to_string(),
                },
            )
            .expect("student");
        }

        let dir = temp_dir("schoold-export");
        let out = dir.join(workbook_file_name("Alpha"));
        let summary = export_school(&conn, school, &out).expect("export");
        assert_eq!(summary.sheets.len(), 6);
        assert_eq!(summary.sheets[0].rows, 2);

        let back = read_students_sheet(&out).expect("read back");
        assert_eq!(back, students::list_by_school(&conn, school).expect("list"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_school_exports_header_only_sheets_and_na_summary() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Empty").expect("school");
        let data = SchoolData::load(&conn, school, DateRange::all()).expect("load");
        let sheets = build_sheets(&data);
        for sheet in &sheets[..5] {
            assert_eq!(sheet.rows, 0);
            assert_eq!(sheet.text.lines().count(), 1);
        }
        assert_eq!(sheets[2].text, format!("{}\r\n", ASSESSMENT_COLUMNS.join(",")));
        let summary = &sheets[5].text;
        assert!(summary.contains("Average Attendance Rate,N/A"));
        assert!(summary.contains("Average Marks,N/A"));
        assert!(summary.contains("Total Students,0"));
    }

    #[test]
    fn tampered_sheet_is_rejected() {
        let conn = db::open_in_memory().expect("db");
        let school = schools::insert(&conn, "Alpha").expect("school");
        let dir = temp_dir("schoold-tamper");
        let good = dir.join("good.schoolbook.zip");
        export_school(&conn, school, &good).expect("export");

        let mut archive = ZipArchive::new(File::open(&good).expect("open")).expect("zip");
        let manifest = read_entry(&mut archive, MANIFEST_ENTRY).expect("manifest");
        let bad = dir.join("bad.schoolbook.zip");
        let mut zip = ZipWriter::new(File::create(&bad).expect("create"));
        let opts = FileOptions::default();
        zip.start_file(MANIFEST_ENTRY, opts).expect("start");
        zip.write_all(manifest.as_bytes()).expect("write");
        zip.start_file("sheets/Students.csv", opts).expect("start");
        zip.write_all(b"student_id,school_id,name,age,grade,parent_name,parent_contact\r\n9,1,X,1,1,,\r\n")
            .expect("write");
        zip.finish().expect("finish");

        let err = read_students_sheet(&bad).expect_err("checksum");
        assert!(err.to_string().contains("checksum"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn csv_parser_handles_quotes_and_crlf() {
        let rows = parse_csv("a,b\r\n\"x, y\",\"say \"\"hi\"\"\"\r\n\"multi\nline\",\r\n");
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x, y".to_string(), "say \"hi\"".to_string()],
                vec!["multi\nline".to_string(), String::new()],
            ]
        );
    }
}

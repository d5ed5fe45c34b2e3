use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const MIN_BEHAVIOUR_SCORE: i64 = 1;
pub const MAX_BEHAVIOUR_SCORE: i64 = 5;
pub const DEFAULT_BEHAVIOUR_SCORE: i64 = 3;

pub const DEFAULT_TEACHER_STATUS: &str = "Active";
pub const DEFAULT_ACADEMIC_YEAR: &str = "2024-2025";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub school_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: i64,
    pub school_id: i64,
    pub name: String,
    pub age: i64,
    /// Class label. Free text; report joins compare it byte-for-byte.
    pub grade: String,
    pub parent_name: String,
    pub parent_contact: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentFields {
    pub name: String,
    pub age: i64,
    pub grade: String,
    pub parent_name: String,
    pub parent_contact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub teacher_id: i64,
    pub school_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub qualification: String,
    pub join_date: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeacherFields {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub qualification: String,
    pub join_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAssignment {
    pub assignment_id: i64,
    pub teacher_id: i64,
    pub school_id: i64,
    pub class_grade: String,
    pub subject: String,
    pub academic_year: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentFields {
    pub teacher_id: i64,
    pub class_grade: String,
    pub subject: String,
    pub academic_year: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Present" => Some(AttendanceStatus::Present),
            "Absent" => Some(AttendanceStatus::Absent),
            "Late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub attendance_id: i64,
    pub student_id: i64,
    pub school_id: i64,
    pub date: String,
    pub status: AttendanceStatus,
    pub behaviour_score: i64,
    pub behaviour_comment: String,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub behaviour_score: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    E,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::E => "E",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub assessment_id: i64,
    pub student_id: i64,
    pub school_id: i64,
    pub date: String,
    pub subject: String,
    pub marks: i64,
    pub total: i64,
    /// Stored as written; older rows may hold labels outside A-E.
    pub grade: String,
}

#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub student_id: i64,
    pub marks: i64,
}

/// Rows that reference a student. Used by the grade join.
pub trait StudentScoped {
    fn student_id(&self) -> i64;
}

impl StudentScoped for AttendanceRecord {
    fn student_id(&self) -> i64 {
        self.student_id
    }
}

impl StudentScoped for AssessmentRecord {
    fn student_id(&self) -> i64 {
        self.student_id
    }
}

/// Inclusive `[start, end]` window over the stored ISO date text.
/// An open bound matches everything on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn start_key(&self) -> Option<String> {
        self.start.map(format_date)
    }

    pub fn end_key(&self) -> Option<String> {
        self.end.map(format_date)
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_exact() {
        assert_eq!(AttendanceStatus::parse("Present"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::parse("Late"), Some(AttendanceStatus::Late));
        assert_eq!(AttendanceStatus::parse("present"), None);
        assert_eq!(AttendanceStatus::parse(""), None);
    }

    #[test]
    fn date_keys_are_iso_text() {
        let r = DateRange::between(
            parse_date("2024-01-05").expect("start"),
            parse_date(" 2024-12-31 ").expect("end"),
        );
        assert_eq!(r.start_key().as_deref(), Some("2024-01-05"));
        assert_eq!(r.end_key().as_deref(), Some("2024-12-31"));
        assert_eq!(DateRange::all().start_key(), None);
        assert!(parse_date("05/01/2024").is_none());
    }
}

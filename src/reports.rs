//! Named report payloads assembled from one school's rows plus the metrics
//! in [`crate::metrics`]. Every builder is pure over a [`SchoolData`]
//! snapshot and tolerates empty inputs: a section with nothing to show is
//! `noData` with a message, never an error.

use crate::metrics::{self, AlertThresholds, Direction, Graded};
use crate::model::{
    AssessmentRecord, AttendanceRecord, DateRange, School, Student, Teacher, TeacherAssignment,
};
use crate::repo::{assessments, attendance, schools, students, teachers, StoreResult};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

const TOP_N: usize = 10;
/// The dashboard only ranks behaviour when more students than this have records.
const DASHBOARD_RANKING_MIN_STUDENTS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Section<T> {
    Ready { data: T },
    NoData { message: String },
}

impl<T> Section<T> {
    pub fn ready(data: T) -> Self {
        Section::Ready { data }
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Section::NoData {
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Ready { data } => Some(data),
            Section::NoData { .. } => None,
        }
    }
}

impl<T> Section<Vec<T>> {
    fn non_empty(rows: Vec<T>, message: &str) -> Self {
        if rows.is_empty() {
            Section::no_data(message)
        } else {
            Section::ready(rows)
        }
    }
}

/// Everything one report pass reads. Attendance and assessments are already
/// narrowed to the requested date range; rosters are not.
#[derive(Debug, Clone)]
pub struct SchoolData {
    pub school: School,
    pub period: DateRange,
    pub students: Vec<Student>,
    pub teachers: Vec<Teacher>,
    pub assignments: Vec<TeacherAssignment>,
    pub attendance: Vec<AttendanceRecord>,
    pub assessments: Vec<AssessmentRecord>,
}

impl SchoolData {
    pub fn load(conn: &Connection, school_id: i64, period: DateRange) -> StoreResult<Self> {
        Ok(Self {
            school: schools::get(conn, school_id)?,
            period,
            students: students::list_by_school(conn, school_id)?,
            teachers: teachers::list_by_school(conn, school_id)?,
            assignments: teachers::list_assignments_by_school(conn, school_id)?,
            attendance: attendance::list_by_school(conn, school_id, &period)?,
            assessments: assessments::list_by_school(conn, school_id, &period)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    StudentPerformance,
    TeacherPerformance,
    AttendanceSummary,
    BehaviourAnalysis,
    Comprehensive,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::StudentPerformance,
        ReportKind::TeacherPerformance,
        ReportKind::AttendanceSummary,
        ReportKind::BehaviourAnalysis,
        ReportKind::Comprehensive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::StudentPerformance => "studentPerformance",
            ReportKind::TeacherPerformance => "teacherPerformance",
            ReportKind::AttendanceSummary => "attendanceSummary",
            ReportKind::BehaviourAnalysis => "behaviourAnalysis",
            ReportKind::Comprehensive => "comprehensive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::StudentPerformance => "Student Performance Report",
            ReportKind::TeacherPerformance => "Teacher Performance Report",
            ReportKind::AttendanceSummary => "Attendance Summary Report",
            ReportKind::BehaviourAnalysis => "Behaviour Analysis Report",
            ReportKind::Comprehensive => "Comprehensive School Report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Report {
    StudentPerformance(StudentPerformance),
    TeacherPerformance(TeacherPerformance),
    AttendanceSummary(AttendanceSummary),
    BehaviourAnalysis(BehaviourAnalysis),
    Comprehensive(Comprehensive),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEnvelope {
    pub title: &'static str,
    pub school: School,
    pub period: DateRange,
    #[serde(flatten)]
    pub report: Report,
}

pub fn generate(kind: ReportKind, data: &SchoolData) -> ReportEnvelope {
    let report = match kind {
        ReportKind::StudentPerformance => Report::StudentPerformance(student_performance(data)),
        ReportKind::TeacherPerformance => Report::TeacherPerformance(teacher_performance(data)),
        ReportKind::AttendanceSummary => Report::AttendanceSummary(attendance_summary(data)),
        ReportKind::BehaviourAnalysis => Report::BehaviourAnalysis(behaviour_analysis(data)),
        ReportKind::Comprehensive => Report::Comprehensive(comprehensive(data)),
    };
    ReportEnvelope {
        title: kind.title(),
        school: data.school.clone(),
        period: data.period,
        report,
    }
}

fn rounded_averages(rows: Vec<metrics::KeyedAverage>) -> Vec<metrics::KeyedAverage> {
    rows.into_iter()
        .map(|mut r| {
            r.mean = metrics::round_to(r.mean, 2);
            r
        })
        .collect()
}

// ---- student performance ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRow {
    pub assessment_id: i64,
    pub student_id: i64,
    pub name: Option<String>,
    pub grade: Option<String>,
    pub date: String,
    pub subject: String,
    pub marks: i64,
    pub total: i64,
    pub letter_grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummaryRow {
    pub grade: String,
    pub average_marks: f64,
    pub highest_marks: i64,
    pub lowest_marks: i64,
    pub total_assessments: usize,
    pub unique_students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "basis", rename_all = "camelCase")]
pub enum PerformanceSummary {
    #[serde(rename_all = "camelCase")]
    ByGrade {
        grades: Vec<GradeSummaryRow>,
        ungraded_assessments: usize,
    },
    Overall {
        stats: metrics::MarkStats,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub records: Section<Vec<PerformanceRow>>,
    pub summary: Section<PerformanceSummary>,
}

pub fn student_performance(data: &SchoolData) -> StudentPerformance {
    const EMPTY: &str = "No assessment data available for the selected period.";
    if data.assessments.is_empty() || data.students.is_empty() {
        return StudentPerformance {
            records: Section::no_data(EMPTY),
            summary: Section::no_data(EMPTY),
        };
    }

    let records = data
        .assessments
        .iter()
        .map(|a| {
            let s = data.students.iter().find(|s| s.student_id == a.student_id);
            PerformanceRow {
                assessment_id: a.assessment_id,
                student_id: a.student_id,
                name: s.map(|s| s.name.clone()),
                grade: s.map(|s| s.grade.clone()),
                date: a.date.clone(),
                subject: a.subject.clone(),
                marks: a.marks,
                total: a.total,
                letter_grade: a.grade.clone(),
            }
        })
        .collect();

    let joined = metrics::join_on_grade(&data.assessments, &data.students);
    let summary = if metrics::any_graded(&joined) {
        let ungraded = joined.iter().filter(|g| g.grade.is_none()).count();
        let grades = metrics::marks_by_grade(&joined)
            .into_iter()
            .map(|g| GradeSummaryRow {
                grade: g.grade,
                average_marks: metrics::round_to(g.stats.mean, 2),
                highest_marks: g.stats.max,
                lowest_marks: g.stats.min,
                total_assessments: g.stats.count,
                unique_students: g.stats.distinct_students,
            })
            .collect();
        PerformanceSummary::ByGrade {
            grades,
            ungraded_assessments: ungraded,
        }
    } else {
        match metrics::mark_stats(&data.assessments) {
            Some(mut stats) => {
                stats.mean = metrics::round_to(stats.mean, 1);
                PerformanceSummary::Overall { stats }
            }
            None => {
                return StudentPerformance {
                    records: Section::ready(records),
                    summary: Section::no_data(EMPTY),
                }
            }
        }
    };

    StudentPerformance {
        records: Section::ready(records),
        summary: Section::ready(summary),
    }
}

// ---- teacher performance ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPerformance {
    pub staff: Section<Vec<Teacher>>,
    pub assignments: Section<Vec<TeacherAssignment>>,
    pub workload: Section<Vec<metrics::TeacherWorkload>>,
    pub outcomes: Section<Vec<metrics::TeacherOutcome>>,
}

pub fn teacher_performance(data: &SchoolData) -> TeacherPerformance {
    if data.teachers.is_empty() {
        const EMPTY: &str = "No teacher data available.";
        return TeacherPerformance {
            staff: Section::no_data(EMPTY),
            assignments: Section::no_data(EMPTY),
            workload: Section::no_data(EMPTY),
            outcomes: Section::no_data(EMPTY),
        };
    }

    let (assignments, workload) = if data.assignments.is_empty() {
        const NONE: &str = "No class assignments found.";
        (Section::no_data(NONE), Section::no_data(NONE))
    } else {
        (
            Section::ready(data.assignments.clone()),
            Section::non_empty(
                metrics::teacher_workload(&data.assignments, &data.teachers),
                "No assignments belong to a current teacher.",
            ),
        )
    };

    let outcomes = if data.assessments.is_empty() || data.students.is_empty() {
        Section::no_data("No assessment data available for the selected period.")
    } else {
        let rows = metrics::teacher_outcomes(
            &data.teachers,
            &data.assignments,
            &data.students,
            &data.assessments,
        )
        .into_iter()
        .map(|mut r| {
            r.average_marks = metrics::round_to(r.average_marks, 1);
            r
        })
        .collect();
        Section::non_empty(rows, "No assessed students in any assigned class.")
    };

    TeacherPerformance {
        staff: Section::ready(data.teachers.clone()),
        assignments,
        workload,
        outcomes,
    }
}

// ---- attendance summary ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub breakdown: Section<Vec<metrics::StatusCount>>,
    pub daily_trend: Section<Vec<metrics::PeriodRate>>,
    pub by_grade: Section<Vec<metrics::GradeAttendance>>,
}

pub fn attendance_summary(data: &SchoolData) -> AttendanceSummary {
    const EMPTY: &str = "No attendance data available for the selected period.";
    if data.attendance.is_empty() {
        return AttendanceSummary {
            breakdown: Section::no_data(EMPTY),
            daily_trend: Section::no_data(EMPTY),
            by_grade: Section::no_data(EMPTY),
        };
    }

    let daily = metrics::daily_attendance(&data.attendance)
        .into_iter()
        .map(|mut p| {
            p.rate = metrics::round_to(p.rate, 1);
            p
        })
        .collect();

    let by_grade = if data.students.is_empty() {
        Section::no_data("No student data available for a grade breakdown.")
    } else {
        let joined = metrics::join_on_grade(&data.attendance, &data.students);
        let rows = metrics::attendance_by_grade(&joined)
            .into_iter()
            .map(|mut g| {
                g.rate = metrics::round_to(g.rate, 1);
                g
            })
            .collect();
        Section::non_empty(rows, "Could not generate grade-wise attendance breakdown.")
    };

    AttendanceSummary {
        breakdown: Section::ready(metrics::status_breakdown(&data.attendance)),
        daily_trend: Section::ready(daily),
        by_grade,
    }
}

// ---- behaviour analysis ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviourAnalysis {
    pub summary: Section<metrics::BehaviourSummary>,
    pub distribution: Section<Vec<metrics::ScoreCount>>,
    pub top: Section<Vec<metrics::StudentBehaviour>>,
    pub bottom: Section<Vec<metrics::StudentBehaviour>>,
}

fn ranked(rows: &[metrics::StudentBehaviour], direction: Direction) -> Vec<metrics::StudentBehaviour> {
    metrics::top_n(rows, |r| r.mean_score, TOP_N, direction)
        .into_iter()
        .map(|r| metrics::StudentBehaviour {
            mean_score: metrics::round_to(r.mean_score, 2),
            ..r.clone()
        })
        .collect()
}

pub fn behaviour_analysis(data: &SchoolData) -> BehaviourAnalysis {
    const EMPTY: &str = "No attendance/behaviour data available for the selected period.";
    let Some(summary) = metrics::behaviour_summary(&data.attendance) else {
        return BehaviourAnalysis {
            summary: Section::no_data(EMPTY),
            distribution: Section::no_data(EMPTY),
            top: Section::no_data(EMPTY),
            bottom: Section::no_data(EMPTY),
        };
    };

    let (top, bottom) = if data.students.is_empty() {
        const NONE: &str = "No student data available for rankings.";
        (Section::no_data(NONE), Section::no_data(NONE))
    } else {
        let per_student = metrics::behaviour_by_student(&data.attendance, &data.students);
        (
            Section::ready(ranked(&per_student, Direction::Largest)),
            Section::ready(ranked(&per_student, Direction::Smallest)),
        )
    };

    BehaviourAnalysis {
        summary: Section::ready(summary),
        distribution: Section::ready(metrics::score_histogram(&data.attendance)),
        top,
        bottom,
    }
}

// ---- comprehensive ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFigures {
    pub total_students: usize,
    pub teaching_staff: usize,
    pub attendance_rate: f64,
    pub average_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRow {
    pub name: String,
    pub subject: String,
    pub qualification: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comprehensive {
    pub key_figures: KeyFigures,
    pub demographics: Section<Vec<metrics::GradeCount>>,
    pub academic_performance: Section<Vec<metrics::KeyedAverage>>,
    pub attendance_overview: Section<Vec<metrics::StatusCount>>,
    pub staff: Section<Vec<StaffRow>>,
}

pub fn comprehensive(data: &SchoolData) -> Comprehensive {
    let staff = data
        .teachers
        .iter()
        .map(|t| StaffRow {
            name: t.name.clone(),
            subject: t.subject.clone(),
            qualification: t.qualification.clone(),
            status: t.status.clone(),
        })
        .collect();

    Comprehensive {
        key_figures: KeyFigures {
            total_students: data.students.len(),
            teaching_staff: data.teachers.len(),
            attendance_rate: metrics::round_to(metrics::attendance_rate(&data.attendance), 1),
            average_marks: metrics::round_to(metrics::average_marks(&data.assessments), 1),
        },
        demographics: Section::non_empty(
            metrics::grade_distribution(&data.students),
            "No students registered.",
        ),
        academic_performance: Section::non_empty(
            rounded_averages(metrics::marks_by_subject(&data.assessments)),
            "No assessment data available for the selected period.",
        ),
        attendance_overview: Section::non_empty(
            metrics::status_frequency(&data.attendance),
            "No attendance data available for the selected period.",
        ),
        staff: Section::non_empty(staff, "No teacher data available."),
    }
}

// ---- analytics dashboard ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_students: usize,
    pub attendance_rate: f64,
    pub average_behaviour: f64,
    pub average_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "basis", rename_all = "camelCase")]
pub enum GradePerformance {
    ByGrade { grades: Vec<metrics::KeyedAverage> },
    BySubject { subjects: Vec<metrics::KeyedAverage> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviourPanel {
    pub students: Vec<metrics::StudentBehaviour>,
    /// Present only when the class is large enough to rank.
    pub top: Option<Vec<metrics::StudentBehaviour>>,
    pub class_average: f64,
    pub highest: f64,
    pub lowest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub school: School,
    pub period: DateRange,
    pub kpis: Kpis,
    pub alerts: Vec<metrics::Alert>,
    pub monthly_trend: Section<Vec<metrics::PeriodRate>>,
    pub performance: Section<GradePerformance>,
    pub status_breakdown: Section<Vec<metrics::StatusCount>>,
    pub behaviour: Section<BehaviourPanel>,
    pub subject_averages: Section<Vec<metrics::KeyedAverage>>,
}

fn grade_performance(joined: &[Graded<'_, AssessmentRecord>], data: &SchoolData) -> GradePerformance {
    if metrics::any_graded(joined) {
        GradePerformance::ByGrade {
            grades: rounded_averages(metrics::marks_by_grade_mean(joined)),
        }
    } else {
        GradePerformance::BySubject {
            subjects: rounded_averages(metrics::marks_by_subject(&data.assessments)),
        }
    }
}

fn behaviour_panel(data: &SchoolData) -> Section<BehaviourPanel> {
    if data.attendance.is_empty() || data.students.is_empty() {
        return Section::no_data("No behaviour data available for the selected period.");
    }
    let students = metrics::behaviour_by_student(&data.attendance, &data.students);
    let means: Vec<f64> = students.iter().map(|s| s.mean_score).collect();
    let class_average = means.iter().sum::<f64>() / means.len().max(1) as f64;
    let highest = means.iter().copied().fold(f64::MIN, f64::max);
    let lowest = means.iter().copied().fold(f64::MAX, f64::min);
    let top = (students.len() > DASHBOARD_RANKING_MIN_STUDENTS)
        .then(|| ranked(&students, Direction::Largest));
    Section::ready(BehaviourPanel {
        students,
        top,
        class_average: metrics::round_to(class_average, 1),
        highest: metrics::round_to(highest, 1),
        lowest: metrics::round_to(lowest, 1),
    })
}

pub fn dashboard(data: &SchoolData, thresholds: &AlertThresholds) -> Dashboard {
    let monthly = metrics::monthly_attendance(&data.attendance)
        .into_iter()
        .map(|mut p| {
            p.rate = metrics::round_to(p.rate, 1);
            p
        })
        .collect();

    let performance = if data.assessments.is_empty() || data.students.is_empty() {
        Section::no_data("No assessment data available for the selected period.")
    } else {
        let joined = metrics::join_on_grade(&data.assessments, &data.students);
        Section::ready(grade_performance(&joined, data))
    };

    Dashboard {
        school: data.school.clone(),
        period: data.period,
        kpis: Kpis {
            total_students: data.students.len(),
            attendance_rate: metrics::round_to(metrics::attendance_rate(&data.attendance), 1),
            average_behaviour: metrics::round_to(metrics::average_behaviour(&data.attendance), 1),
            average_marks: metrics::round_to(metrics::average_marks(&data.assessments), 1),
        },
        alerts: metrics::alerts(&data.attendance, thresholds),
        monthly_trend: Section::non_empty(monthly, "No attendance data available for the selected period."),
        performance,
        status_breakdown: Section::non_empty(
            metrics::status_breakdown(&data.attendance),
            "No attendance data available for the selected period.",
        ),
        behaviour: behaviour_panel(data),
        subject_averages: Section::non_empty(
            rounded_averages(metrics::marks_by_subject(&data.assessments)),
            "No assessment data available for the selected period.",
        ),
    }
}

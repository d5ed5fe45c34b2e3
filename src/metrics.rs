//! Derived metrics over in-memory rows. Nothing here touches the database.

use crate::model::{
    AssessmentRecord, AttendanceRecord, AttendanceStatus, LetterGrade, Student, StudentScoped,
    Teacher, TeacherAssignment,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Round half away from zero to `places` decimals.
pub fn round_to(x: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (x * f).round() / f
}

pub fn percentage(marks: f64, total: f64) -> f64 {
    if total > 0.0 {
        marks / total * 100.0
    } else {
        0.0
    }
}

/// A >= 90, B >= 80, C >= 70, D >= 60, else E. A zero total scores 0%.
pub fn letter_grade(marks: f64, total: f64) -> LetterGrade {
    let pct = percentage(marks, total);
    if pct >= 90.0 {
        LetterGrade::A
    } else if pct >= 80.0 {
        LetterGrade::B
    } else if pct >= 70.0 {
        LetterGrade::C
    } else if pct >= 60.0 {
        LetterGrade::D
    } else {
        LetterGrade::E
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn present_fraction<'a, I>(statuses: I) -> f64
where
    I: IntoIterator<Item = &'a AttendanceStatus>,
{
    let mut present = 0usize;
    let mut total = 0usize;
    for s in statuses {
        total += 1;
        if *s == AttendanceStatus::Present {
            present += 1;
        }
    }
    mean(present as f64, total)
}

/// Share of records marked Present, as a percentage. 0 for no records.
pub fn attendance_rate(records: &[AttendanceRecord]) -> f64 {
    present_fraction(records.iter().map(|r| &r.status)) * 100.0
}

pub fn average_behaviour(records: &[AttendanceRecord]) -> f64 {
    let sum: f64 = records.iter().map(|r| r.behaviour_score as f64).sum();
    mean(sum, records.len())
}

pub fn average_marks(records: &[AssessmentRecord]) -> f64 {
    // Summed as f64: stored rows are not bounded by the current sitting limits.
    let sum: f64 = records.iter().map(|r| r.marks as f64).sum();
    mean(sum, records.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertThresholds {
    pub min_attendance_rate: f64,
    pub min_behaviour: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_attendance_rate: 80.0,
            min_behaviour: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    LowAttendance,
    LowBehaviour,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub kind: AlertKind,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
}

/// Attendance alert first, then behaviour. Empty input raises nothing.
pub fn alerts(records: &[AttendanceRecord], thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut out = Vec::new();
    if records.is_empty() {
        return out;
    }
    let rate = attendance_rate(records);
    if rate < thresholds.min_attendance_rate {
        out.push(Alert {
            kind: AlertKind::LowAttendance,
            value: rate,
            threshold: thresholds.min_attendance_rate,
            message: format!("Low attendance rate: {:.1}%", rate),
        });
    }
    let behaviour = average_behaviour(records);
    if behaviour < thresholds.min_behaviour {
        out.push(Alert {
            kind: AlertKind::LowBehaviour,
            value: behaviour,
            threshold: thresholds.min_behaviour,
            message: format!("Low average behaviour score: {:.1}/5", behaviour),
        });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStat {
    pub mean: f64,
    pub count: usize,
}

/// Mean of `value` per key. Rows whose key is `None` are skipped.
pub fn group_average<T, K, FK, FV>(rows: &[T], key: FK, value: FV) -> BTreeMap<K, GroupStat>
where
    K: Ord,
    FK: Fn(&T) -> Option<K>,
    FV: Fn(&T) -> f64,
{
    let mut acc: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let Some(k) = key(row) else { continue };
        let e = acc.entry(k).or_insert((0.0, 0));
        e.0 += value(row);
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(k, (sum, count))| {
            (
                k,
                GroupStat {
                    mean: mean(sum, count),
                    count,
                },
            )
        })
        .collect()
}

/// A row paired with its student's class label, if the student still exists.
#[derive(Debug, Clone, Copy)]
pub struct Graded<'a, T> {
    pub row: &'a T,
    pub grade: Option<&'a str>,
}

/// Left join on student id. The class label is matched as-is, so "5" and
/// "Grade 5" stay separate groups downstream.
pub fn join_on_grade<'a, T: StudentScoped>(
    rows: &'a [T],
    students: &'a [Student],
) -> Vec<Graded<'a, T>> {
    let by_id: HashMap<i64, &str> = students
        .iter()
        .map(|s| (s.student_id, s.grade.as_str()))
        .collect();
    rows.iter()
        .map(|row| Graded {
            row,
            grade: by_id.get(&row.student_id()).copied(),
        })
        .collect()
}

pub fn any_graded<T>(joined: &[Graded<'_, T>]) -> bool {
    joined.iter().any(|g| g.grade.is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Largest,
    Smallest,
}

/// The `n` rows with the largest (or smallest) value. Equal values keep
/// their input order.
pub fn top_n<T, F>(rows: &[T], value: F, n: usize, direction: Direction) -> Vec<&T>
where
    F: Fn(&T) -> f64,
{
    let mut refs: Vec<&T> = rows.iter().collect();
    refs.sort_by(|a, b| {
        let (va, vb) = (value(a), value(b));
        let ord = match direction {
            Direction::Largest => vb.partial_cmp(&va),
            Direction::Smallest => va.partial_cmp(&vb),
        };
        ord.unwrap_or(Ordering::Equal)
    });
    refs.truncate(n);
    refs
}

// ---- attendance aggregates ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: AttendanceStatus,
    pub count: usize,
    pub percentage: f64,
}

fn count_statuses(records: &[AttendanceRecord]) -> Vec<(AttendanceStatus, usize)> {
    let mut counts: BTreeMap<&'static str, (AttendanceStatus, usize)> = BTreeMap::new();
    for r in records {
        counts.entry(r.status.as_str()).or_insert((r.status, 0)).1 += 1;
    }
    counts.into_values().collect()
}

/// Count and share per status, ordered by status name.
pub fn status_breakdown(records: &[AttendanceRecord]) -> Vec<StatusCount> {
    let total = records.len();
    count_statuses(records)
        .into_iter()
        .map(|(status, count)| StatusCount {
            status,
            count,
            percentage: round_to(mean(count as f64, total) * 100.0, 1),
        })
        .collect()
}

/// Same counts, most frequent first.
pub fn status_frequency(records: &[AttendanceRecord]) -> Vec<StatusCount> {
    let mut out = status_breakdown(records);
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRate {
    pub period: String,
    pub rate: f64,
    pub records: usize,
}

fn rate_by_period<F>(records: &[AttendanceRecord], period: F) -> Vec<PeriodRate>
where
    F: Fn(&AttendanceRecord) -> String,
{
    group_average(
        records,
        |r| Some(period(r)),
        |r| if r.status == AttendanceStatus::Present { 100.0 } else { 0.0 },
    )
    .into_iter()
    .map(|(period, stat)| PeriodRate {
        period,
        rate: stat.mean,
        records: stat.count,
    })
    .collect()
}

pub fn daily_attendance(records: &[AttendanceRecord]) -> Vec<PeriodRate> {
    rate_by_period(records, |r| r.date.clone())
}

/// Grouped by the `YYYY-MM` prefix of the stored date.
pub fn monthly_attendance(records: &[AttendanceRecord]) -> Vec<PeriodRate> {
    rate_by_period(records, |r| r.date.chars().take(7).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAttendance {
    pub grade: String,
    pub rate: f64,
    pub students: usize,
}

/// Rows without a class label are left out.
pub fn attendance_by_grade(joined: &[Graded<'_, AttendanceRecord>]) -> Vec<GradeAttendance> {
    let mut acc: BTreeMap<&str, (Vec<AttendanceStatus>, HashSet<i64>)> = BTreeMap::new();
    for g in joined {
        let Some(grade) = g.grade else { continue };
        let e = acc.entry(grade).or_default();
        e.0.push(g.row.status);
        e.1.insert(g.row.student_id);
    }
    acc.into_iter()
        .map(|(grade, (statuses, students))| GradeAttendance {
            grade: grade.to_string(),
            rate: present_fraction(statuses.iter()) * 100.0,
            students: students.len(),
        })
        .collect()
}

// ---- behaviour aggregates ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviourSummary {
    pub mean: f64,
    pub max: i64,
    pub min: i64,
    pub count: usize,
}

pub fn behaviour_summary(records: &[AttendanceRecord]) -> Option<BehaviourSummary> {
    let max = records.iter().map(|r| r.behaviour_score).max()?;
    let min = records.iter().map(|r| r.behaviour_score).min()?;
    Some(BehaviourSummary {
        mean: average_behaviour(records),
        max,
        min,
        count: records.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCount {
    pub score: i64,
    pub count: usize,
}

pub fn score_histogram(records: &[AttendanceRecord]) -> Vec<ScoreCount> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.behaviour_score).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(score, count)| ScoreCount { score, count })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBehaviour {
    pub student_id: i64,
    pub name: Option<String>,
    pub grade: Option<String>,
    pub mean_score: f64,
}

/// Mean behaviour per student id (ascending), with name and class label
/// when the student still exists.
pub fn behaviour_by_student(
    records: &[AttendanceRecord],
    students: &[Student],
) -> Vec<StudentBehaviour> {
    let by_id: HashMap<i64, &Student> = students.iter().map(|s| (s.student_id, s)).collect();
    group_average(records, |r| Some(r.student_id), |r| r.behaviour_score as f64)
        .into_iter()
        .map(|(student_id, stat)| {
            let s = by_id.get(&student_id);
            StudentBehaviour {
                student_id,
                name: s.map(|s| s.name.clone()),
                grade: s.map(|s| s.grade.clone()),
                mean_score: stat.mean,
            }
        })
        .collect()
}

// ---- assessment aggregates ----

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkStats {
    pub mean: f64,
    pub max: i64,
    pub min: i64,
    pub count: usize,
    pub distinct_students: usize,
}

pub fn mark_stats<'a, I>(records: I) -> Option<MarkStats>
where
    I: IntoIterator<Item = &'a AssessmentRecord>,
{
    let mut sum = 0f64;
    let mut count = 0usize;
    let mut max = i64::MIN;
    let mut min = i64::MAX;
    let mut students = HashSet::new();
    for r in records {
        sum += r.marks as f64;
        count += 1;
        max = max.max(r.marks);
        min = min.min(r.marks);
        students.insert(r.student_id);
    }
    if count == 0 {
        return None;
    }
    Some(MarkStats {
        mean: mean(sum, count),
        max,
        min,
        count,
        distinct_students: students.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeMarks {
    pub grade: String,
    pub stats: MarkStats,
}

pub fn marks_by_grade(joined: &[Graded<'_, AssessmentRecord>]) -> Vec<GradeMarks> {
    let mut acc: BTreeMap<&str, Vec<&AssessmentRecord>> = BTreeMap::new();
    for g in joined {
        if let Some(grade) = g.grade {
            acc.entry(grade).or_default().push(g.row);
        }
    }
    acc.into_iter()
        .filter_map(|(grade, rows)| {
            mark_stats(rows).map(|stats| GradeMarks {
                grade: grade.to_string(),
                stats,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyedAverage {
    pub key: String,
    pub mean: f64,
    pub count: usize,
}

pub fn marks_by_subject(records: &[AssessmentRecord]) -> Vec<KeyedAverage> {
    group_average(records, |r| Some(r.subject.clone()), |r| r.marks as f64)
        .into_iter()
        .map(|(key, stat)| KeyedAverage {
            key,
            mean: stat.mean,
            count: stat.count,
        })
        .collect()
}

/// Mean marks per class label; used when the detailed per-grade stats are not wanted.
pub fn marks_by_grade_mean(joined: &[Graded<'_, AssessmentRecord>]) -> Vec<KeyedAverage> {
    group_average(joined, |g| g.grade.map(str::to_string), |g| g.row.marks as f64)
        .into_iter()
        .map(|(key, stat)| KeyedAverage {
            key,
            mean: stat.mean,
            count: stat.count,
        })
        .collect()
}

// ---- roster aggregates ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: String,
    pub students: usize,
}

/// Students per class label, largest class first; equal sizes by label.
pub fn grade_distribution(students: &[Student]) -> Vec<GradeCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in students {
        *counts.entry(s.grade.as_str()).or_default() += 1;
    }
    let mut out: Vec<GradeCount> = counts
        .into_iter()
        .map(|(grade, students)| GradeCount {
            grade: grade.to_string(),
            students,
        })
        .collect();
    out.sort_by(|a, b| b.students.cmp(&a.students));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherWorkload {
    pub teacher_id: i64,
    pub name: String,
    pub classes: usize,
    pub subjects: String,
}

fn unique_in_order<'a, I>(items: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|s| seen.insert(*s)).collect()
}

/// Assignment count and distinct subjects per teacher, by teacher id.
/// Assignments whose teacher is gone are dropped.
pub fn teacher_workload(
    assignments: &[TeacherAssignment],
    teachers: &[Teacher],
) -> Vec<TeacherWorkload> {
    let names: HashMap<i64, &str> = teachers
        .iter()
        .map(|t| (t.teacher_id, t.name.as_str()))
        .collect();
    let mut by_teacher: BTreeMap<i64, Vec<&TeacherAssignment>> = BTreeMap::new();
    for a in assignments {
        by_teacher.entry(a.teacher_id).or_default().push(a);
    }
    by_teacher
        .into_iter()
        .filter_map(|(teacher_id, rows)| {
            let name = names.get(&teacher_id)?;
            Some(TeacherWorkload {
                teacher_id,
                name: name.to_string(),
                classes: rows.len(),
                subjects: unique_in_order(rows.iter().map(|a| a.subject.as_str())).join(", "),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherOutcome {
    pub teacher_id: i64,
    pub name: String,
    pub subject: String,
    pub classes: String,
    pub average_marks: f64,
    pub students_assessed: usize,
}

/// Teacher -> assigned class labels -> students with that label -> their
/// assessments -> mean marks. Teachers with nothing at any step are omitted.
pub fn teacher_outcomes(
    teachers: &[Teacher],
    assignments: &[TeacherAssignment],
    students: &[Student],
    assessments: &[AssessmentRecord],
) -> Vec<TeacherOutcome> {
    let mut out = Vec::new();
    for t in teachers {
        let classes = unique_in_order(
            assignments
                .iter()
                .filter(|a| a.teacher_id == t.teacher_id)
                .map(|a| a.class_grade.as_str()),
        );
        if classes.is_empty() {
            continue;
        }
        let class_set: BTreeSet<&str> = classes.iter().copied().collect();
        let enrolled: HashSet<i64> = students
            .iter()
            .filter(|s| class_set.contains(s.grade.as_str()))
            .map(|s| s.student_id)
            .collect();
        if enrolled.is_empty() {
            continue;
        }
        let Some(stats) = mark_stats(
            assessments
                .iter()
                .filter(|a| enrolled.contains(&a.student_id)),
        ) else {
            continue;
        };
        out.push(TeacherOutcome {
            teacher_id: t.teacher_id,
            name: t.name.clone(),
            subject: t.subject.clone(),
            classes: classes.join(", "),
            average_marks: stats.mean,
            students_assessed: stats.distinct_students,
        });
    }
    out
}

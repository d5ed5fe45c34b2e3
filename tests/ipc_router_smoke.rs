mod test_support;

use serde_json::json;
use std::io::Write;
use test_support::{read_response, request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn every_method_family_is_routed() {
    let workspace = temp_dir("schoold-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Params are deliberately incomplete; only routing is under test here.
    let methods = [
        "settings.get",
        "settings.update",
        "schools.list",
        "schools.create",
        "teachers.list",
        "teachers.create",
        "teachers.update",
        "teachers.delete",
        "assignments.list",
        "assignments.create",
        "students.list",
        "students.create",
        "students.update",
        "students.delete",
        "attendance.list",
        "attendance.record",
        "assessments.list",
        "assessments.record",
        "analytics.dashboard",
        "reports.generate",
        "reports.studentPerformance",
        "reports.teacherPerformance",
        "reports.attendanceSummary",
        "reports.behaviourAnalysis",
        "reports.comprehensive",
        "portal.teacher",
        "portal.teacherAttendance",
        "portal.parent",
        "export.preview",
        "export.workbook",
        "export.readStudents",
        "admin.status",
        "admin.deleteAllStudents",
        "admin.deleteAllTeachers",
        "admin.deleteAllSchools",
        "admin.resetSystem",
    ];
    for (i, method) in methods.iter().enumerate() {
        let id = format!("m{}", i);
        let resp = request(&mut stdin, &mut reader, &id, method, json!({}));
        let code = resp
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str());
        assert_ne!(code, Some("not_implemented"), "{} is not routed", method);
    }

    let unknown = request_err(&mut stdin, &mut reader, "x", "grades.curve", json!({}));
    assert_eq!(unknown["code"], "not_implemented");
    let unknown = request_err(&mut stdin, &mut reader, "y", "reports.nonsense", json!({}));
    assert_eq!(unknown["code"], "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_line_gets_bad_json_and_the_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let resp = read_response(&mut reader);
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "bad_json");
    assert!(resp.get("id").is_none());

    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn reads_without_workspace_are_empty_and_writes_are_refused() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let schools = request_ok(&mut stdin, &mut reader, "1", "schools.list", json!({}));
    assert_eq!(schools["schools"], json!([]));
    let students = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.list",
        json!({ "schoolId": 1 }),
    );
    assert_eq!(students["students"], json!([]));
    let status = request_ok(&mut stdin, &mut reader, "3", "admin.status", json!({}));
    assert_eq!(status["students"], 0);
    assert_eq!(status["attendanceRecords"], 0);

    let create = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "schools.create",
        json!({ "name": "Alpha" }),
    );
    assert_eq!(create["code"], "no_workspace");
    let report = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "reports.generate",
        json!({ "schoolId": 1, "kind": "comprehensive" }),
    );
    assert_eq!(report["code"], "no_workspace");

    let select = request_err(&mut stdin, &mut reader, "6", "workspace.select", json!({}));
    assert_eq!(select["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
}

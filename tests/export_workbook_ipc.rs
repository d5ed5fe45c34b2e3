mod test_support;

use serde_json::json;
use test_support::{id_of, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn exported_students_read_back_unchanged() {
    let workspace = temp_dir("schoold-export");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let school_id = id_of(
        &request_ok(&mut stdin, &mut reader, "2", "schools.create", json!({ "name": "St. Mary's, East" })),
        "schoolId",
    );
    for (i, (name, parent)) in [("Amina", "Halima \"Mama\" W."), ("Baraka", "Line one\nline two")]
        .into_iter()
        .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("3-{}", i),
            "students.create",
            json!({ "schoolId": school_id, "name": name, "age": 10, "grade": "4", "parentName": parent }),
        );
    }

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "export.preview",
        json!({ "schoolId": school_id }),
    );
    assert_eq!(preview["counts"]["students"], 2);
    assert_eq!(preview["counts"]["attendanceRecords"], 0);

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "export.workbook",
        json!({ "schoolId": school_id }),
    );
    assert_eq!(summary["format"], "schoolbook-v1");
    let path = summary["path"].as_str().expect("path").to_string();
    assert!(path.starts_with(&*workspace.join("exports").to_string_lossy()));
    assert!(path.ends_with(".schoolbook.zip"));
    assert!(std::path::Path::new(&path).is_file());
    let sheets = summary["sheets"].as_array().expect("sheets");
    assert!(sheets.iter().any(|s| s["name"] == "Students" && s["rows"] == 2));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.list",
        json!({ "schoolId": school_id }),
    );
    let read = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "export.readStudents",
        json!({ "path": path }),
    );
    assert_eq!(read["students"], listed["students"]);

    let missing = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "export.readStudents",
        json!({ "path": workspace.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(missing["code"], "import_failed");

    drop(stdin);
    let _ = child.wait();
}

mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{
    error_code, request, request_ok, select_workspace, spawn_sidecar, spawn_sidecar_with_env,
    temp_dir, write_workbook,
};

struct Seeded {
    class_id: i64,
    ana: i64,
    luis: i64,
}

fn seed(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Seeded {
    let class = request_ok(
        stdin,
        reader,
        "seed-class",
        "classes.create",
        json!({ "title": "Algebra I", "date": "2024-01-10", "location": "Aula 3" }),
    );
    let class_id = class.get("classId").and_then(|v| v.as_i64()).expect("classId");

    let dir = temp_dir("admisiond-attendance-seed");
    let file = dir.join("alumnos.xlsx");
    write_workbook(
        &file,
        &[
            &["Name", "Surname", "Email"],
            &["Ana", "Lopez", "ana@example.com"],
            &["Luis", "Mora", "luis@example.com"],
        ],
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-import",
        "students.importSpreadsheet",
        json!({ "filePath": file.to_string_lossy() }),
    );
    let list = request_ok(stdin, reader, "seed-list", "students.list", json!({}));
    let students = list.get("students").and_then(|v| v.as_array()).expect("students");
    let id_of = |email: &str| {
        students
            .iter()
            .find(|s| s.get("email").and_then(|v| v.as_str()) == Some(email))
            .and_then(|s| s.get("id"))
            .and_then(|v| v.as_i64())
            .expect("student id")
    };
    Seeded {
        class_id,
        ana: id_of("ana@example.com"),
        luis: id_of("luis@example.com"),
    }
}

fn rows_for_class(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_id: i64,
) -> Vec<serde_json::Value> {
    let res = request_ok(
        stdin,
        reader,
        id,
        "attendance.forClass",
        json!({ "classId": class_id }),
    );
    res.get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("rows")
}

#[test]
fn batch_is_recorded_and_resubmission_is_idempotent() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "admisiond-attendance-idem");
    let s = seed(&mut stdin, &mut reader);

    let records = json!([
        { "classId": s.class_id, "studentId": s.ana, "date": "2024-01-10", "status": "Present" },
        { "classId": s.class_id, "studentId": s.luis, "date": "2024-01-10", "status": "Absent" },
    ]);
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertBatch",
        json!({ "records": records.clone() }),
    );
    assert_eq!(first.get("processedCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(first.get("classId").and_then(|v| v.as_i64()), Some(s.class_id));
    assert_eq!(
        first.get("message").and_then(|v| v.as_str()),
        Some("Attendance for 2 students recorded/updated")
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.upsertBatch",
        json!({ "records": records }),
    );
    assert_eq!(second, first);

    let rows = rows_for_class(&mut stdin, &mut reader, "3", s.class_id);
    assert_eq!(rows.len(), 2);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.upsertBatch",
        json!({ "records": [
            { "classId": s.class_id, "studentId": s.luis, "date": "2024-01-11", "status": "Present" }
        ] }),
    );
    let rows = rows_for_class(&mut stdin, &mut reader, "5", s.class_id);
    assert_eq!(rows.len(), 2);
    let luis = rows
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_i64()) == Some(s.luis))
        .expect("luis row");
    assert_eq!(luis.get("status").and_then(|v| v.as_str()), Some("Present"));
    assert_eq!(luis.get("date").and_then(|v| v.as_str()), Some("2024-01-11"));

    let summary = request_ok(&mut stdin, &mut reader, "6", "attendance.summary", json!({}));
    let classes = summary.get("classes").and_then(|v| v.as_array()).expect("classes");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].get("present").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(classes[0].get("total").and_then(|v| v.as_i64()), Some(2));
}

#[test]
fn incomplete_record_rejects_the_whole_batch() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "admisiond-attendance-invalid");
    let s = seed(&mut stdin, &mut reader);

    let res = request(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertBatch",
        json!({ "records": [
            { "classId": s.class_id, "studentId": s.ana, "date": "2024-01-10", "status": "Present" },
            { "classId": s.class_id, "studentId": s.luis, "date": "2024-01-10" },
        ] }),
    );
    assert_eq!(error_code(&res), Some("bad_params"));
    assert_eq!(
        res.get("error")
            .and_then(|e| e.get("details"))
            .and_then(|d| d.get("index"))
            .and_then(|v| v.as_u64()),
        Some(1)
    );
    assert!(rows_for_class(&mut stdin, &mut reader, "2", s.class_id).is_empty());

    let res = request(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.upsertBatch",
        json!({ "records": [] }),
    );
    assert_eq!(error_code(&res), Some("bad_params"));

    let res = request(&mut stdin, &mut reader, "4", "attendance.upsertBatch", json!({}));
    assert_eq!(error_code(&res), Some("bad_params"));
}

#[test]
fn unknown_student_is_not_found_and_nothing_is_written() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "admisiond-attendance-missing");
    let s = seed(&mut stdin, &mut reader);

    let res = request(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertBatch",
        json!({ "records": [
            { "classId": s.class_id, "studentId": s.ana, "date": "2024-01-10", "status": "Present" },
            { "classId": s.class_id, "studentId": 9999, "date": "2024-01-10", "status": "Present" },
        ] }),
    );
    assert_eq!(error_code(&res), Some("not_found"));
    assert!(rows_for_class(&mut stdin, &mut reader, "2", s.class_id).is_empty());

    let res = request(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.forClass",
        json!({ "classId": 9999 }),
    );
    assert_eq!(error_code(&res), Some("not_found"));
}

#[test]
fn batch_over_configured_cap_is_rejected() {
    let (_child, mut stdin, mut reader) =
        spawn_sidecar_with_env(&[("ADMISIOND_MAX_ATTENDANCE_RECORDS", "1")]);
    let _ = select_workspace(&mut stdin, &mut reader, "admisiond-attendance-cap");
    let s = seed(&mut stdin, &mut reader);

    let res = request(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertBatch",
        json!({ "records": [
            { "classId": s.class_id, "studentId": s.ana, "date": "2024-01-10", "status": "Present" },
            { "classId": s.class_id, "studentId": s.luis, "date": "2024-01-10", "status": "Present" },
        ] }),
    );
    assert_eq!(error_code(&res), Some("too_many_records"));
    let details = res.get("error").and_then(|e| e.get("details")).expect("details");
    assert_eq!(details.get("count").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(details.get("max").and_then(|v| v.as_u64()), Some(1));
    assert!(rows_for_class(&mut stdin, &mut reader, "2", s.class_id).is_empty());
}

#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classsheetd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classsheetd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

pub fn approx(value: &serde_json::Value, expected: f64) -> bool {
    value
        .as_f64()
        .map(|v| (v - expected).abs() < 1e-9)
        .unwrap_or(false)
}

/// Opens a fresh workspace with one class (9A: S1 Sara, S2 Reza, S3 Nima), two teachers and
/// two courses (MATH credit 2, ART credit unset).
pub fn seed_class(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &PathBuf) {
    let _ = request_ok(
        stdin,
        reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "roster.upsertClass",
        json!({
            "class": {
                "code": "C9A",
                "name": "9A",
                "students": [
                    { "code": "S1", "name": "Sara" },
                    { "code": "S2", "name": "Reza" },
                    { "code": "S3", "name": "Nima" }
                ],
                "teachers": [
                    { "teacherCode": "T1", "courseCode": "MATH" },
                    { "teacherCode": "T2", "courseCode": "ART" }
                ]
            }
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-3",
        "roster.upsertTeachers",
        json!({ "teachers": [
            { "code": "T1", "name": "Mr. Karimi" },
            { "code": "T2", "name": "Ms. Ahmadi" }
        ]}),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-4",
        "courses.upsert",
        json!({ "courses": [
            { "code": "MATH", "name": "Math", "credit": 2 },
            { "code": "ART", "name": "Art" }
        ]}),
    );
}

pub fn cell(
    student: &str,
    teacher: &str,
    course: &str,
    date: &str,
    status: &str,
    grades: &[f64],
) -> serde_json::Value {
    let grades: Vec<serde_json::Value> = grades.iter().map(|g| json!({ "value": g })).collect();
    json!({
        "classCode": "C9A",
        "courseCode": course,
        "teacherCode": teacher,
        "studentCode": student,
        "date": date,
        "timeSlot": "1",
        "presenceStatus": status,
        "grades": grades
    })
}

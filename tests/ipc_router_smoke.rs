mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_ok, seed_class, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("classsheet-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let before = request(
        &mut stdin,
        &mut reader,
        "2",
        "reports.classReport",
        json!({ "classCode": "C9A", "academicYear": 1403 }),
    );
    assert_eq!(error_code(&before), Some("no_workspace"));

    seed_class(&mut stdin, &mut reader, &workspace);
    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert!(health["workspacePath"].is_string());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assessmentValues.set",
        json!({ "courseCode": "MATH", "values": { "عالی": 0.5 } }),
    );

    for (id, method, params) in [
        ("5", "cells.import", json!({ "cells": [] })),
        ("6", "calendar.toJalali", json!({ "date": "2024-09-22" })),
        ("7", "reports.classReport", json!({ "classCode": "C9A", "academicYear": 1403 })),
        ("8", "reports.classComparison", json!({ "academicYear": 1403 })),
        ("9", "attendance.summary", json!({})),
        ("10", "attendance.uniqueByDay", json!({ "status": "late" })),
        ("11", "discipline.summary", json!({})),
        ("12", "setup.get", json!({})),
    ] {
        let _ = request_ok(&mut stdin, &mut reader, id, method, params);
    }

    let unknown = request(&mut stdin, &mut reader, "13", "marksets.list", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "14",
        "reports.classReport",
        json!({ "classCode": "NOPE", "academicYear": 1403 }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    let bad_cell = request(
        &mut stdin,
        &mut reader,
        "15",
        "cells.import",
        json!({ "cells": [{ "classCode": "C9A" }] }),
    );
    assert_eq!(error_code(&bad_cell), Some("bad_params"));
    assert_eq!(bad_cell["error"]["details"]["index"], 0);

    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["error"]["code"], "bad_json");
}

#[test]
fn assessment_overrides_change_adjusted_grades() {
    let workspace = temp_dir("classsheet-assessment-overrides");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_class(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "assessmentValues.set",
        json!({ "courseCode": "MATH", "values": { "عالی": 0.5 } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "cells.import",
        json!({ "cells": [{
            "classCode": "C9A",
            "courseCode": "MATH",
            "teacherCode": "T1",
            "studentCode": "S1",
            "date": "2024-10-05",
            "presenceStatus": "present",
            "grades": [{ "value": 14 }],
            "assessments": [
                { "title": "quiz", "value": "عالی" },
                { "title": "homework", "value": "خوب" }
            ]
        }]}),
    );
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.classReport",
        json!({ "classCode": "C9A", "academicYear": 1403 }),
    );
    let month = &report["cards"][0]["courses"][0]["months"][0];
    assert_eq!(month["adjustedGrade"].as_f64(), Some(15.5));
    assert_eq!(month["adjustment"]["applied"][0]["source"], "courseOverride");
    assert_eq!(month["adjustment"]["applied"][1]["source"], "default");
}

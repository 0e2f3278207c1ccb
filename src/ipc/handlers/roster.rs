use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, parse_list, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AssessmentOverrides, Class, Course};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct TeacherRow {
    code: String,
    name: String,
}

fn upsert_class(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let raw = params
        .get("class")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing class"))?;
    let class: Class = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("class: {}", e)))?;
    if class.code.trim().is_empty() {
        return Err(HandlerErr::bad_params("class.code must not be empty"));
    }
    db::upsert_class(conn, &class).map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({
        "classCode": class.code,
        "students": class.students.len(),
        "teachers": class.teachers.len()
    }))
}

fn upsert_teachers(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let rows: Vec<TeacherRow> = parse_list(params, "teachers")?;
    let pairs: Vec<(String, String)> = rows.into_iter().map(|t| (t.code, t.name)).collect();
    let n = db::upsert_teachers(conn, &pairs)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "upserted": n }))
}

fn upsert_courses(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let courses: Vec<Course> = parse_list(params, "courses")?;
    let n = db::upsert_courses(conn, &courses)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "upserted": n }))
}

fn set_assessment_values(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let course_code = required_str(params, "courseCode")?;
    let Some(obj) = params.get("values").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("values must be an object"));
    };
    let mut values = AssessmentOverrides::new();
    for (label, v) in obj {
        let n = v
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| HandlerErr::bad_params(format!("values.{} must be a number", label)))?;
        values.insert(label.trim().to_string(), n);
    }
    db::set_assessment_values(conn, &course_code, &values)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "courseCode": course_code, "labels": values.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.upsertClass" => upsert_class(state, &req.params),
        "roster.upsertTeachers" => upsert_teachers(state, &req.params),
        "courses.upsert" => upsert_courses(state, &req.params),
        "assessmentValues.set" => set_assessment_values(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}

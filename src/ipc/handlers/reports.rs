use crate::config::EngineConfig;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, engine_config, required_i64, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Class, Directory, LessonRecord};
use crate::report_card::{build_class_report, compare_classes, ClassReport, ClassReportInput, ReportSkips};
use serde_json::{json, Map, Value};
use tracing::warn;

fn academic_year(params: &Value) -> Result<i32, HandlerErr> {
    let y = required_i64(params, "academicYear")?;
    i32::try_from(y)
        .ok()
        .filter(|y| (1300..=1500).contains(y))
        .ok_or_else(|| HandlerErr::bad_params("academicYear must be a Jalali year"))
}

fn log_skips(class_code: &str, skipped: &ReportSkips) {
    if !skipped.is_empty() {
        warn!(
            class = class_code,
            malformed_date = skipped.malformed_date,
            unknown_reference = skipped.unknown_reference,
            outside_year = skipped.outside_year,
            "records dropped from report"
        );
    }
}

fn report_for(
    class: &Class,
    directory: &Directory,
    records: &[LessonRecord],
    year: i32,
    config: &EngineConfig,
) -> ClassReport {
    let report = build_class_report(
        &ClassReportInput {
            class,
            directory,
            records,
            academic_year: year,
        },
        config,
    );
    log_skips(&class.code, &report.skipped);
    report
}

/// Human-readable breakdowns per student: the weighted average and every adjusted month.
fn explanations(report: &ClassReport) -> Value {
    let mut out = Map::new();
    for card in &report.cards {
        let mut months = Map::new();
        for course in &card.courses {
            for m in &course.months {
                if let Some(adj) = &m.adjustment {
                    months.insert(format!("{}/{}", course.course_code, m.month), json!(adj.explain()));
                }
            }
        }
        out.insert(
            card.student_code.clone(),
            json!({ "weighted": card.weighted.explain(), "months": months }),
        );
    }
    Value::Object(out)
}

fn class_report(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_code = required_str(params, "classCode")?;
    let year = academic_year(params)?;
    let class = db::load_class(conn, &class_code)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::new("not_found", format!("class not found: {}", class_code)))?;
    let directory = db::load_directory(conn).map_err(HandlerErr::query)?;
    let records = db::load_cells(conn, Some(&class_code)).map_err(HandlerErr::query)?;

    let config = engine_config(conn)?;
    let report = report_for(&class, &directory, &records, year, &config);
    let mut result = serde_json::to_value(&report)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if params.get("explain").and_then(|v| v.as_bool()) == Some(true) {
        result["explanations"] = explanations(&report);
    }
    Ok(result)
}

fn class_codes(items: &[Value]) -> Result<Vec<String>, HandlerErr> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str().map(str::trim) {
            Some(code) if !code.is_empty() => out.push(code.to_string()),
            _ => {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: format!("classCodes[{}] must be a class code", i),
                    details: Some(json!({ "index": i })),
                })
            }
        }
    }
    Ok(out)
}

fn class_comparison(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let year = academic_year(params)?;
    let codes = match params.get("classCodes").and_then(|v| v.as_array()) {
        Some(arr) => class_codes(arr)?,
        None => db::list_class_codes(conn).map_err(HandlerErr::query)?,
    };
    let directory = db::load_directory(conn).map_err(HandlerErr::query)?;
    let config = engine_config(conn)?;

    let mut reports = Vec::with_capacity(codes.len());
    for code in &codes {
        let Some(class) = db::load_class(conn, code).map_err(HandlerErr::query)? else {
            return Err(HandlerErr::new("not_found", format!("class not found: {}", code)));
        };
        let records = db::load_cells(conn, Some(code)).map_err(HandlerErr::query)?;
        reports.push(report_for(&class, &directory, &records, year, &config));
    }
    Ok(json!({
        "academicYear": year,
        "rows": compare_classes(&reports)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.classReport" => class_report(state, &req.params),
        "reports.classComparison" => class_comparison(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}

use crate::attendance::{by_absence_desc, day_view, eligible_records, summarize, unique_by_day, DayRange, SkipCounts};
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, engine_config, load_scope, optional_day, optional_str, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::PresenceStatus;
use serde_json::{json, Value};
use tracing::warn;

pub(crate) fn day_range(params: &Value) -> Result<DayRange, HandlerErr> {
    let range = DayRange {
        from: optional_day(params, "from")?,
        to: optional_day(params, "to")?,
    };
    if let (Some(f), Some(t)) = (range.from, range.to) {
        if f > t {
            return Err(HandlerErr::bad_params("from must not be after to"));
        }
    }
    Ok(range)
}

pub(crate) fn log_skips(method: &str, skipped: &SkipCounts) {
    if skipped.malformed_date > 0 || skipped.unknown_reference > 0 {
        warn!(
            method,
            malformed_date = skipped.malformed_date,
            unknown_reference = skipped.unknown_reference,
            "records dropped"
        );
    }
}

fn attendance_summary(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_code = optional_str(params, "classCode")?;
    let range = day_range(params)?;
    let today = optional_day(params, "today")?;
    let (roster, records) = load_scope(conn, class_code.as_deref())?;

    let summary = summarize(&records, &roster, &range);
    log_skips("attendance.summary", &summary.skipped);

    let ranking: Vec<Value> = by_absence_desc(&summary.per_student)
        .into_iter()
        .map(|(code, stats)| {
            json!({
                "studentCode": code,
                "studentName": roster.student_name(code),
                "absentPct": stats.absent_pct
            })
        })
        .collect();

    let mut result = json!({
        "perStudent": summary.per_student,
        "perCourse": summary.per_course,
        "dailyAbsenceHistogram": summary.daily_absence_histogram,
        "absenceRanking": ranking,
        "skipped": summary.skipped
    });
    if let Some(day) = today {
        result["today"] = json!(day_view(&records, &roster, day));
    }
    Ok(result)
}

fn attendance_unique_by_day(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let status_raw = required_str(params, "status")?;
    let status = match PresenceStatus::parse(&status_raw) {
        Some(s) if s != PresenceStatus::None => s,
        _ => return Err(HandlerErr::bad_params("status must be one of: present, absent, late")),
    };
    let class_code = optional_str(params, "classCode")?;
    let range = day_range(params)?;
    let config = engine_config(conn)?;
    let (roster, records) = load_scope(conn, class_code.as_deref())?;

    let mut skipped = SkipCounts::default();
    let eligible = eligible_records(&records, &roster, &range, &mut skipped);
    log_skips("attendance.uniqueByDay", &skipped);
    let kept = unique_by_day(eligible.iter().map(|d| d.record), status, config.dedup_order);

    Ok(json!({
        "status": status,
        "dedupOrder": config.dedup_order,
        "count": kept.len(),
        "records": kept,
        "skipped": skipped
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.summary" => attendance_summary(state, &req.params),
        "attendance.uniqueByDay" => attendance_unique_by_day(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}

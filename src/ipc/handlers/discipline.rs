use super::attendance::{day_range, log_skips};
use crate::discipline::summarize;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, load_scope, optional_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn discipline_summary(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_code = optional_str(params, "classCode")?;
    let range = day_range(params)?;
    let (roster, records) = load_scope(conn, class_code.as_deref())?;

    let summary = summarize(&records, &roster, &range);
    log_skips("discipline.summary", &summary.skipped);
    Ok(json!({
        "records": summary.records,
        "skipped": summary.skipped
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "discipline.summary" => Some(match discipline_summary(state, &req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}

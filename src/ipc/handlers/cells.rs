use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, parse_list, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::LessonRecord;
use serde_json::{json, Value};
use tracing::info;

fn import_cells(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let cells: Vec<LessonRecord> = parse_list(params, "cells")?;
    let n = db::insert_cells(conn, &cells)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    info!(imported = n, "cells imported");
    Ok(json!({ "imported": n }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cells.import" => Some(match import_cells(state, &req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}

use super::error::err;
use super::types::AppState;
use crate::config::{EngineConfig, ENGINE_SETTINGS_KEY};
use crate::db;
use crate::model::{LessonRecord, Roster};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn query(e: anyhow::Error) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be string", key))),
    }
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// `YYYY-MM-DD` parameter; timestamps are cut to their day like stored cell dates.
pub fn optional_day(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    let Some(raw) = optional_str(params, key)? else {
        return Ok(None);
    };
    crate::calendar::parse_record_day(&raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a YYYY-MM-DD date", key)))
}

/// Deserializes `params[key]` as a list, naming the first offending element on failure.
pub fn parse_list<T: DeserializeOwned>(params: &Value, key: &str) -> Result<Vec<T>, HandlerErr> {
    let Some(items) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params(format!("{} must be an array", key)));
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => out.push(v),
            Err(e) => {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: format!("{}[{}]: {}", key, i, e),
                    details: Some(serde_json::json!({ "index": i })),
                })
            }
        }
    }
    Ok(out)
}

/// Saved engine settings over their defaults.
pub fn engine_config(conn: &Connection) -> Result<EngineConfig, HandlerErr> {
    let saved = db::settings_get_json(conn, ENGINE_SETTINGS_KEY).map_err(HandlerErr::query)?;
    Ok(EngineConfig::from_saved(saved.as_ref()))
}

/// Roster and cells for one class, or for the whole workspace when `class_code` is `None`.
pub fn load_scope(
    conn: &Connection,
    class_code: Option<&str>,
) -> Result<(Roster, Vec<LessonRecord>), HandlerErr> {
    let roster = match class_code {
        Some(code) => {
            let class = db::load_class(conn, code)
                .map_err(HandlerErr::query)?
                .ok_or_else(|| HandlerErr::new("not_found", format!("class not found: {}", code)))?;
            Roster::new(vec![class])
        }
        None => db::load_roster(conn).map_err(HandlerErr::query)?,
    };
    let records = db::load_cells(conn, class_code).map_err(HandlerErr::query)?;
    Ok((roster, records))
}

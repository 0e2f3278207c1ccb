use crate::calendar::{academic_year_of, jalali_of, jalali_of_record, JalaliDate};
use crate::ipc::error::ok;
use crate::ipc::helpers::{optional_str, required_i64, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use serde_json::{json, Value};

fn to_jalali(params: &Value) -> Result<Value, HandlerErr> {
    let jd: JalaliDate = match optional_str(params, "date")? {
        Some(raw) => jalali_of_record(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unparseable date: {}", raw)))?,
        None => {
            let y = required_i64(params, "year")?;
            let m = required_i64(params, "month")?;
            let d = required_i64(params, "day")?;
            let date = i32::try_from(y)
                .ok()
                .zip(u32::try_from(m).ok())
                .zip(u32::try_from(d).ok())
                .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
                .ok_or_else(|| HandlerErr::bad_params("year/month/day is not a calendar date"))?;
            jalali_of(date)
        }
    };
    Ok(json!({
        "jalali": jd,
        "formatted": jd.to_string(),
        "academicYear": academic_year_of(jd)
    }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.toJalali" => Some(match to_jalali(&req.params) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}

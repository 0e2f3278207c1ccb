use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// Academic-year month order. The school year opens in Mehr (7) and closes in Tir (4);
/// Mordad (5) and Shahrivar (6) are summer and never appear on a report card.
pub const ACADEMIC_MONTHS: [u32; 10] = [7, 8, 9, 10, 11, 12, 1, 2, 3, 4];

const GREGORIAN_DAYS_BEFORE_MONTH: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct JalaliDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// Epoch-based Gregorian -> Solar Hijri conversion (33/4/1-year cycles).
///
/// Inputs are not validated: month must be 1..=12. Results are exact for the
/// 1700..=2100 CE range the school data lives in.
pub fn to_solar_hijri(gy: i32, gm: u32, gd: u32) -> (i32, u32, u32) {
    let gm = gm.clamp(1, 12);
    let (mut jy, gy) = if gy <= 1600 {
        (0_i64, gy as i64 - 621)
    } else {
        (979_i64, gy as i64 - 1600)
    };
    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 365 * gy + (gy2 + 3).div_euclid(4) - (gy2 + 99).div_euclid(100)
        + (gy2 + 399).div_euclid(400)
        - 80
        + gd as i64
        + GREGORIAN_DAYS_BEFORE_MONTH[(gm - 1) as usize];

    jy += 33 * days.div_euclid(12053);
    days = days.rem_euclid(12053);
    jy += 4 * days.div_euclid(1461);
    days = days.rem_euclid(1461);
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, days % 31 + 1)
    } else {
        (7 + (days - 186) / 30, (days - 186) % 30 + 1)
    };
    (jy as i32, jm as u32, jd as u32)
}

pub fn jalali_of(date: NaiveDate) -> JalaliDate {
    use chrono::Datelike;
    let (year, month, day) = to_solar_hijri(date.year(), date.month(), date.day());
    JalaliDate { year, month, day }
}

/// Calendar day of a stored cell date. Accepts `YYYY-MM-DD` and ISO timestamps; the day is
/// the literal date part, never shifted by a timezone.
pub fn parse_record_day(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    let date_part = t.split(['T', ' ']).next().unwrap_or(t);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Full instant of a cell date, used only for chronological ordering.
pub fn parse_record_instant(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    parse_record_day(t).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn jalali_of_record(raw: &str) -> Option<JalaliDate> {
    parse_record_day(raw).map(jalali_of)
}

/// The academic year a Jalali date falls in, named by the year it opens in.
pub fn academic_year_of(date: JalaliDate) -> i32 {
    if date.month >= 7 {
        date.year
    } else {
        date.year - 1
    }
}

pub fn in_academic_year(date: JalaliDate, selected_year: i32) -> bool {
    academic_year_of(date) == selected_year
}

pub fn is_academic_month(month: u32) -> bool {
    ACADEMIC_MONTHS.contains(&month)
}

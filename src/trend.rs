use crate::calc::round_off_1_decimal;
use crate::calendar::ACADEMIC_MONTHS;
use serde::Serialize;
use std::collections::BTreeMap;

/// Month-over-month change in percent, rounded to one decimal. `None` when either side is
/// missing or the previous value is zero.
pub fn progress_percent(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let (c, p) = (current?, previous?);
    if p == 0.0 {
        return None;
    }
    Some(round_off_1_decimal((c - p) / p * 100.0))
}

/// The month before `month` in the academic year. Mehr (7) opens the year and has none.
pub fn previous_academic_month(month: u32) -> Option<u32> {
    let idx = ACADEMIC_MONTHS.iter().position(|m| *m == month)?;
    if idx == 0 {
        None
    } else {
        Some(ACADEMIC_MONTHS[idx - 1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up,
    Flat,
    Down,
}

impl Direction {
    pub fn of(progress: f64) -> Self {
        if progress > 0.0 {
            Self::Up
        } else if progress < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub month: u32,
    pub value: Option<f64>,
    pub previous: Option<f64>,
    pub progress: Option<f64>,
    pub direction: Option<Direction>,
}

pub fn month_trends(monthly: &BTreeMap<u32, Option<f64>>) -> Vec<TrendPoint> {
    ACADEMIC_MONTHS
        .iter()
        .map(|&month| {
            let value = monthly.get(&month).copied().flatten();
            let previous = previous_academic_month(month)
                .and_then(|p| monthly.get(&p).copied().flatten());
            let progress = progress_percent(value, previous);
            TrendPoint {
                month,
                value,
                previous,
                progress,
                direction: progress.map(Direction::of),
            }
        })
        .collect()
}

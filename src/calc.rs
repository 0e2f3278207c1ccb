//! Shared numeric helpers. Every rounding in the engine goes through here so report cards,
//! attendance pages and rankings agree on the last digit.

/// Half-up rounding: `floor(x * 10^n + 0.5) / 10^n`.
///
/// Negative halves round toward positive infinity (-2.25 -> -2.2 at one decimal), matching
/// the figures the school already prints.
pub fn round_half_up(x: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    ((x * factor) + 0.5).floor() / factor
}

pub fn round_off_1_decimal(x: f64) -> f64 {
    round_half_up(x, 1)
}

pub fn round_off_2_decimals(x: f64) -> f64 {
    round_half_up(x, 2)
}

/// Integer percentage of `count` in `total`; a zero total yields 0.
pub fn percent(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    round_half_up(count as f64 / total as f64 * 100.0, 0) as u32
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn clamp_grade(x: f64) -> f64 {
    x.clamp(0.0, 20.0)
}

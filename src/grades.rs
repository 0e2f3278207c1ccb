use crate::calc::{clamp_grade, mean, round_off_2_decimals};
use crate::calendar::ACADEMIC_MONTHS;
use crate::config::MonthlyMerge;
use crate::model::{AssessmentEntry, AssessmentOverrides};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Default label -> adjustment scale used when a course has no override for a label.
pub const DEFAULT_ASSESSMENT_SCALE: [(&str, f64); 5] = [
    ("عالی", 2.0),
    ("خوب", 1.0),
    ("متوسط", 0.0),
    ("ضعیف", -1.0),
    ("بسیار ضعیف", -2.0),
];

pub fn default_adjustment(label: &str) -> Option<f64> {
    DEFAULT_ASSESSMENT_SCALE
        .iter()
        .find(|(l, _)| *l == label.trim())
        .map(|(_, v)| *v)
}

/// Mean of the grades written in one cell. `None` for a cell without grades.
///
/// Non-finite values are ignored; anything else is clamped into `[0, 20]` first.
pub fn compute_monthly_grade(cell_grades: &[f64]) -> Option<f64> {
    let values: Vec<f64> = cell_grades
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(clamp_grade)
        .collect();
    mean(&values)
}

/// Folds cell means of one (student, course, month) in processing order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthAccumulator {
    pairwise: Option<f64>,
    sum: f64,
    count: u32,
}

impl MonthAccumulator {
    pub fn push(&mut self, cell_mean: f64) {
        self.pairwise = Some(match self.pairwise {
            None => cell_mean,
            Some(current) => (current + cell_mean) / 2.0,
        });
        self.sum += cell_mean;
        self.count += 1;
    }

    pub fn cells(&self) -> u32 {
        self.count
    }

    pub fn value(&self, merge: MonthlyMerge) -> Option<f64> {
        match merge {
            MonthlyMerge::Pairwise => self.pairwise,
            MonthlyMerge::RunningMean if self.count > 0 => Some(self.sum / self.count as f64),
            MonthlyMerge::RunningMean => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdjustmentSource {
    CourseOverride,
    Default,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAdjustment {
    pub label: String,
    pub value: f64,
    pub source: AdjustmentSource,
}

/// Monthly grade after qualitative assessments, with the parts it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAdjustment {
    pub base: f64,
    pub applied: Vec<AppliedAdjustment>,
    pub total: f64,
    pub adjusted: f64,
    pub clamped: bool,
}

impl GradeAdjustment {
    pub fn explain(&self) -> String {
        let mut out = format!("base {:.2}", self.base);
        for a in &self.applied {
            let _ = write!(out, " {:+} ({})", a.value, a.label);
        }
        let _ = write!(out, " = {:.2}", self.base + self.total);
        if self.clamped {
            let _ = write!(out, " -> clamped to {:.2}", self.adjusted);
        }
        out
    }
}

pub fn lookup_adjustment(label: &str, overrides: Option<&AssessmentOverrides>) -> AppliedAdjustment {
    let label = label.trim();
    if let Some(v) = overrides.and_then(|o| o.get(label)).filter(|v| v.is_finite()) {
        return AppliedAdjustment {
            label: label.to_string(),
            value: *v,
            source: AdjustmentSource::CourseOverride,
        };
    }
    match default_adjustment(label) {
        Some(v) => AppliedAdjustment {
            label: label.to_string(),
            value: v,
            source: AdjustmentSource::Default,
        },
        None => AppliedAdjustment {
            label: label.to_string(),
            value: 0.0,
            source: AdjustmentSource::Unknown,
        },
    }
}

/// Adds the mapped adjustment of every assessment to `raw` and clamps to `[0, 20]`.
pub fn apply_assessments(
    raw: f64,
    assessments: &[AssessmentEntry],
    overrides: Option<&AssessmentOverrides>,
) -> GradeAdjustment {
    let applied: Vec<AppliedAdjustment> = assessments
        .iter()
        .map(|a| lookup_adjustment(&a.value, overrides))
        .collect();
    let total: f64 = applied.iter().map(|a| a.value).sum();
    let unclamped = raw + total;
    let adjusted = clamp_grade(unclamped);
    GradeAdjustment {
        base: raw,
        applied,
        total,
        adjusted,
        clamped: adjusted != unclamped,
    }
}

/// Mean of the adjusted grades present in the ten academic months. Summer months are
/// ignored even if a value was recorded for them.
pub fn year_average(monthly_adjusted: &BTreeMap<u32, Option<f64>>) -> Option<f64> {
    let values: Vec<f64> = ACADEMIC_MONTHS
        .iter()
        .filter_map(|m| monthly_adjusted.get(m).copied().flatten())
        .collect();
    mean(&values)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedLine {
    pub course_code: String,
    pub course_name: String,
    pub grade: f64,
    pub credit: u32,
    pub weighted_value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedBreakdown {
    pub lines: Vec<WeightedLine>,
    pub weighted_sum: f64,
    pub total_credit: u64,
    pub average: Option<f64>,
}

impl WeightedBreakdown {
    pub fn explain(&self) -> String {
        let mut out = String::new();
        for l in &self.lines {
            let _ = writeln!(
                out,
                "{}: {:.2} x {} = {:.2}",
                l.course_name, l.grade, l.credit, l.weighted_value
            );
        }
        let _ = writeln!(out, "sum {:.2} / credits {}", self.weighted_sum, self.total_credit);
        match self.average {
            Some(avg) => {
                let _ = write!(out, "average {:.2}", avg);
            }
            None => out.push_str("average -"),
        }
        out
    }
}

pub struct WeightedInput<'a> {
    pub course_code: &'a str,
    pub course_name: &'a str,
    pub year_average: Option<f64>,
    pub credit: u32,
}

/// Credit-weighted mean of the courses that have a year average, rounded to 2 decimals.
pub fn weighted_breakdown<'a, I>(items: I) -> WeightedBreakdown
where
    I: IntoIterator<Item = WeightedInput<'a>>,
{
    let mut out = WeightedBreakdown::default();
    for item in items {
        let Some(avg) = item.year_average else {
            continue;
        };
        let credit = item.credit.max(1);
        let weighted_value = avg * credit as f64;
        out.weighted_sum += weighted_value;
        out.total_credit += u64::from(credit);
        out.lines.push(WeightedLine {
            course_code: item.course_code.to_string(),
            course_name: item.course_name.to_string(),
            grade: avg,
            credit,
            weighted_value,
        });
    }
    let pairs: Vec<(Option<f64>, u32)> = out.lines.iter().map(|l| (Some(l.grade), l.credit)).collect();
    out.average = weighted_average(&pairs);
    out
}

/// Σ(average × credit) / Σ(credit) over the entries that have an average. Credits below 1
/// count as 1.
pub fn weighted_average(items: &[(Option<f64>, u32)]) -> Option<f64> {
    let mut sum = 0.0;
    let mut credits = 0_u64;
    for (avg, credit) in items {
        let Some(avg) = avg else {
            continue;
        };
        let credit = (*credit).max(1);
        sum += avg * credit as f64;
        credits += u64::from(credit);
    }
    if credits == 0 {
        return None;
    }
    Some(round_off_2_decimals(sum / credits as f64))
}

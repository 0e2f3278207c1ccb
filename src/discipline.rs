use crate::attendance::{eligible_records, DayRange, SkipCounts};
use crate::model::{LessonRecord, PresenceStatus, Roster};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplinaryRecord {
    pub student_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    pub total_absences: u32,
    pub distinct_absence_days: u32,
    pub acceptable_absences: u32,
    pub distinct_acceptable_absence_days: u32,
    pub acceptable_absence_notes: Vec<String>,
    pub total_late: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisciplineSummary {
    pub records: Vec<DisciplinaryRecord>,
    pub skipped: SkipCounts,
}

#[derive(Default)]
struct Tally {
    record: DisciplinaryRecord,
    absence_days: HashSet<NaiveDate>,
    acceptable_days: HashSet<NaiveDate>,
}

/// Per-student absence and lateness totals over raw (not day-deduplicated) records.
///
/// Students appear in order of their first absent/late record, then the list is stably
/// sorted by total absences, most first.
pub fn summarize(records: &[LessonRecord], roster: &Roster, range: &DayRange) -> DisciplineSummary {
    let mut skipped = SkipCounts::default();
    let mut order: Vec<Tally> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for d in eligible_records(records, roster, range, &mut skipped) {
        let r = d.record;
        if !matches!(r.presence_status, PresenceStatus::Absent | PresenceStatus::Late) {
            continue;
        }
        let i = *index.entry(r.student_code.as_str()).or_insert_with(|| {
            order.push(Tally {
                record: DisciplinaryRecord {
                    student_code: r.student_code.clone(),
                    student_name: roster.student_name(&r.student_code).map(str::to_string),
                    ..Default::default()
                },
                ..Default::default()
            });
            order.len() - 1
        });
        let t = &mut order[i];

        if r.presence_status == PresenceStatus::Late {
            t.record.total_late += 1;
            continue;
        }
        t.record.total_absences += 1;
        t.absence_days.insert(d.day);
        if r.absence_acceptable == Some(true) {
            t.record.acceptable_absences += 1;
            t.acceptable_days.insert(d.day);
            if let Some(note) = r.absence_note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                if !t.record.acceptable_absence_notes.iter().any(|n| n == note) {
                    t.record.acceptable_absence_notes.push(note.to_string());
                }
            }
        }
    }

    let mut out: Vec<DisciplinaryRecord> = order
        .into_iter()
        .map(|t| {
            let mut rec = t.record;
            rec.distinct_absence_days = t.absence_days.len() as u32;
            rec.distinct_acceptable_absence_days = t.acceptable_days.len() as u32;
            rec
        })
        .collect();
    out.sort_by(|a, b| b.total_absences.cmp(&a.total_absences));

    DisciplineSummary {
        records: out,
        skipped,
    }
}

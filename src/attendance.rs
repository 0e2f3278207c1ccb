use crate::calc::percent;
use crate::calendar::{parse_record_day, parse_record_instant};
use crate::config::DedupOrder;
use crate::model::{LessonRecord, PresenceStatus, Roster};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceCounts {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub total: u32,
}

impl PresenceCounts {
    /// Counts one mark. Cells without a mark do not change the total.
    pub fn record(&mut self, status: PresenceStatus) {
        match status {
            PresenceStatus::Present => self.present += 1,
            PresenceStatus::Absent => self.absent += 1,
            PresenceStatus::Late => self.late += 1,
            PresenceStatus::None => return,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastStatus {
    pub date: String,
    pub status: PresenceStatus,
    pub course_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStats {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub total: u32,
    pub present_pct: u32,
    pub absent_pct: u32,
    pub late_pct: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<LastStatus>,
}

impl PresenceStats {
    fn from_counts(c: PresenceCounts, last_status: Option<LastStatus>) -> Self {
        Self {
            present: c.present,
            absent: c.absent,
            late: c.late,
            total: c.total,
            present_pct: percent(c.present, c.total),
            absent_pct: percent(c.absent, c.total),
            late_pct: percent(c.late, c.total),
            last_status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCounts {
    pub malformed_date: u32,
    pub unknown_reference: u32,
}

/// Inclusive calendar-day window; open ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DayRange {
    pub fn single(day: NaiveDate) -> Self {
        Self {
            from: Some(day),
            to: Some(day),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from.map(|f| day >= f).unwrap_or(true) && self.to.map(|t| day <= t).unwrap_or(true)
    }
}

/// A record that passed reference and date checks, with its calendar day.
#[derive(Debug, Clone, Copy)]
pub struct DatedRecord<'a> {
    pub record: &'a LessonRecord,
    pub day: NaiveDate,
}

/// Drops records pointing at an unknown class/student or carrying an unparseable date,
/// then keeps the ones inside `range`. Input order is preserved.
pub fn eligible_records<'a>(
    records: &'a [LessonRecord],
    roster: &Roster,
    range: &DayRange,
    skipped: &mut SkipCounts,
) -> Vec<DatedRecord<'a>> {
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        if !roster.knows(record) {
            skipped.unknown_reference += 1;
            continue;
        }
        let Some(day) = parse_record_day(&record.date) else {
            skipped.malformed_date += 1;
            continue;
        };
        if range.contains(day) {
            out.push(DatedRecord { record, day });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub day: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub per_student: BTreeMap<String, PresenceStats>,
    pub per_course: BTreeMap<String, PresenceStats>,
    pub daily_absence_histogram: Vec<DailyCount>,
    pub skipped: SkipCounts,
}

pub fn summarize(records: &[LessonRecord], roster: &Roster, range: &DayRange) -> AttendanceSummary {
    let mut skipped = SkipCounts::default();
    let dated = eligible_records(records, roster, range, &mut skipped);

    let mut student_counts: BTreeMap<String, PresenceCounts> = BTreeMap::new();
    let mut course_counts: BTreeMap<String, PresenceCounts> = BTreeMap::new();
    let mut last: HashMap<&str, (Option<chrono::NaiveDateTime>, &LessonRecord)> = HashMap::new();
    let mut absences_by_day: BTreeMap<String, u32> = BTreeMap::new();

    for d in &dated {
        let r = d.record;
        // Unmarked records still open a row and can be the latest status; `record` ignores them.
        student_counts
            .entry(r.student_code.clone())
            .or_default()
            .record(r.presence_status);

        let instant = parse_record_instant(&r.date);
        // Only a strictly later record replaces the current one, so ties keep input order.
        let newer = match last.get(r.student_code.as_str()) {
            None => true,
            Some((Some(prev), _)) => instant.map(|i| i > *prev).unwrap_or(false),
            Some((None, _)) => instant.is_some(),
        };
        if newer {
            last.insert(r.student_code.as_str(), (instant, r));
        }

        if r.presence_status == PresenceStatus::None {
            continue;
        }
        course_counts
            .entry(r.course_code.clone())
            .or_default()
            .record(r.presence_status);

        if r.presence_status == PresenceStatus::Absent {
            *absences_by_day
                .entry(d.day.format("%Y-%m-%d").to_string())
                .or_insert(0) += 1;
        }
    }

    let per_student = student_counts
        .into_iter()
        .map(|(code, counts)| {
            let last_status = last.get(code.as_str()).map(|(_, r)| LastStatus {
                date: r.date.clone(),
                status: r.presence_status,
                course_code: r.course_code.clone(),
            });
            let stats = PresenceStats::from_counts(counts, last_status);
            (code, stats)
        })
        .collect();
    let per_course = course_counts
        .into_iter()
        .map(|(code, counts)| (code, PresenceStats::from_counts(counts, None)))
        .collect();
    let daily_absence_histogram = absences_by_day
        .into_iter()
        .map(|(day, count)| DailyCount { day, count })
        .collect();

    AttendanceSummary {
        per_student,
        per_course,
        daily_absence_histogram,
        skipped,
    }
}

/// Ranks a stats map by absence percentage, highest first. Equal percentages keep key order.
pub fn by_absence_desc(stats: &BTreeMap<String, PresenceStats>) -> Vec<(&str, &PresenceStats)> {
    let mut rows: Vec<(&str, &PresenceStats)> = stats.iter().map(|(k, v)| (k.as_str(), v)).collect();
    rows.sort_by(|a, b| b.1.absent_pct.cmp(&a.1.absent_pct));
    rows
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView<'a> {
    pub absent: Vec<&'a LessonRecord>,
    pub late: Vec<&'a LessonRecord>,
}

/// Absent and late cells of a single calendar day ("today" page).
pub fn day_view<'a>(records: &'a [LessonRecord], roster: &Roster, day: NaiveDate) -> DayView<'a> {
    let mut skipped = SkipCounts::default();
    let mut view = DayView::default();
    for d in eligible_records(records, roster, &DayRange::single(day), &mut skipped) {
        match d.record.presence_status {
            PresenceStatus::Absent => view.absent.push(d.record),
            PresenceStatus::Late => view.late.push(d.record),
            _ => {}
        }
    }
    view
}

fn time_slot_cmp(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.trim().cmp(b.trim()),
    }
}

/// One record per (student, calendar day) among records with `status`.
///
/// Groups come out in order of first appearance. Which record represents a group depends on
/// `order`; equal time slots fall back to input order.
pub fn unique_by_day<'a, I>(records: I, status: PresenceStatus, order: DedupOrder) -> Vec<&'a LessonRecord>
where
    I: IntoIterator<Item = &'a LessonRecord>,
{
    let mut kept: Vec<&LessonRecord> = Vec::new();
    let mut index: HashMap<(&str, NaiveDate), usize> = HashMap::new();
    for r in records {
        if r.presence_status != status {
            continue;
        }
        let Some(day) = parse_record_day(&r.date) else {
            continue;
        };
        match index.get(&(r.student_code.as_str(), day)) {
            None => {
                index.insert((r.student_code.as_str(), day), kept.len());
                kept.push(r);
            }
            Some(&i) => {
                if order == DedupOrder::LowestTimeSlot
                    && time_slot_cmp(&r.time_slot, &kept[i].time_slot) == Ordering::Less
                {
                    kept[i] = r;
                }
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Student, TeacherCourse};

    fn roster() -> Roster {
        Roster::new(vec![Class {
            code: "C1".into(),
            name: "7A".into(),
            students: vec![
                Student {
                    code: "S1".into(),
                    name: "Sara".into(),
                },
                Student {
                    code: "S2".into(),
                    name: "Reza".into(),
                },
            ],
            teachers: vec![TeacherCourse {
                teacher_code: "T1".into(),
                course_code: "101".into(),
            }],
        }])
    }

    fn cell(student: &str, course: &str, date: &str, slot: &str, status: PresenceStatus) -> LessonRecord {
        LessonRecord {
            class_code: "C1".into(),
            course_code: course.into(),
            teacher_code: "T1".into(),
            student_code: student.into(),
            date: date.into(),
            time_slot: slot.into(),
            presence_status: status,
            grades: vec![],
            assessments: vec![],
            absence_acceptable: None,
            absence_note: None,
        }
    }

    #[test]
    fn counts_and_percentages_per_student_and_course() {
        use PresenceStatus::*;
        let records = vec![
            cell("S1", "101", "2024-10-05", "1", Present),
            cell("S1", "101", "2024-10-06", "1", Absent),
            cell("S1", "102", "2024-10-06", "2", Late),
            cell("S2", "101", "2024-10-06", "1", Absent),
            cell("S2", "101", "2024-10-07", "1", None),
        ];
        let s = summarize(&records, &roster(), &DayRange::default());
        let s1 = &s.per_student["S1"];
        assert_eq!((s1.present, s1.absent, s1.late, s1.total), (1, 1, 1, 3));
        assert_eq!((s1.present_pct, s1.absent_pct, s1.late_pct), (33, 33, 33));
        let s2 = &s.per_student["S2"];
        assert_eq!(s2.total, 1);
        assert_eq!(s2.absent_pct, 100);
        assert_eq!(s.per_course["101"].absent, 2);
        assert_eq!(s.per_course["102"].late_pct, 100);
        assert_eq!(
            s.daily_absence_histogram,
            vec![DailyCount {
                day: "2024-10-06".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn unmarked_records_set_last_status_and_open_a_row() {
        let records = vec![
            cell("S1", "101", "2024-10-05", "1", PresenceStatus::Absent),
            cell("S1", "101", "2024-10-09", "1", PresenceStatus::None),
            cell("S2", "101", "2024-10-09", "1", PresenceStatus::None),
        ];
        let s = summarize(&records, &roster(), &DayRange::default());
        let s1 = &s.per_student["S1"];
        assert_eq!((s1.absent, s1.total, s1.absent_pct), (1, 1, 100));
        let last = s1.last_status.clone().expect("last");
        assert_eq!(last.date, "2024-10-09");
        assert_eq!(last.status, PresenceStatus::None);

        let s2 = &s.per_student["S2"];
        assert_eq!(s2.total, 0);
        assert_eq!((s2.present_pct, s2.absent_pct, s2.late_pct), (0, 0, 0));
        assert_eq!(s2.last_status.as_ref().map(|l| l.status), Some(PresenceStatus::None));
        assert_eq!(s.per_course["101"].total, 1);
    }

    #[test]
    fn last_status_is_latest_and_ties_keep_first() {
        use PresenceStatus::*;
        let records = vec![
            cell("S1", "101", "2024-10-06T08:00:00Z", "1", Absent),
            cell("S1", "102", "2024-10-06T08:00:00Z", "1", Late),
            cell("S1", "101", "2024-10-05T08:00:00Z", "1", Present),
        ];
        let s = summarize(&records, &roster(), &DayRange::default());
        let last = s.per_student["S1"].last_status.clone().expect("last");
        assert_eq!(last.status, Absent);
        assert_eq!(last.course_code, "101");
    }

    #[test]
    fn unknown_students_and_bad_dates_are_skipped() {
        use PresenceStatus::*;
        let records = vec![
            cell("S9", "101", "2024-10-05", "1", Absent),
            cell("S1", "101", "yesterday", "1", Absent),
            cell("S1", "101", "2024-10-05", "1", Absent),
        ];
        let s = summarize(&records, &roster(), &DayRange::default());
        assert_eq!(s.skipped.unknown_reference, 1);
        assert_eq!(s.skipped.malformed_date, 1);
        assert_eq!(s.per_student.len(), 1);
        assert_eq!(s.per_student["S1"].absent, 1);
    }

    #[test]
    fn empty_input_has_zero_percentages() {
        let s = summarize(&[], &roster(), &DayRange::default());
        assert!(s.per_student.is_empty());
        assert_eq!(PresenceStats::from_counts(PresenceCounts::default(), None).absent_pct, 0);
    }

    #[test]
    fn range_limits_the_window() {
        let records = vec![
            cell("S1", "101", "2024-10-05", "1", PresenceStatus::Absent),
            cell("S1", "101", "2024-10-09", "1", PresenceStatus::Absent),
        ];
        let range = DayRange {
            from: NaiveDate::from_ymd_opt(2024, 10, 6),
            to: None,
        };
        let s = summarize(&records, &roster(), &range);
        assert_eq!(s.per_student["S1"].absent, 1);
    }

    #[test]
    fn day_view_splits_absent_and_late() {
        use PresenceStatus::*;
        let records = vec![
            cell("S1", "101", "2024-10-05", "1", Absent),
            cell("S2", "101", "2024-10-05T10:00:00Z", "2", Late),
            cell("S2", "101", "2024-10-06", "1", Absent),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 10, 5).expect("day");
        let v = day_view(&records, &roster(), day);
        assert_eq!(v.absent.len(), 1);
        assert_eq!(v.late.len(), 1);
        assert_eq!(v.late[0].student_code, "S2");
    }

    #[test]
    fn unique_by_day_keeps_one_record_per_student_day() {
        use PresenceStatus::*;
        let records = vec![
            cell("S1", "102", "2024-10-05", "3", Absent),
            cell("S1", "101", "2024-10-05T09:00:00Z", "1", Absent),
            cell("S2", "101", "2024-10-05", "2", Absent),
            cell("S1", "101", "2024-10-06", "1", Absent),
            cell("S1", "101", "2024-10-06", "1", Late),
        ];
        let first = unique_by_day(&records, Absent, DedupOrder::FirstEncountered);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].course_code, "102");

        let lowest = unique_by_day(&records, Absent, DedupOrder::LowestTimeSlot);
        assert_eq!(lowest.len(), 3);
        assert_eq!(lowest[0].course_code, "101");
        assert_eq!(lowest[1].student_code, "S2");
    }

    #[test]
    fn numeric_time_slots_compare_as_numbers() {
        assert_eq!(time_slot_cmp("10", "9"), Ordering::Greater);
        assert_eq!(time_slot_cmp("08:00", "10:30"), Ordering::Less);
    }

    #[test]
    fn absence_ranking_is_descending() {
        use PresenceStatus::*;
        let records = vec![
            cell("S1", "101", "2024-10-05", "1", Present),
            cell("S2", "101", "2024-10-05", "1", Absent),
        ];
        let s = summarize(&records, &roster(), &DayRange::default());
        let rows = by_absence_desc(&s.per_student);
        assert_eq!(rows[0].0, "S2");
    }
}

use crate::attendance::PresenceCounts;
use crate::calc::{mean, round_off_2_decimals};
use crate::calendar::{in_academic_year, is_academic_month, jalali_of_record, ACADEMIC_MONTHS};
use crate::config::EngineConfig;
use crate::grades::{
    apply_assessments, compute_monthly_grade, weighted_breakdown, year_average, GradeAdjustment,
    MonthAccumulator, WeightedBreakdown, WeightedInput,
};
use crate::model::{AssessmentEntry, Class, Directory, LessonRecord};
use crate::ranking::rank;
use crate::trend::{month_trends, TrendPoint};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub struct ClassReportInput<'a> {
    pub class: &'a Class,
    pub directory: &'a Directory,
    pub records: &'a [LessonRecord],
    /// Jalali year the academic year opens in (1403 covers Mehr 1403 .. Tir 1404).
    pub academic_year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCourseStat {
    pub month: u32,
    pub raw_grade: Option<f64>,
    pub adjusted_grade: Option<f64>,
    pub grade_cells: u32,
    pub assessments: Vec<AssessmentEntry>,
    pub presence: PresenceCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<GradeAdjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseYearStat {
    pub course_code: String,
    pub course_name: String,
    pub teacher_code: String,
    pub teacher_name: String,
    pub credit: u32,
    pub months: Vec<MonthlyCourseStat>,
    pub year_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_rank: Option<u32>,
    pub trends: Vec<TrendPoint>,
}

impl CourseYearStat {
    pub fn month(&self, month: u32) -> Option<&MonthlyCourseStat> {
        self.months.iter().find(|m| m.month == month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReportCard {
    pub student_code: String,
    pub student_name: String,
    pub courses: Vec<CourseYearStat>,
    pub weighted: WeightedBreakdown,
    pub weighted_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_rank: Option<u32>,
}

impl StudentReportCard {
    pub fn course(&self, course_code: &str) -> Option<&CourseYearStat> {
        self.courses.iter().find(|c| c.course_code == course_code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRankings {
    /// course -> month -> student -> rank
    pub course_month: BTreeMap<String, BTreeMap<u32, BTreeMap<String, u32>>>,
    /// course -> student -> rank
    pub course_year: BTreeMap<String, BTreeMap<String, u32>>,
    pub overall: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSkips {
    pub malformed_date: u32,
    pub unknown_reference: u32,
    pub outside_year: u32,
}

impl ReportSkips {
    pub fn is_empty(&self) -> bool {
        self.malformed_date == 0 && self.unknown_reference == 0 && self.outside_year == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class_code: String,
    pub class_name: String,
    pub academic_year: i32,
    pub cards: Vec<StudentReportCard>,
    pub rankings: ClassRankings,
    pub skipped: ReportSkips,
}

#[derive(Default)]
struct MonthCell {
    grades: MonthAccumulator,
    assessments: Vec<AssessmentEntry>,
    presence: PresenceCounts,
}

/// (course code, teacher code) in the order the class lists them; a course taught by two
/// teachers appears once, under the first.
fn class_courses(class: &Class) -> Vec<(&str, &str)> {
    let mut out: Vec<(&str, &str)> = Vec::new();
    for t in &class.teachers {
        if !out.iter().any(|(c, _)| *c == t.course_code) {
            out.push((t.course_code.as_str(), t.teacher_code.as_str()));
        }
    }
    out
}

pub fn build_class_report(input: &ClassReportInput<'_>, config: &EngineConfig) -> ClassReport {
    let class = input.class;
    let mut skipped = ReportSkips::default();
    let mut cells: HashMap<(&str, &str, u32), MonthCell> = HashMap::new();

    for r in input.records.iter().filter(|r| r.class_code == class.code) {
        if !class.has_student(&r.student_code) || !class.teaches(&r.teacher_code, &r.course_code) {
            skipped.unknown_reference += 1;
            continue;
        }
        let Some(jd) = jalali_of_record(&r.date) else {
            skipped.malformed_date += 1;
            continue;
        };
        if !in_academic_year(jd, input.academic_year) || !is_academic_month(jd.month) {
            skipped.outside_year += 1;
            continue;
        }
        let cell = cells
            .entry((r.student_code.as_str(), r.course_code.as_str(), jd.month))
            .or_default();
        let values: Vec<f64> = r.grades.iter().map(|g| g.value).collect();
        if let Some(cell_mean) = compute_monthly_grade(&values) {
            cell.grades.push(cell_mean);
        }
        cell.assessments.extend(r.assessments.iter().cloned());
        cell.presence.record(r.presence_status);
    }

    let courses = class_courses(class);
    let mut cards: Vec<StudentReportCard> = class
        .students
        .iter()
        .map(|student| {
            let course_stats: Vec<CourseYearStat> = courses
                .iter()
                .map(|&(course_code, teacher_code)| {
                    let overrides = input.directory.overrides(course_code);
                    let months: Vec<MonthlyCourseStat> = ACADEMIC_MONTHS
                        .iter()
                        .map(|&month| {
                            let cell = cells.get(&(student.code.as_str(), course_code, month));
                            let raw_grade = cell.and_then(|c| c.grades.value(config.monthly_merge));
                            let assessments = cell.map(|c| c.assessments.clone()).unwrap_or_default();
                            // Assessments only move a month that has a numeric grade.
                            let adjustment =
                                raw_grade.map(|raw| apply_assessments(raw, &assessments, overrides));
                            MonthlyCourseStat {
                                month,
                                raw_grade,
                                adjusted_grade: adjustment.as_ref().map(|a| a.adjusted),
                                grade_cells: cell.map(|c| c.grades.cells()).unwrap_or(0),
                                assessments,
                                presence: cell.map(|c| c.presence).unwrap_or_default(),
                                adjustment,
                                rank: None,
                            }
                        })
                        .collect();
                    let adjusted: BTreeMap<u32, Option<f64>> =
                        months.iter().map(|m| (m.month, m.adjusted_grade)).collect();
                    CourseYearStat {
                        course_code: course_code.to_string(),
                        course_name: input.directory.course_name(course_code),
                        teacher_code: teacher_code.to_string(),
                        teacher_name: input.directory.teacher_name(teacher_code),
                        credit: input.directory.credit(course_code),
                        year_average: year_average(&adjusted),
                        year_rank: None,
                        trends: month_trends(&adjusted),
                        months,
                    }
                })
                .collect();
            let weighted = weighted_breakdown(course_stats.iter().map(|c| WeightedInput {
                course_code: &c.course_code,
                course_name: &c.course_name,
                year_average: c.year_average,
                credit: c.credit,
            }));
            StudentReportCard {
                student_code: student.code.clone(),
                student_name: student.name.clone(),
                courses: course_stats,
                weighted_average: weighted.average,
                weighted,
                overall_rank: None,
            }
        })
        .collect();

    let rankings = class_rankings(&cards, &courses, config);
    for card in &mut cards {
        card.overall_rank = rankings.overall.get(&card.student_code).copied();
        for course in &mut card.courses {
            course.year_rank = rankings
                .course_year
                .get(&course.course_code)
                .and_then(|r| r.get(&card.student_code))
                .copied();
            for m in &mut course.months {
                m.rank = rankings
                    .course_month
                    .get(&course.course_code)
                    .and_then(|by_month| by_month.get(&m.month))
                    .and_then(|r| r.get(&card.student_code))
                    .copied();
            }
        }
    }

    ClassReport {
        class_code: class.code.clone(),
        class_name: class.name.clone(),
        academic_year: input.academic_year,
        cards,
        rankings,
        skipped,
    }
}

fn class_rankings(cards: &[StudentReportCard], courses: &[(&str, &str)], config: &EngineConfig) -> ClassRankings {
    let mut out = ClassRankings::default();
    for &(course_code, _) in courses {
        let mut by_month = BTreeMap::new();
        for month in ACADEMIC_MONTHS {
            let cohort = cards.iter().map(|card| {
                let score = card
                    .course(course_code)
                    .and_then(|c| c.month(month))
                    .and_then(|m| m.adjusted_grade);
                (card.student_code.as_str(), score)
            });
            let ranks = rank(cohort, config.rank_policy);
            if !ranks.is_empty() {
                by_month.insert(month, ranks);
            }
        }
        out.course_month.insert(course_code.to_string(), by_month);

        let cohort = cards.iter().map(|card| {
            (
                card.student_code.as_str(),
                card.course(course_code).and_then(|c| c.year_average),
            )
        });
        out.course_year
            .insert(course_code.to_string(), rank(cohort, config.rank_policy));
    }
    out.overall = rank(
        cards
            .iter()
            .map(|card| (card.student_code.as_str(), card.weighted_average)),
        config.rank_policy,
    );
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassComparisonRow {
    pub class_code: String,
    pub class_name: String,
    pub class_average: Option<f64>,
    pub student_count: u32,
    pub students_with_grades: u32,
}

/// One row per class, best class average first; classes without any graded student last.
pub fn compare_classes(reports: &[ClassReport]) -> Vec<ClassComparisonRow> {
    let mut rows: Vec<ClassComparisonRow> = reports
        .iter()
        .map(|report| {
            let averages: Vec<f64> = report.cards.iter().filter_map(|c| c.weighted_average).collect();
            ClassComparisonRow {
                class_code: report.class_code.clone(),
                class_name: report.class_name.clone(),
                class_average: mean(&averages).map(round_off_2_decimals),
                student_count: report.cards.len() as u32,
                students_with_grades: averages.len() as u32,
            }
        })
        .collect();
    rows.sort_by(|a, b| match (a.class_average, b.class_average) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonthlyMerge, RankPolicy};
    use crate::model::{Course, GradeEntry, PresenceStatus, Student, TeacherCourse};

    fn class() -> Class {
        Class {
            code: "C1".into(),
            name: "9A".into(),
            students: vec![
                Student {
                    code: "S1".into(),
                    name: "Sara".into(),
                },
                Student {
                    code: "S2".into(),
                    name: "Reza".into(),
                },
                Student {
                    code: "S3".into(),
                    name: "Nima".into(),
                },
            ],
            teachers: vec![
                TeacherCourse {
                    teacher_code: "T1".into(),
                    course_code: "MATH".into(),
                },
                TeacherCourse {
                    teacher_code: "T2".into(),
                    course_code: "ART".into(),
                },
            ],
        }
    }

    fn directory() -> Directory {
        let mut d = Directory::default();
        d.teachers.insert("T1".into(), "Mr. Karimi".into());
        d.courses.insert(
            "MATH".into(),
            Course {
                code: "MATH".into(),
                name: "Math".into(),
                teacher_name: None,
                credit: Some(2),
            },
        );
        d.courses.insert(
            "ART".into(),
            Course {
                code: "ART".into(),
                name: "Art".into(),
                teacher_name: None,
                credit: None,
            },
        );
        d
    }

    fn graded(student: &str, teacher: &str, course: &str, date: &str, grades: &[f64]) -> LessonRecord {
        LessonRecord {
            class_code: "C1".into(),
            course_code: course.into(),
            teacher_code: teacher.into(),
            student_code: student.into(),
            date: date.into(),
            time_slot: "1".into(),
            presence_status: PresenceStatus::Present,
            grades: grades
                .iter()
                .map(|v| GradeEntry {
                    value: *v,
                    date: None,
                })
                .collect(),
            assessments: vec![],
            absence_acceptable: None,
            absence_note: None,
        }
    }

    fn build(records: &[LessonRecord], config: &EngineConfig) -> ClassReport {
        let class = class();
        let directory = directory();
        build_class_report(
            &ClassReportInput {
                class: &class,
                directory: &directory,
                records,
                academic_year: 1403,
            },
            config,
        )
    }

    #[test]
    fn weighted_average_over_two_courses() {
        // 2024-10-05 is 1403/07/14, 2025-01-05 is 1403/10/16.
        let records = vec![
            graded("S1", "T1", "MATH", "2024-10-05", &[14.0]),
            graded("S1", "T1", "MATH", "2025-01-05", &[16.0]),
            graded("S1", "T2", "ART", "2024-10-05", &[10.0]),
        ];
        let report = build(&records, &EngineConfig::default());
        let card = &report.cards[0];
        let math = card.course("MATH").expect("math");
        assert_eq!(math.year_average, Some(15.0));
        assert_eq!(math.credit, 2);
        assert_eq!(math.teacher_name, "Mr. Karimi");
        assert_eq!(card.course("ART").expect("art").year_average, Some(10.0));
        assert_eq!(card.weighted_average, Some(13.33));
        assert_eq!(card.weighted.total_credit, 3);

        let oct = math.month(7).expect("mehr");
        assert_eq!(oct.raw_grade, Some(14.0));
        assert_eq!(oct.presence.present, 1);
        let dey = math.trends.iter().find(|t| t.month == 10).expect("dey");
        assert_eq!(dey.progress, None);
    }

    #[test]
    fn every_student_gets_every_course() {
        let report = build(&[], &EngineConfig::default());
        assert_eq!(report.cards.len(), 3);
        for card in &report.cards {
            assert_eq!(card.courses.len(), 2);
            assert_eq!(card.weighted_average, None);
            assert_eq!(card.overall_rank, None);
            assert_eq!(card.courses[0].months.len(), 10);
        }
    }

    #[test]
    fn monthly_merge_policy_is_honoured() {
        let records = vec![
            graded("S1", "T1", "MATH", "2024-10-05", &[10.0]),
            graded("S1", "T1", "MATH", "2024-10-06", &[20.0]),
            graded("S1", "T1", "MATH", "2024-10-07", &[12.0]),
        ];
        let report = build(&records, &EngineConfig::default());
        let m = report.cards[0].course("MATH").and_then(|c| c.month(7)).cloned().expect("month");
        assert_eq!(m.raw_grade, Some(13.5));
        assert_eq!(m.grade_cells, 3);

        let cfg = EngineConfig {
            monthly_merge: MonthlyMerge::RunningMean,
            ..EngineConfig::default()
        };
        let report = build(&records, &cfg);
        let m = report.cards[0].course("MATH").and_then(|c| c.month(7)).cloned().expect("month");
        assert_eq!(m.raw_grade, Some(14.0));
    }

    #[test]
    fn assessments_apply_only_to_graded_months() {
        let mut with_grade = graded("S1", "T1", "MATH", "2024-10-05", &[19.0]);
        with_grade.assessments.push(AssessmentEntry {
            title: "homework".into(),
            value: "عالی".into(),
            date: None,
        });
        let mut no_grade = graded("S1", "T1", "MATH", "2024-11-05", &[]);
        no_grade.assessments.push(AssessmentEntry {
            title: "homework".into(),
            value: "خوب".into(),
            date: None,
        });
        let report = build(&[with_grade, no_grade], &EngineConfig::default());
        let math = report.cards[0].course("MATH").expect("math");
        let mehr = math.month(7).expect("mehr");
        assert_eq!(mehr.adjusted_grade, Some(20.0));
        assert!(mehr.adjustment.as_ref().expect("adj").clamped);
        let aban = math.month(8).expect("aban");
        assert_eq!(aban.adjusted_grade, None);
        assert_eq!(aban.assessments.len(), 1);
    }

    #[test]
    fn records_outside_the_year_or_class_are_skipped() {
        let records = vec![
            graded("S1", "T1", "MATH", "2024-09-21", &[18.0]),
            graded("S1", "T1", "MATH", "2025-03-21", &[12.0]),
            graded("S1", "T9", "MATH", "2024-10-05", &[5.0]),
            graded("S4", "T1", "MATH", "2024-10-05", &[5.0]),
            graded("S1", "T1", "MATH", "soon", &[5.0]),
        ];
        let report = build(&records, &EngineConfig::default());
        assert_eq!(report.skipped.outside_year, 1);
        assert_eq!(report.skipped.unknown_reference, 2);
        assert_eq!(report.skipped.malformed_date, 1);
        let math = report.cards[0].course("MATH").expect("math");
        assert_eq!(math.year_average, Some(12.0));
        assert_eq!(math.month(1).and_then(|m| m.raw_grade), Some(12.0));
    }

    #[test]
    fn out_of_year_records_alone_count_as_skips() {
        let records = vec![graded("S1", "T1", "MATH", "2024-09-21", &[18.0])];
        let report = build(&records, &EngineConfig::default());
        assert_eq!(report.skipped.outside_year, 1);
        assert!(!report.skipped.is_empty());
        assert!(build(&[], &EngineConfig::default()).skipped.is_empty());
    }

    #[test]
    fn rankings_cover_month_year_and_overall() {
        let records = vec![
            graded("S1", "T1", "MATH", "2024-10-05", &[18.0]),
            graded("S2", "T1", "MATH", "2024-10-05", &[18.0]),
            graded("S3", "T1", "MATH", "2024-10-05", &[12.0]),
        ];
        let report = build(&records, &EngineConfig::default());
        let month = &report.rankings.course_month["MATH"][&7];
        assert_eq!(month["S1"], 1);
        assert_eq!(month["S2"], 2);
        assert_eq!(month["S3"], 3);
        assert_eq!(report.cards[2].overall_rank, Some(3));
        assert!(report.rankings.course_year["ART"].is_empty());

        let cfg = EngineConfig {
            rank_policy: RankPolicy::Competition,
            ..EngineConfig::default()
        };
        let report = build(&records, &cfg);
        assert_eq!(report.rankings.overall["S2"], 1);
        assert_eq!(report.rankings.overall["S3"], 3);
        assert_eq!(
            report.cards[1].course("MATH").and_then(|c| c.month(7)).and_then(|m| m.rank),
            Some(1)
        );
    }

    #[test]
    fn comparison_sorts_with_empty_classes_last() {
        let graded_report = build(
            &[
                graded("S1", "T1", "MATH", "2024-10-05", &[16.0]),
                graded("S2", "T1", "MATH", "2024-10-05", &[11.0]),
            ],
            &EngineConfig::default(),
        );
        let mut empty = build(&[], &EngineConfig::default());
        empty.class_code = "C0".into();
        let rows = compare_classes(&[empty, graded_report]);
        assert_eq!(rows[0].class_code, "C1");
        assert_eq!(rows[0].class_average, Some(13.5));
        assert_eq!(rows[0].students_with_grades, 2);
        assert_eq!(rows[0].student_count, 3);
        assert_eq!(rows[1].class_average, None);
    }
}

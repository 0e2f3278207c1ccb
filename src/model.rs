use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresenceStatus {
    Present,
    Absent,
    Late,
    #[default]
    None,
}

impl PresenceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            "none" | "" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub value: f64,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentEntry {
    #[serde(default)]
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// One gradebook cell: a (class, course, teacher, student, date, time slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    pub class_code: String,
    pub course_code: String,
    pub teacher_code: String,
    pub student_code: String,
    pub date: String,
    #[serde(default)]
    pub time_slot: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub presence_status: PresenceStatus,
    #[serde(default)]
    pub grades: Vec<GradeEntry>,
    #[serde(default)]
    pub assessments: Vec<AssessmentEntry>,
    #[serde(default)]
    pub absence_acceptable: Option<bool>,
    #[serde(default, alias = "absenceDescription")]
    pub absence_note: Option<String>,
}

// Cells saved without a mark carry `null`; unknown labels are treated the same way.
fn lenient_status<'de, D>(d: D) -> Result<PresenceStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw
        .as_deref()
        .and_then(PresenceStatus::parse)
        .unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub credit: Option<i64>,
}

impl Course {
    /// Credit ("vahed") used as the weighted-average weight. Unset or non-positive means 1.
    pub fn effective_credit(&self) -> u32 {
        match self.credit {
            Some(c) if c > 0 => c.min(u32::MAX as i64) as u32,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCourse {
    pub teacher_code: String,
    pub course_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub teachers: Vec<TeacherCourse>,
}

impl Class {
    pub fn has_student(&self, student_code: &str) -> bool {
        self.students.iter().any(|s| s.code == student_code)
    }

    pub fn teaches(&self, teacher_code: &str, course_code: &str) -> bool {
        self.teachers
            .iter()
            .any(|t| t.teacher_code == teacher_code && t.course_code == course_code)
    }
}

/// Classes and their members, used to drop records that point at nobody.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub classes: Vec<Class>,
}

impl Roster {
    pub fn new(classes: Vec<Class>) -> Self {
        Self { classes }
    }

    pub fn class(&self, class_code: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.code == class_code)
    }

    pub fn knows(&self, record: &LessonRecord) -> bool {
        self.class(&record.class_code)
            .map(|c| c.has_student(&record.student_code))
            .unwrap_or(false)
    }

    pub fn student_name(&self, student_code: &str) -> Option<&str> {
        self.classes
            .iter()
            .flat_map(|c| c.students.iter())
            .find(|s| s.code == student_code)
            .map(|s| s.name.as_str())
    }
}

/// Per-course label -> adjustment table, overriding the global assessment scale.
pub type AssessmentOverrides = HashMap<String, f64>;

/// Read-only lookup tables passed into the engine.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub teachers: HashMap<String, String>,
    pub courses: HashMap<String, Course>,
    pub assessment_overrides: HashMap<String, AssessmentOverrides>,
}

impl Directory {
    pub fn teacher_name(&self, teacher_code: &str) -> String {
        self.teachers
            .get(teacher_code)
            .cloned()
            .unwrap_or_else(|| teacher_code.to_string())
    }

    pub fn course_name(&self, course_code: &str) -> String {
        self.courses
            .get(course_code)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| course_code.to_string())
    }

    pub fn credit(&self, course_code: &str) -> u32 {
        self.courses
            .get(course_code)
            .map(|c| c.effective_credit())
            .unwrap_or(1)
    }

    pub fn overrides(&self, course_code: &str) -> Option<&AssessmentOverrides> {
        self.assessment_overrides.get(course_code)
    }
}

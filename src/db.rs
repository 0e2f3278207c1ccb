use crate::model::{
    AssessmentEntry, AssessmentOverrides, Class, Course, Directory, GradeEntry, LessonRecord,
    PresenceStatus, Roster, Student, TeacherCourse,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("classsheet.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            class_code TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(class_code, code),
            FOREIGN KEY(class_code) REFERENCES classes(code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_sort ON students(class_code, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_teachers(
            class_code TEXT NOT NULL,
            teacher_code TEXT NOT NULL,
            course_code TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(class_code, teacher_code, course_code),
            FOREIGN KEY(class_code) REFERENCES classes(code)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            teacher_name TEXT,
            credit INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_values(
            course_code TEXT NOT NULL,
            label TEXT NOT NULL,
            value REAL NOT NULL,
            PRIMARY KEY(course_code, label)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_cells(
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            class_code TEXT NOT NULL,
            course_code TEXT NOT NULL,
            teacher_code TEXT NOT NULL,
            student_code TEXT NOT NULL,
            date TEXT NOT NULL,
            time_slot TEXT NOT NULL DEFAULT '',
            presence_status TEXT NOT NULL DEFAULT 'none',
            grades_json TEXT NOT NULL DEFAULT '[]',
            assessments_json TEXT NOT NULL DEFAULT '[]',
            absence_acceptable INTEGER
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lesson_cells_class_seq ON lesson_cells(class_code, seq)",
        [],
    )?;
    // The note column arrived after the first workspaces were created.
    ensure_lesson_cells_absence_note(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        // A hand-edited or truncated value reads as unset.
        Some(s) => Ok(serde_json::from_str(&s).ok()),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Replaces a class together with its student list and teacher/course pairs.
pub fn upsert_class(conn: &Connection, class: &Class) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO classes(code, name) VALUES(?, ?)
         ON CONFLICT(code) DO UPDATE SET name = excluded.name",
        (&class.code, &class.name),
    )?;
    tx.execute("DELETE FROM students WHERE class_code = ?", [&class.code])?;
    tx.execute("DELETE FROM class_teachers WHERE class_code = ?", [&class.code])?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO students(class_code, code, name, sort_order) VALUES(?, ?, ?, ?)",
        )?;
        for (i, s) in class.students.iter().enumerate() {
            stmt.execute(params![class.code, s.code, s.name, i as i64])?;
        }
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO class_teachers(class_code, teacher_code, course_code, sort_order)
             VALUES(?, ?, ?, ?)",
        )?;
        for (i, t) in class.teachers.iter().enumerate() {
            stmt.execute(params![class.code, t.teacher_code, t.course_code, i as i64])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn upsert_teachers(conn: &Connection, teachers: &[(String, String)]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO teachers(code, name) VALUES(?, ?)
             ON CONFLICT(code) DO UPDATE SET name = excluded.name",
        )?;
        for (code, name) in teachers {
            stmt.execute((code, name))?;
        }
    }
    tx.commit()?;
    Ok(teachers.len())
}

pub fn upsert_courses(conn: &Connection, courses: &[Course]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO courses(code, name, teacher_name, credit) VALUES(?, ?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
               name = excluded.name,
               teacher_name = excluded.teacher_name,
               credit = excluded.credit",
        )?;
        for c in courses {
            stmt.execute(params![c.code, c.name, c.teacher_name, c.credit])?;
        }
    }
    tx.commit()?;
    Ok(courses.len())
}

/// Replaces the override table of one course. An empty table falls back to the default scale.
pub fn set_assessment_values(
    conn: &Connection,
    course_code: &str,
    values: &AssessmentOverrides,
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM assessment_values WHERE course_code = ?",
        [course_code],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO assessment_values(course_code, label, value) VALUES(?, ?, ?)",
        )?;
        for (label, value) in values {
            stmt.execute(params![course_code, label.trim(), value])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Appends cells after the ones already stored. Returns the number written.
pub fn insert_cells(conn: &Connection, cells: &[LessonRecord]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let next_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(seq), -1) + 1 FROM lesson_cells",
        [],
        |row| row.get(0),
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO lesson_cells(
                id, seq, class_code, course_code, teacher_code, student_code, date, time_slot,
                presence_status, grades_json, assessments_json, absence_acceptable, absence_note
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (i, c) in cells.iter().enumerate() {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                next_seq + i as i64,
                c.class_code,
                c.course_code,
                c.teacher_code,
                c.student_code,
                c.date,
                c.time_slot,
                c.presence_status.as_str(),
                serde_json::to_string(&c.grades)?,
                serde_json::to_string(&c.assessments)?,
                c.absence_acceptable,
                c.absence_note,
            ])?;
        }
    }
    tx.commit()?;
    Ok(cells.len())
}

fn load_students(conn: &Connection, class_code: &str) -> anyhow::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT code, name FROM students WHERE class_code = ? ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([class_code], |row| {
            Ok(Student {
                code: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_class_teachers(conn: &Connection, class_code: &str) -> anyhow::Result<Vec<TeacherCourse>> {
    let mut stmt = conn.prepare(
        "SELECT teacher_code, course_code FROM class_teachers WHERE class_code = ? ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([class_code], |row| {
            Ok(TeacherCourse {
                teacher_code: row.get(0)?,
                course_code: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_class(conn: &Connection, class_code: &str) -> anyhow::Result<Option<Class>> {
    let name: Option<String> = conn
        .query_row("SELECT name FROM classes WHERE code = ?", [class_code], |row| {
            row.get(0)
        })
        .optional()?;
    let Some(name) = name else {
        return Ok(None);
    };
    Ok(Some(Class {
        code: class_code.to_string(),
        name,
        students: load_students(conn, class_code)?,
        teachers: load_class_teachers(conn, class_code)?,
    }))
}

pub fn load_roster(conn: &Connection) -> anyhow::Result<Roster> {
    let codes = list_class_codes(conn)?;
    let mut classes = Vec::with_capacity(codes.len());
    for code in codes {
        if let Some(class) = load_class(conn, &code)? {
            classes.push(class);
        }
    }
    Ok(Roster::new(classes))
}

pub fn load_directory(conn: &Connection) -> anyhow::Result<Directory> {
    let mut dir = Directory::default();

    let mut stmt = conn.prepare("SELECT code, name FROM teachers")?;
    let teachers = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    dir.teachers = teachers.into_iter().collect();

    let mut stmt = conn.prepare("SELECT code, name, teacher_name, credit FROM courses")?;
    let courses = stmt
        .query_map([], |row| {
            Ok(Course {
                code: row.get(0)?,
                name: row.get(1)?,
                teacher_name: row.get(2)?,
                credit: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    dir.courses = courses.into_iter().map(|c| (c.code.clone(), c)).collect();

    let mut stmt = conn.prepare("SELECT course_code, label, value FROM assessment_values")?;
    let mut rows = stmt.query([])?;
    let mut overrides: HashMap<String, AssessmentOverrides> = HashMap::new();
    while let Some(row) = rows.next()? {
        let course: String = row.get(0)?;
        let label: String = row.get(1)?;
        let value: f64 = row.get(2)?;
        overrides.entry(course).or_default().insert(label, value);
    }
    dir.assessment_overrides = overrides;

    Ok(dir)
}

/// Stored cells in import order, optionally limited to one class.
pub fn load_cells(conn: &Connection, class_code: Option<&str>) -> anyhow::Result<Vec<LessonRecord>> {
    let sql = "SELECT class_code, course_code, teacher_code, student_code, date, time_slot,
                      presence_status, grades_json, assessments_json, absence_acceptable, absence_note
               FROM lesson_cells
               WHERE (?1 IS NULL OR class_code = ?1)
               ORDER BY seq";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([class_code])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let status: String = row.get(6)?;
        let grades_json: String = row.get(7)?;
        let assessments_json: String = row.get(8)?;
        // Cell payloads are written by insert_cells; unreadable JSON means an empty cell.
        let grades: Vec<GradeEntry> = serde_json::from_str(&grades_json).unwrap_or_default();
        let assessments: Vec<AssessmentEntry> =
            serde_json::from_str(&assessments_json).unwrap_or_default();
        out.push(LessonRecord {
            class_code: row.get(0)?,
            course_code: row.get(1)?,
            teacher_code: row.get(2)?,
            student_code: row.get(3)?,
            date: row.get(4)?,
            time_slot: row.get(5)?,
            presence_status: PresenceStatus::parse(&status).unwrap_or_default(),
            grades,
            assessments,
            absence_acceptable: row.get(9)?,
            absence_note: row.get(10)?,
        });
    }
    Ok(out)
}

pub fn list_class_codes(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT code FROM classes ORDER BY rowid")?;
    let codes = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(codes)
}

fn ensure_lesson_cells_absence_note(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "lesson_cells", "absence_note")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE lesson_cells ADD COLUMN absence_note TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

use crate::auth;

pub const DB_FILE_NAME: &str = "university_mis.sqlite3";

const FACULTY_STRUCTURE: &[(&str, &[&str])] = &[
    (
        "Faculty of Computers & Information",
        &[
            "Computer Science",
            "Information Systems",
            "Information Technology",
            "Software Engineering",
            "Artificial Intelligence",
        ],
    ),
    (
        "Faculty of Engineering",
        &[
            "Civil Engineering",
            "Electrical Engineering",
            "Mechanical Engineering",
            "Architecture",
        ],
    ),
    (
        "Faculty of Commerce",
        &[
            "Accounting",
            "Business Administration",
            "Marketing",
            "Finance",
        ],
    ),
    (
        "Faculty of Science",
        &["Mathematics", "Physics", "Chemistry", "Biology"],
    ),
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_db(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}

fn init_db(conn: &Connection) -> anyhow::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'staff'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS faculties(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id TEXT PRIMARY KEY,
            faculty_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(faculty_id) REFERENCES faculties(id),
            UNIQUE(faculty_id, name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_departments_faculty ON departments(faculty_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            university_id TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            gender TEXT,
            date_of_birth TEXT,
            email TEXT,
            phone TEXT,
            level INTEGER,
            status TEXT NOT NULL DEFAULT 'active',
            department_id TEXT,
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    ensure_students_status(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_department ON students(department_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS instructors(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            rank TEXT,
            department_id TEXT,
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_instructors_department ON instructors(department_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            credits INTEGER,
            semester INTEGER,
            department_id TEXT,
            instructor_id TEXT,
            FOREIGN KEY(department_id) REFERENCES departments(id),
            FOREIGN KEY(instructor_id) REFERENCES instructors(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_department ON courses(department_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            academic_year TEXT NOT NULL DEFAULT '',
            level INTEGER,
            semester INTEGER,
            status TEXT NOT NULL DEFAULT 'Enrolled',
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    ensure_enrollments_level(conn)?;
    // A NULL semester must still collide with another NULL semester.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_unique
         ON enrollments(student_id, course_id, academic_year, IFNULL(semester, 0))",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    seed_reference_data(conn)?;
    Ok(())
}

fn ensure_students_status(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "status")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN status TEXT NOT NULL DEFAULT 'active'",
        [],
    )?;
    Ok(())
}

fn ensure_enrollments_level(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "level")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN level INTEGER", [])?;
    Ok(())
}

/// Faculties, their departments and the admin account. Safe to run on every open.
fn seed_reference_data(conn: &Connection) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    for (faculty_name, departments) in FACULTY_STRUCTURE {
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM faculties WHERE name = ?",
                [faculty_name],
                |r| r.get(0),
            )
            .optional()?;
        let faculty_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO faculties(id, name) VALUES(?, ?)",
                    (&id, faculty_name),
                )?;
                id
            }
        };

        for dept_name in departments.iter() {
            tx.execute(
                "INSERT OR IGNORE INTO departments(id, faculty_id, name) VALUES(?, ?, ?)",
                (Uuid::new_v4().to_string(), &faculty_id, dept_name),
            )?;
        }
    }

    tx.execute(
        "INSERT OR IGNORE INTO users(id, username, password_hash, role) VALUES(?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            "admin",
            auth::hash_password("admin"),
            "admin",
        ),
    )?;

    tx.commit()?;
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

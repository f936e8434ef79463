use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;

use crate::store::{opt_int, opt_text, OnDelete, Table};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub faculty_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub university_id: String,
    pub full_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub level: Option<i64>,
    pub status: String,
    /// `None` is the explicit "not specified yet" state.
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rank: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credits: Option<i64>,
    pub semester: Option<i64>,
    pub department_id: Option<String>,
    pub instructor_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum EnrollmentStatus {
    #[default]
    #[serde(rename = "Enrolled")]
    Enrolled,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Failed")]
    Failed,
    #[serde(rename = "Withdrawn")]
    Withdrawn,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 5] = [
        EnrollmentStatus::Enrolled,
        EnrollmentStatus::InProgress,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Failed,
        EnrollmentStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "Enrolled",
            EnrollmentStatus::InProgress => "In Progress",
            EnrollmentStatus::Completed => "Completed",
            EnrollmentStatus::Failed => "Failed",
            EnrollmentStatus::Withdrawn => "Withdrawn",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let t = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(t))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub academic_year: String,
    pub level: Option<i64>,
    pub semester: Option<i64>,
    pub status: EnrollmentStatus,
}

impl Table for Faculty {
    const ENTITY: &'static str = "faculty";
    const TABLE: &'static str = "faculties";
    const COLUMNS: &'static [&'static str] = &["name"];
    const ORDER_BY: &'static str = "name, id";
    const ON_DELETE: &'static [OnDelete] = &[OnDelete::Cascade {
        table: "departments",
        column: "faculty_id",
    }];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Faculty {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.trim().to_string())]
    }
}

impl Table for Department {
    const ENTITY: &'static str = "department";
    const TABLE: &'static str = "departments";
    const COLUMNS: &'static [&'static str] = &["faculty_id", "name"];
    const ORDER_BY: &'static str = "name, id";
    const ON_DELETE: &'static [OnDelete] = &[
        OnDelete::Nullify {
            table: "students",
            column: "department_id",
        },
        OnDelete::Nullify {
            table: "courses",
            column: "department_id",
        },
        OnDelete::Nullify {
            table: "instructors",
            column: "department_id",
        },
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Department {
            id: row.get(0)?,
            faculty_id: row.get(1)?,
            name: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.faculty_id.clone()),
            Value::Text(self.name.trim().to_string()),
        ]
    }
}

impl Table for Student {
    const ENTITY: &'static str = "student";
    const TABLE: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &[
        "university_id",
        "full_name",
        "gender",
        "date_of_birth",
        "email",
        "phone",
        "level",
        "status",
        "department_id",
    ];
    const ORDER_BY: &'static str = "university_id, id";
    const ON_DELETE: &'static [OnDelete] = &[OnDelete::Cascade {
        table: "enrollments",
        column: "student_id",
    }];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: row.get(0)?,
            university_id: row.get(1)?,
            full_name: row.get(2)?,
            gender: row.get(3)?,
            date_of_birth: row.get(4)?,
            email: row.get(5)?,
            phone: row.get(6)?,
            level: row.get(7)?,
            status: row.get(8)?,
            department_id: row.get(9)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.university_id.trim().to_string()),
            Value::Text(self.full_name.trim().to_string()),
            opt_text(&self.gender),
            opt_text(&self.date_of_birth),
            opt_text(&self.email),
            opt_text(&self.phone),
            opt_int(self.level),
            Value::Text(self.status.clone()),
            opt_text(&self.department_id),
        ]
    }
}

impl Table for Instructor {
    const ENTITY: &'static str = "instructor";
    const TABLE: &'static str = "instructors";
    const COLUMNS: &'static [&'static str] =
        &["full_name", "email", "phone", "rank", "department_id"];
    const ORDER_BY: &'static str = "full_name, id";
    const ON_DELETE: &'static [OnDelete] = &[OnDelete::Nullify {
        table: "courses",
        column: "instructor_id",
    }];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Instructor {
            id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            rank: row.get(4)?,
            department_id: row.get(5)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.full_name.trim().to_string()),
            opt_text(&self.email),
            opt_text(&self.phone),
            opt_text(&self.rank),
            opt_text(&self.department_id),
        ]
    }
}

impl Table for Course {
    const ENTITY: &'static str = "course";
    const TABLE: &'static str = "courses";
    const COLUMNS: &'static [&'static str] = &[
        "code",
        "name",
        "credits",
        "semester",
        "department_id",
        "instructor_id",
    ];
    // Course dropdowns are ordered by display name, so the table is too.
    const ORDER_BY: &'static str = "name, code";
    const ON_DELETE: &'static [OnDelete] = &[OnDelete::Cascade {
        table: "enrollments",
        column: "course_id",
    }];

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            credits: row.get(3)?,
            semester: row.get(4)?,
            department_id: row.get(5)?,
            instructor_id: row.get(6)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.code.trim().to_string()),
            Value::Text(self.name.trim().to_string()),
            opt_int(self.credits),
            opt_int(self.semester),
            opt_text(&self.department_id),
            opt_text(&self.instructor_id),
        ]
    }
}

impl Table for Enrollment {
    const ENTITY: &'static str = "enrollment";
    const TABLE: &'static str = "enrollments";
    const COLUMNS: &'static [&'static str] = &[
        "student_id",
        "course_id",
        "academic_year",
        "level",
        "semester",
        "status",
    ];
    const ORDER_BY: &'static str = "rowid";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(6)?;
        Ok(Enrollment {
            id: row.get(0)?,
            student_id: row.get(1)?,
            course_id: row.get(2)?,
            academic_year: row.get(3)?,
            level: row.get(4)?,
            semester: row.get(5)?,
            status: EnrollmentStatus::parse(&status).unwrap_or_default(),
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.student_id.clone()),
            Value::Text(self.course_id.clone()),
            Value::Text(self.academic_year.trim().to_string()),
            opt_int(self.level),
            opt_int(self.semester),
            Value::Text(self.status.as_str().to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_status_parses_display_labels() {
        assert_eq!(
            EnrollmentStatus::parse("in progress"),
            Some(EnrollmentStatus::InProgress)
        );
        assert_eq!(
            EnrollmentStatus::parse(" Completed "),
            Some(EnrollmentStatus::Completed)
        );
        assert_eq!(EnrollmentStatus::parse("Dropped"), None);
        assert_eq!(EnrollmentStatus::parse(""), None);
    }
}

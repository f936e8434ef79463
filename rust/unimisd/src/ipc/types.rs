use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::SignedIn;
use crate::form::{CourseForm, EnrollmentForm, FormController, InstructorForm, StudentForm};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-workspace controller state of the four entity screens.
#[derive(Debug, Default)]
pub struct Screens {
    pub students: FormController<StudentForm>,
    pub courses: FormController<CourseForm>,
    pub instructors: FormController<InstructorForm>,
    pub enrollments: FormController<EnrollmentForm>,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub user: Option<SignedIn>,
    pub screens: Screens,
}

//! Enrollment screen: every field stays locked until a student is located by
//! university id, and the table only lists that student's enrollments.

use serde_json::json;
use tracing::{info, warn};

use super::{opt_cell, parse_int, Directory, EntityForm, FormController, FormError, FormResult};
use crate::lookup::{Cascade, OptionKey};
use crate::model::{Course, Department, Enrollment, EnrollmentStatus, Student};
use crate::store::Store;

const NOT_FOUND_INFO: &str = "Student: not found";
const STUDENT_GONE: &str = "This student no longer exists.";

#[derive(Debug, Clone)]
pub struct EnrollmentForm {
    student_code: String,
    student: Option<Student>,
    student_info: String,
    cascade: Cascade,
    academic_year: String,
    level: String,
    semester: String,
    status: String,
}

impl EnrollmentForm {
    fn require_student(&self) -> FormResult<&Student> {
        self.student
            .as_ref()
            .ok_or_else(|| FormError::validation("Please find a student first."))
    }

    fn reset_details(&mut self) {
        self.academic_year.clear();
        self.level.clear();
        self.semester.clear();
        self.status.clear();
    }

    fn restore_student_chain<S: Store>(&mut self, store: &S) -> FormResult<()> {
        let department = match self.student.as_ref().and_then(|s| s.department_id.as_deref()) {
            Some(id) => store.find_by_id::<Department>(id)?,
            None => None,
        };
        self.cascade.restore(store, department.as_ref())?;
        Ok(())
    }

    fn lock(&mut self, code: &str) {
        self.student_code = code.to_string();
        self.student = None;
        self.student_info = NOT_FOUND_INFO.to_string();
        self.cascade.reset();
        self.reset_details();
    }

    fn locate<S: Store>(&mut self, store: &S, code: &str, student: Student) -> FormResult<()> {
        let mut info = format!("Student: {} (ID: {})", student.full_name, student.university_id);
        if student.department_id.is_none() {
            info.push_str(" - Department not specified yet");
        }
        self.student_code = code.to_string();
        self.student = Some(student);
        self.student_info = info;
        self.reset_details();
        self.restore_student_chain(store)
    }
}

impl EntityForm for EnrollmentForm {
    type Record = Enrollment;

    const LABEL: &'static str = "Enrollment";
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Course",
        "Faculty",
        "Department",
        "Academic Year",
        "Level",
        "Semester",
        "Status",
    ];
    const SEARCH_COLUMNS: &'static [usize] = &[1, 4, 7];
    const CONFLICT_MESSAGE: &'static str = "This enrollment already exists.";
    const EMPTY_EXPORT_MESSAGE: Option<&'static str> = Some("No enrollments to export.");

    fn new() -> Self {
        EnrollmentForm {
            student_code: String::new(),
            student: None,
            student_info: String::new(),
            cascade: Cascade::new(false, true),
            academic_year: String::new(),
            level: String::new(),
            semester: String::new(),
            status: String::new(),
        }
    }

    fn prepare<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.cascade.reload_faculties(store)?;
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> FormResult<()> {
        if field == "studentCode" {
            self.student_code = value.to_string();
            return Ok(());
        }
        self.require_student()?;
        let slot = match field {
            "academicYear" => &mut self.academic_year,
            "level" => &mut self.level,
            "semester" => &mut self.semester,
            "status" => &mut self.status,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn choose<S: Store>(&mut self, store: &S, field: &str, key: OptionKey) -> FormResult<()> {
        self.require_student()?;
        match field {
            "faculty" => self.cascade.select_faculty(store, key)?,
            "department" => self.cascade.select_department(store, key)?,
            "course" => self.cascade.select_course(key)?,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        }
        Ok(())
    }

    fn build(&self, existing: Option<&Enrollment>) -> FormResult<Enrollment> {
        let student = self.require_student()?;
        let Some(course_id) = self.cascade.course.id() else {
            return Err(FormError::validation("Please select a course."));
        };
        let level = parse_int(&self.level, "Level must be a positive number.", |v| v > 0)?;
        let semester = parse_int(&self.semester, "Semester must be 1 or 2.", |v| {
            v == 1 || v == 2
        })?;
        let status = if self.status.trim().is_empty() {
            EnrollmentStatus::default()
        } else {
            EnrollmentStatus::parse(&self.status).ok_or_else(|| {
                FormError::validation(format!("Unknown enrollment status: {}", self.status.trim()))
            })?
        };

        let mut enrollment = existing.cloned().unwrap_or_default();
        enrollment.student_id = student.id.clone();
        enrollment.course_id = course_id.to_string();
        enrollment.academic_year = self.academic_year.trim().to_string();
        enrollment.level = level;
        enrollment.semester = semester;
        enrollment.status = status;
        Ok(enrollment)
    }

    fn load<S: Store>(&mut self, store: &S, record: &Enrollment) -> FormResult<()> {
        if record.student_id != self.require_student()?.id {
            return Err(FormError::NotFound("Enrollment not found.".into()));
        }
        let course = store.find_by_id::<Course>(&record.course_id)?;
        let department = match course.as_ref().and_then(|c| c.department_id.as_deref()) {
            Some(id) => store.find_by_id::<Department>(id)?,
            None => None,
        };
        self.cascade.restore(store, department.as_ref())?;
        if department.is_some() {
            self.cascade
                .select_course(OptionKey::Id(record.course_id.clone()))?;
        }

        self.academic_year = record.academic_year.clone();
        self.level = opt_cell(record.level);
        self.semester = opt_cell(record.semester);
        self.status = record.status.as_str().to_string();
        Ok(())
    }

    /// Keeps the located student; only the enrollment details are reset.
    fn reset<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.reset_details();
        if self.student.is_some() {
            self.restore_student_chain(store)
        } else {
            self.cascade.reset();
            Ok(())
        }
    }

    fn fetch<S: Store>(&self, store: &S) -> FormResult<Vec<Enrollment>> {
        match &self.student {
            Some(student) => Ok(store.find_children::<Enrollment>("student_id", &student.id)?),
            None => Ok(Vec::new()),
        }
    }

    fn cells(e: &Enrollment, dir: &Directory) -> Vec<String> {
        let course = dir.course(&e.course_id);
        let dept = course.and_then(|c| c.department_id.as_deref());
        vec![
            e.id.clone(),
            course.map(|c| c.name.clone()).unwrap_or_default(),
            dir.faculty_of_department(dept).unwrap_or_default().to_string(),
            dir.department_name(dept).unwrap_or_default().to_string(),
            e.academic_year.clone(),
            opt_cell(e.level),
            opt_cell(e.semester),
            e.status.as_str().to_string(),
        ]
    }

    fn ensure_ready(&self) -> FormResult<()> {
        self.require_student().map(|_| ())
    }

    fn revalidate<S: Store>(&mut self, store: &S) -> FormResult<()> {
        let Some(id) = self.student.as_ref().map(|s| s.id.clone()) else {
            return Ok(());
        };
        if store.find_by_id::<Student>(&id)?.is_some() {
            return Ok(());
        }
        warn!(student_id = %id, "located student no longer exists");
        let code = self.student_code.clone();
        self.lock(&code);
        Err(FormError::NotFound(STUDENT_GONE.into()))
    }

    fn to_json(&self) -> serde_json::Value {
        let statuses: Vec<&str> = EnrollmentStatus::ALL.iter().map(|s| s.as_str()).collect();
        json!({
            "studentCode": self.student_code,
            "studentInfo": self.student_info,
            "locked": self.student.is_none(),
            "cascade": self.cascade.to_json(),
            "academicYear": self.academic_year,
            "level": self.level,
            "semester": self.semester,
            "status": self.status,
            "statuses": statuses,
        })
    }
}

impl FormController<EnrollmentForm> {
    /// Locates the student whose enrollments the screen edits. On a miss the
    /// details section is locked and the table emptied.
    pub fn find_student<S: Store>(&mut self, store: &S, code: &str) -> FormResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(FormError::validation("Please enter a student ID/code."));
        }
        let found = store.find_by_column::<Student>("university_id", code)?;
        self.selection.clear();

        let Some(student) = found else {
            warn!(%code, "no student with this university id");
            self.form.lock(code);
            self.view.clear_rows();
            return Err(FormError::NotFound("No student with this ID/code.".into()));
        };

        info!(%code, student_id = %student.id, "student located");
        let mut next = self.form.clone();
        next.locate(store, code, student)?;
        self.form = next;
        self.refresh(store)
    }
}

use chrono::NaiveDate;
use serde_json::json;

use super::{non_empty, opt_cell, parse_int, Directory, EntityForm, FormError, FormResult};
use crate::lookup::{Cascade, OptionKey, SENTINEL_LABEL};
use crate::model::{Department, Student};
use crate::store::Store;

pub const STUDENT_STATUSES: [&str; 3] = ["active", "graduated", "suspended"];
pub const LEVELS: [&str; 4] = ["1", "2", "3", "4"];

#[derive(Debug, Clone)]
pub struct StudentForm {
    university_id: String,
    full_name: String,
    gender: String,
    date_of_birth: String,
    level: String,
    phone: String,
    email: String,
    status: String,
    cascade: Cascade,
}

impl StudentForm {
    fn department_ref(&self) -> FormResult<Option<String>> {
        match &self.cascade.department {
            OptionKey::Unset => Err(FormError::validation(
                "Please select a department (or 'Not specified yet').",
            )),
            OptionKey::NotSpecified => Ok(None),
            OptionKey::Id(id) => Ok(Some(id.clone())),
        }
    }
}

impl EntityForm for StudentForm {
    type Record = Student;

    const LABEL: &'static str = "Student";
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "University ID",
        "Name",
        "Faculty",
        "Department",
        "Level",
        "Phone",
    ];
    const SEARCH_COLUMNS: &'static [usize] = &[1, 2];
    const CONFLICT_MESSAGE: &'static str = "University ID already exists.";

    fn new() -> Self {
        StudentForm {
            university_id: String::new(),
            full_name: String::new(),
            gender: String::new(),
            date_of_birth: String::new(),
            level: LEVELS[0].to_string(),
            phone: String::new(),
            email: String::new(),
            status: STUDENT_STATUSES[0].to_string(),
            cascade: Cascade::new(true, false),
        }
    }

    fn prepare<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.cascade.reload_faculties(store)?;
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> FormResult<()> {
        let slot = match field {
            "universityId" => &mut self.university_id,
            "fullName" => &mut self.full_name,
            "gender" => &mut self.gender,
            "dateOfBirth" => &mut self.date_of_birth,
            "level" => &mut self.level,
            "phone" => &mut self.phone,
            "email" => &mut self.email,
            "status" => &mut self.status,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn choose<S: Store>(&mut self, store: &S, field: &str, key: OptionKey) -> FormResult<()> {
        match field {
            "faculty" => self.cascade.select_faculty(store, key)?,
            "department" => self.cascade.select_department(store, key)?,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        }
        Ok(())
    }

    fn build(&self, existing: Option<&Student>) -> FormResult<Student> {
        let university_id = self.university_id.trim();
        let full_name = self.full_name.trim();
        if university_id.is_empty() || full_name.is_empty() {
            return Err(FormError::validation(
                "University ID and Name are required.",
            ));
        }
        let department_id = self.department_ref()?;

        let level = parse_int(&self.level, "Level must be a number between 1 and 4.", |v| {
            (1..=4).contains(&v)
        })?;
        let date_of_birth = match non_empty(&self.date_of_birth) {
            Some(raw) => {
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    FormError::validation("Date of birth must be in YYYY-MM-DD format.")
                })?;
                Some(date.format("%Y-%m-%d").to_string())
            }
            None => None,
        };
        let status = match non_empty(&self.status) {
            Some(s) => {
                let s = s.to_lowercase();
                if !STUDENT_STATUSES.contains(&s.as_str()) {
                    return Err(FormError::validation(
                        "Status must be active, graduated or suspended.",
                    ));
                }
                s
            }
            None => STUDENT_STATUSES[0].to_string(),
        };

        let mut student = existing.cloned().unwrap_or_default();
        student.university_id = university_id.to_string();
        student.full_name = full_name.to_string();
        student.gender = non_empty(&self.gender);
        student.date_of_birth = date_of_birth;
        student.email = non_empty(&self.email);
        student.phone = non_empty(&self.phone);
        student.level = level;
        student.status = status;
        student.department_id = department_id;
        Ok(student)
    }

    fn load<S: Store>(&mut self, store: &S, record: &Student) -> FormResult<()> {
        let department = match record.department_id.as_deref() {
            Some(id) => store.find_by_id::<Department>(id)?,
            None => None,
        };
        self.cascade.restore(store, department.as_ref())?;

        self.university_id = record.university_id.clone();
        self.full_name = record.full_name.clone();
        self.gender = record.gender.clone().unwrap_or_default();
        self.date_of_birth = record.date_of_birth.clone().unwrap_or_default();
        self.level = opt_cell(record.level);
        self.phone = record.phone.clone().unwrap_or_default();
        self.email = record.email.clone().unwrap_or_default();
        self.status = record.status.clone();
        Ok(())
    }

    fn reset<S: Store>(&mut self, _store: &S) -> FormResult<()> {
        let cascade = self.cascade.clone();
        *self = StudentForm::new();
        self.cascade = cascade;
        self.cascade.reset();
        Ok(())
    }

    fn cells(s: &Student, dir: &Directory) -> Vec<String> {
        let dept = s.department_id.as_deref();
        vec![
            s.id.clone(),
            s.university_id.clone(),
            s.full_name.clone(),
            dir.faculty_of_department(dept).unwrap_or_default().to_string(),
            dir.department_name(dept)
                .unwrap_or(SENTINEL_LABEL)
                .to_string(),
            opt_cell(s.level),
            s.phone.clone().unwrap_or_default(),
        ]
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "universityId": self.university_id,
            "fullName": self.full_name,
            "gender": self.gender,
            "dateOfBirth": self.date_of_birth,
            "level": self.level,
            "levels": LEVELS,
            "phone": self.phone,
            "email": self.email,
            "status": self.status,
            "statuses": STUDENT_STATUSES,
            "cascade": self.cascade.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::form::test_util::{add_student, department};
    use crate::form::FormController;
    use crate::store::SqliteStore;

    fn fill(ctl: &mut FormController<StudentForm>, code: &str, name: &str) {
        ctl.set_field("universityId", code).expect("code");
        ctl.set_field("fullName", name).expect("name");
    }

    #[test]
    fn sentinel_department_round_trips_as_absent_reference() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");

        fill(&mut ctl, " 2025-1234 ", "Mona Adel");
        ctl.choose(&store, "department", OptionKey::NotSpecified)
            .expect("sentinel");
        let outcome = ctl.create(&store).expect("create");
        let id = outcome.id().expect("id").to_string();

        let saved = store
            .find_by_id::<Student>(&id)
            .expect("find")
            .expect("saved");
        assert_eq!(saved.university_id, "2025-1234");
        assert_eq!(saved.department_id, None);
        assert_eq!(ctl.view().rows()[0].cells[4], SENTINEL_LABEL);

        ctl.select_row(&store, &id).expect("select");
        assert_eq!(ctl.form().cascade.department, OptionKey::NotSpecified);
        assert_eq!(ctl.form().cascade.faculty, OptionKey::Unset);
    }

    #[test]
    fn create_requires_a_department_choice_and_keeps_the_form() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");

        fill(&mut ctl, "2025-0001", "Omar Ali");
        let err = ctl.create(&store).expect_err("no department");
        assert_eq!(err.code(), "validation_error");
        assert_eq!(ctl.form().university_id, "2025-0001");
        assert_eq!(store.count::<Student>().expect("count"), 0);
    }

    #[test]
    fn malformed_level_aborts_without_writing() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");

        fill(&mut ctl, "2025-0001", "Omar Ali");
        ctl.choose(&store, "department", OptionKey::NotSpecified)
            .expect("sentinel");
        ctl.set_field("level", "five").expect("level");
        assert!(matches!(
            ctl.create(&store),
            Err(FormError::Validation(_))
        ));
        ctl.set_field("level", "5").expect("level");
        assert!(matches!(
            ctl.create(&store),
            Err(FormError::Validation(_))
        ));
        ctl.set_field("dateOfBirth", "2004-13-40").expect("dob");
        ctl.set_field("level", "2").expect("level");
        assert!(matches!(
            ctl.create(&store),
            Err(FormError::Validation(_))
        ));
        assert_eq!(store.count::<Student>().expect("count"), 0);
    }

    #[test]
    fn duplicate_code_is_a_conflict_and_form_is_preserved() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        add_student(&store, "2025-1234", "First Student", None);

        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.search(&store, "first").expect("search");

        let cs = department(&store, "Computer Science");
        fill(&mut ctl, "2025-1234", "Second Student");
        ctl.choose(&store, "faculty", OptionKey::Id(cs.faculty_id.clone()))
            .expect("faculty");
        ctl.choose(&store, "department", OptionKey::Id(cs.id.clone()))
            .expect("department");
        ctl.set_field("email", "second@example.edu").expect("email");
        let before = ctl.form().clone();

        let err = ctl.create(&store).expect_err("duplicate");
        assert_eq!(err, FormError::Conflict("University ID already exists.".into()));

        let after = ctl.form();
        assert_eq!(after.full_name, before.full_name);
        assert_eq!(after.email, before.email);
        assert_eq!(after.cascade.department, OptionKey::Id(cs.id));
        assert_eq!(ctl.view().filter(), "first");

        let dupes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM students WHERE university_id = '2025-1234'",
                [],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(dupes, 1);
    }

    #[test]
    fn create_clears_form_and_keeps_active_search() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        add_student(&store, "2024-0100", "Nour Hassan", None);

        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.search(&store, "2025").expect("search");
        assert!(ctl.view().rows().is_empty());

        fill(&mut ctl, "2025-0200", "Karim Fathy");
        ctl.choose(&store, "department", OptionKey::NotSpecified)
            .expect("sentinel");
        ctl.create(&store).expect("create");

        assert_eq!(ctl.form().university_id, "");
        assert_eq!(ctl.form().cascade.department, OptionKey::Unset);
        assert_eq!(ctl.selected(), None);
        assert_eq!(ctl.view().rows().len(), 1);
        assert_eq!(ctl.view().rows()[0].cells[1], "2025-0200");
    }

    #[test]
    fn update_keeps_selection_and_reloads_department_chain() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let is = department(&store, "Information Systems");
        let id = add_student(&store, "2025-0300", "Salma Nabil", Some(&is.id));

        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.select_row(&store, &id).expect("select");
        assert_eq!(
            ctl.form().cascade.faculty,
            OptionKey::Id(is.faculty_id.clone())
        );
        assert_eq!(ctl.form().cascade.department, OptionKey::Id(is.id.clone()));

        ctl.set_field("fullName", "Salma N. Ibrahim").expect("name");
        ctl.update(&store).expect("update");
        assert_eq!(ctl.selected(), Some(id.as_str()));

        let saved = store
            .find_by_id::<Student>(&id)
            .expect("find")
            .expect("saved");
        assert_eq!(saved.full_name, "Salma N. Ibrahim");
        assert_eq!(saved.department_id, Some(is.id));
    }

    #[test]
    fn update_and_delete_require_a_selection() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let mut ctl = FormController::<StudentForm>::new();
        ctl.open(&store).expect("open screen");

        assert!(matches!(ctl.update(&store), Err(FormError::Validation(_))));
        assert!(matches!(
            ctl.delete(&store, true),
            Err(FormError::Validation(_))
        ));
    }
}

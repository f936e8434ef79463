use serde_json::json;

use super::{opt_cell, parse_int, Directory, EntityForm, FormError, FormResult};
use crate::lookup::{department_choices, instructor_choices, Choice, OptionKey};
use crate::model::Course;
use crate::store::Store;

pub const SEMESTERS: [&str; 2] = ["1", "2"];

#[derive(Debug, Clone)]
pub struct CourseForm {
    code: String,
    name: String,
    credits: String,
    semester: String,
    department: Choice,
    instructor: Choice,
}

impl EntityForm for CourseForm {
    type Record = Course;

    const LABEL: &'static str = "Course";
    const HEADERS: &'static [&'static str] = &[
        "ID",
        "Code",
        "Name",
        "Dept",
        "Instructor",
        "Credits",
        "Semester",
    ];
    const SEARCH_COLUMNS: &'static [usize] = &[1, 2];
    const CONFLICT_MESSAGE: &'static str = "Course code already exists.";

    fn new() -> Self {
        CourseForm {
            code: String::new(),
            name: String::new(),
            credits: String::new(),
            semester: SEMESTERS[0].to_string(),
            department: Choice::default(),
            instructor: Choice::default(),
        }
    }

    fn prepare<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.department.replace_options(department_choices(store)?);
        self.instructor.replace_options(instructor_choices(store)?);
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> FormResult<()> {
        let slot = match field {
            "code" => &mut self.code,
            "name" => &mut self.name,
            "credits" => &mut self.credits,
            "semester" => &mut self.semester,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn choose<S: Store>(&mut self, _store: &S, field: &str, key: OptionKey) -> FormResult<()> {
        match field {
            "department" => self.department.select(key)?,
            "instructor" => self.instructor.select(key)?,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        }
        Ok(())
    }

    fn build(&self, existing: Option<&Course>) -> FormResult<Course> {
        let code = self.code.trim();
        let name = self.name.trim();
        if code.is_empty() || name.is_empty() {
            return Err(FormError::validation("Course code and name are required."));
        }
        let credits = parse_int(&self.credits, "Credits must be a positive number.", |v| {
            v > 0
        })?;
        let semester = parse_int(&self.semester, "Semester must be 1 or 2.", |v| {
            v == 1 || v == 2
        })?;

        let mut course = existing.cloned().unwrap_or_default();
        course.code = code.to_string();
        course.name = name.to_string();
        course.credits = credits;
        course.semester = semester;
        course.department_id = self.department.key.id().map(str::to_string);
        course.instructor_id = self.instructor.key.id().map(str::to_string);
        Ok(course)
    }

    fn load<S: Store>(&mut self, store: &S, record: &Course) -> FormResult<()> {
        self.code = record.code.clone();
        self.name = record.name.clone();
        self.credits = opt_cell(record.credits);
        self.semester = opt_cell(record.semester);
        self.department.restore(record.department_id.as_deref());
        self.instructor.restore(record.instructor_id.as_deref());
        self.prepare(store)
    }

    fn reset<S: Store>(&mut self, store: &S) -> FormResult<()> {
        *self = CourseForm::new();
        self.prepare(store)
    }

    fn cells(c: &Course, dir: &Directory) -> Vec<String> {
        vec![
            c.id.clone(),
            c.code.clone(),
            c.name.clone(),
            dir.department_name(c.department_id.as_deref())
                .unwrap_or_default()
                .to_string(),
            dir.instructor_name(c.instructor_id.as_deref())
                .unwrap_or_default()
                .to_string(),
            opt_cell(c.credits),
            opt_cell(c.semester),
        ]
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "code": self.code,
            "name": self.name,
            "credits": self.credits,
            "semester": self.semester,
            "semesters": SEMESTERS,
            "department": self.department.to_json(),
            "instructor": self.instructor.to_json(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::form::test_util::{add_course, department};
    use crate::form::FormController;
    use crate::model::Instructor;
    use crate::store::SqliteStore;

    #[test]
    fn create_with_department_and_instructor_renders_their_names() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let se = department(&store, "Software Engineering");
        let instructor_id = store
            .insert(&Instructor {
                full_name: "Dr. Hala Mostafa".into(),
                ..Default::default()
            })
            .expect("instructor");

        let mut ctl = FormController::<CourseForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.set_field("code", "SE201").expect("code");
        ctl.set_field("name", "Software Design").expect("name");
        ctl.set_field("credits", "3").expect("credits");
        ctl.choose(&store, "department", OptionKey::Id(se.id.clone()))
            .expect("department");
        ctl.choose(&store, "instructor", OptionKey::Id(instructor_id.clone()))
            .expect("instructor");
        ctl.create(&store).expect("create");

        let row = &ctl.view().rows()[0];
        assert_eq!(
            row.cells[1..],
            [
                "SE201".to_string(),
                "Software Design".to_string(),
                "Software Engineering".to_string(),
                "Dr. Hala Mostafa".to_string(),
                "3".to_string(),
                "1".to_string(),
            ]
        );
        assert_eq!(ctl.form().department.key, OptionKey::Unset);
    }

    #[test]
    fn malformed_numbers_abort_without_writing() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let mut ctl = FormController::<CourseForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.set_field("code", "MA101").expect("code");
        ctl.set_field("name", "Calculus").expect("name");

        ctl.set_field("credits", "three").expect("credits");
        assert_eq!(
            ctl.create(&store),
            Err(FormError::Validation("Credits must be a positive number.".into()))
        );
        ctl.set_field("credits", "").expect("credits");
        ctl.set_field("semester", "3").expect("semester");
        assert_eq!(
            ctl.create(&store),
            Err(FormError::Validation("Semester must be 1 or 2.".into()))
        );
        assert_eq!(store.count::<Course>().expect("count"), 0);
    }

    #[test]
    fn duplicate_code_on_update_is_a_conflict() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        add_course(&store, "CS101", "Programming I", None);
        let second = add_course(&store, "CS102", "Programming II", None);

        let mut ctl = FormController::<CourseForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.select_row(&store, &second).expect("select");
        ctl.set_field("code", "CS101").expect("code");

        assert_eq!(
            ctl.update(&store),
            Err(FormError::Conflict("Course code already exists.".into()))
        );
        assert_eq!(ctl.form().code, "CS101");
        assert_eq!(ctl.selected(), Some(second.as_str()));
        let saved = store
            .find_by_id::<Course>(&second)
            .expect("find")
            .expect("course");
        assert_eq!(saved.code, "CS102");
    }

    #[test]
    fn unknown_instructor_key_is_rejected() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let mut ctl = FormController::<CourseForm>::new();
        ctl.open(&store).expect("open screen");
        let res = ctl.choose(&store, "instructor", OptionKey::Id("missing".into()));
        assert!(matches!(res, Err(FormError::Validation(_))));
        assert_eq!(ctl.form().instructor.key, OptionKey::Unset);
    }

    #[test]
    fn declined_delete_changes_nothing() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let id = add_course(&store, "CS101", "Programming I", None);

        let mut ctl = FormController::<CourseForm>::new();
        ctl.open(&store).expect("open screen");
        ctl.select_row(&store, &id).expect("select");

        assert_eq!(ctl.delete(&store, false), Ok(crate::form::Outcome::Declined));
        assert_eq!(ctl.selected(), Some(id.as_str()));
        assert_eq!(ctl.form().name, "Programming I");
        assert_eq!(store.count::<Course>().expect("count"), 1);

        let outcome = ctl.delete(&store, true).expect("delete");
        assert_eq!(outcome.id(), Some(id.as_str()));
        assert_eq!(ctl.selected(), None);
        assert!(ctl.view().rows().is_empty());
    }
}

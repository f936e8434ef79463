use serde_json::json;

use super::{non_empty, Directory, EntityForm, FormError, FormResult};
use crate::lookup::{department_choices, Choice, OptionKey};
use crate::model::Instructor;
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct InstructorForm {
    full_name: String,
    rank: String,
    email: String,
    phone: String,
    department: Choice,
}

impl EntityForm for InstructorForm {
    type Record = Instructor;

    const LABEL: &'static str = "Instructor";
    const HEADERS: &'static [&'static str] = &["ID", "Name", "Dept", "Rank", "Email", "Phone"];
    const SEARCH_COLUMNS: &'static [usize] = &[1, 4];
    const CONFLICT_MESSAGE: &'static str = "Instructor already exists.";

    fn new() -> Self {
        InstructorForm::default()
    }

    fn prepare<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.department.replace_options(department_choices(store)?);
        Ok(())
    }

    fn set_field(&mut self, field: &str, value: &str) -> FormResult<()> {
        let slot = match field {
            "fullName" => &mut self.full_name,
            "rank" => &mut self.rank,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            _ => return Err(FormError::validation(format!("unknown field: {field}"))),
        };
        *slot = value.to_string();
        Ok(())
    }

    fn choose<S: Store>(&mut self, _store: &S, field: &str, key: OptionKey) -> FormResult<()> {
        if field != "department" {
            return Err(FormError::validation(format!("unknown field: {field}")));
        }
        self.department.select(key)?;
        Ok(())
    }

    fn build(&self, existing: Option<&Instructor>) -> FormResult<Instructor> {
        let full_name = self.full_name.trim();
        if full_name.is_empty() {
            return Err(FormError::validation("Name is required."));
        }
        let mut instructor = existing.cloned().unwrap_or_default();
        instructor.full_name = full_name.to_string();
        instructor.rank = non_empty(&self.rank);
        instructor.email = non_empty(&self.email);
        instructor.phone = non_empty(&self.phone);
        instructor.department_id = self.department.key.id().map(str::to_string);
        Ok(instructor)
    }

    fn load<S: Store>(&mut self, store: &S, record: &Instructor) -> FormResult<()> {
        self.full_name = record.full_name.clone();
        self.rank = record.rank.clone().unwrap_or_default();
        self.email = record.email.clone().unwrap_or_default();
        self.phone = record.phone.clone().unwrap_or_default();
        self.department.restore(record.department_id.as_deref());
        self.prepare(store)
    }

    fn reset<S: Store>(&mut self, store: &S) -> FormResult<()> {
        *self = InstructorForm::default();
        self.prepare(store)
    }

    fn cells(i: &Instructor, dir: &Directory) -> Vec<String> {
        vec![
            i.id.clone(),
            i.full_name.clone(),
            dir.department_name(i.department_id.as_deref())
                .unwrap_or_default()
                .to_string(),
            i.rank.clone().unwrap_or_default(),
            i.email.clone().unwrap_or_default(),
            i.phone.clone().unwrap_or_default(),
        ]
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "fullName": self.full_name,
            "rank": self.rank,
            "email": self.email,
            "phone": self.phone,
            "department": self.department.to_json(),
        })
    }
}

//! Dependent dropdowns: faculty -> department -> course.
//!
//! Every option list starts with a placeholder whose key is [`OptionKey::Unset`].
//! The student screen's department list also carries the "Not specified yet"
//! sentinel, which is a real choice meaning "no department", unlike the
//! placeholder which means "nothing chosen".

use serde_json::json;

use crate::model::{Course, Department, Faculty, Instructor};
use crate::store::{Store, StoreResult};

pub const PLACEHOLDER_LABEL: &str = "-- Select --";
pub const SENTINEL_LABEL: &str = "Not specified yet";
/// Wire form of [`OptionKey::NotSpecified`].
pub const SENTINEL_KEY: &str = "not_specified";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OptionKey {
    #[default]
    Unset,
    NotSpecified,
    Id(String),
}

impl OptionKey {
    pub fn from_json(v: &serde_json::Value) -> Option<OptionKey> {
        if v.is_null() {
            return Some(OptionKey::Unset);
        }
        let s = v.as_str()?.trim();
        Some(match s {
            "" => OptionKey::Unset,
            SENTINEL_KEY => OptionKey::NotSpecified,
            _ => OptionKey::Id(s.to_string()),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            OptionKey::Unset => serde_json::Value::Null,
            OptionKey::NotSpecified => json!(SENTINEL_KEY),
            OptionKey::Id(id) => json!(id),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            OptionKey::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn from_ref(id: Option<&str>) -> OptionKey {
        id.map(|s| OptionKey::Id(s.to_string()))
            .unwrap_or(OptionKey::Unset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    pub label: String,
    pub key: OptionKey,
}

impl DropdownOption {
    fn placeholder() -> Self {
        DropdownOption {
            label: PLACEHOLDER_LABEL.to_string(),
            key: OptionKey::Unset,
        }
    }

    fn sentinel() -> Self {
        DropdownOption {
            label: SENTINEL_LABEL.to_string(),
            key: OptionKey::NotSpecified,
        }
    }

    fn record(label: &str, id: &str) -> Self {
        DropdownOption {
            label: label.to_string(),
            key: OptionKey::Id(id.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({ "label": self.label, "key": self.key.to_json() })
    }
}

pub fn options_json(options: &[DropdownOption]) -> serde_json::Value {
    serde_json::Value::Array(options.iter().map(DropdownOption::to_json).collect())
}

fn contains(options: &[DropdownOption], key: &OptionKey) -> bool {
    options.iter().any(|o| &o.key == key)
}

fn with_prefix(sentinel: bool) -> Vec<DropdownOption> {
    let mut out = vec![DropdownOption::placeholder()];
    if sentinel {
        out.push(DropdownOption::sentinel());
    }
    out
}

pub fn faculty_options<S: Store>(store: &S) -> StoreResult<Vec<DropdownOption>> {
    let mut out = with_prefix(false);
    for f in store.find_all::<Faculty>()? {
        out.push(DropdownOption::record(&f.name, &f.id));
    }
    Ok(out)
}

pub fn department_options<S: Store>(
    store: &S,
    faculty_id: Option<&str>,
    sentinel: bool,
) -> StoreResult<Vec<DropdownOption>> {
    let mut out = with_prefix(sentinel);
    let Some(faculty_id) = faculty_id else {
        return Ok(out);
    };
    for d in store.find_children::<Department>("faculty_id", faculty_id)? {
        out.push(DropdownOption::record(&d.name, &d.id));
    }
    Ok(out)
}

pub fn course_options<S: Store>(
    store: &S,
    department_id: Option<&str>,
) -> StoreResult<Vec<DropdownOption>> {
    let mut out = with_prefix(false);
    let Some(department_id) = department_id else {
        return Ok(out);
    };
    for c in store.find_children::<Course>("department_id", department_id)? {
        out.push(DropdownOption::record(&c.name, &c.id));
    }
    Ok(out)
}

/// Flat "<Faculty> - <Department>" list for screens without a faculty selector.
pub fn department_choices<S: Store>(store: &S) -> StoreResult<Vec<DropdownOption>> {
    let faculties = store.find_all::<Faculty>()?;
    let mut labelled: Vec<(String, String)> = store
        .find_all::<Department>()?
        .into_iter()
        .map(|d| {
            let faculty_name = faculties
                .iter()
                .find(|f| f.id == d.faculty_id)
                .map(|f| f.name.as_str())
                .unwrap_or("Unknown Faculty");
            (format!("{} - {}", faculty_name, d.name), d.id)
        })
        .collect();
    labelled.sort();

    let mut out = with_prefix(false);
    out.extend(
        labelled
            .iter()
            .map(|(label, id)| DropdownOption::record(label, id)),
    );
    Ok(out)
}

pub fn instructor_choices<S: Store>(store: &S) -> StoreResult<Vec<DropdownOption>> {
    let mut out = with_prefix(false);
    for i in store.find_all::<Instructor>()? {
        out.push(DropdownOption::record(&i.full_name, &i.id));
    }
    Ok(out)
}

/// One flat dropdown (no parent) and its current key.
#[derive(Debug, Clone)]
pub struct Choice {
    pub key: OptionKey,
    pub options: Vec<DropdownOption>,
}

impl Default for Choice {
    fn default() -> Self {
        Choice {
            key: OptionKey::Unset,
            options: with_prefix(false),
        }
    }
}

impl Choice {
    /// Swaps in a fresh option list, dropping the key if it is no longer offered.
    pub fn replace_options(&mut self, options: Vec<DropdownOption>) {
        if !contains(&options, &self.key) {
            self.key = OptionKey::Unset;
        }
        self.options = options;
    }

    pub fn select(&mut self, key: OptionKey) -> Result<(), CascadeError> {
        if !contains(&self.options, &key) {
            return Err(CascadeError::UnknownOption(label_of(&key)));
        }
        self.key = key;
        Ok(())
    }

    /// Points at `id` even before the option list is reloaded.
    pub fn restore(&mut self, id: Option<&str>) {
        self.key = OptionKey::from_ref(id);
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({ "key": self.key.to_json(), "options": options_json(&self.options) })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("'{0}' is not one of the available options")]
    UnknownOption(String),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

/// Current selections and option lists of a faculty/department(/course) chain.
#[derive(Debug, Clone)]
pub struct Cascade {
    sentinel: bool,
    with_courses: bool,
    pub faculty: OptionKey,
    pub department: OptionKey,
    pub course: OptionKey,
    pub faculties: Vec<DropdownOption>,
    pub departments: Vec<DropdownOption>,
    pub courses: Vec<DropdownOption>,
}

impl Cascade {
    pub fn new(sentinel: bool, with_courses: bool) -> Self {
        Cascade {
            sentinel,
            with_courses,
            faculty: OptionKey::Unset,
            department: OptionKey::Unset,
            course: OptionKey::Unset,
            faculties: with_prefix(false),
            departments: with_prefix(sentinel),
            courses: with_prefix(false),
        }
    }

    /// Reloads the faculty list; selections survive while their faculty is still offered.
    pub fn reload_faculties<S: Store>(&mut self, store: &S) -> StoreResult<()> {
        let faculties = faculty_options(store)?;
        let still_offered = contains(&faculties, &self.faculty);
        self.faculties = faculties;
        if !still_offered {
            self.reset();
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.faculty = OptionKey::Unset;
        self.department = OptionKey::Unset;
        self.course = OptionKey::Unset;
        self.departments = with_prefix(self.sentinel);
        self.courses = with_prefix(false);
    }

    pub fn select_faculty<S: Store>(
        &mut self,
        store: &S,
        key: OptionKey,
    ) -> Result<(), CascadeError> {
        if !contains(&self.faculties, &key) {
            return Err(CascadeError::UnknownOption(label_of(&key)));
        }
        if key == self.faculty {
            return Ok(());
        }
        let departments = department_options(store, key.id(), self.sentinel)?;
        self.faculty = key;
        self.department = OptionKey::Unset;
        self.course = OptionKey::Unset;
        self.departments = departments;
        self.courses = with_prefix(false);
        Ok(())
    }

    pub fn select_department<S: Store>(
        &mut self,
        store: &S,
        key: OptionKey,
    ) -> Result<(), CascadeError> {
        if !contains(&self.departments, &key) {
            return Err(CascadeError::UnknownOption(label_of(&key)));
        }
        if key == self.department {
            return Ok(());
        }
        let courses = if self.with_courses {
            course_options(store, key.id())?
        } else {
            with_prefix(false)
        };
        self.department = key;
        self.course = OptionKey::Unset;
        self.courses = courses;
        Ok(())
    }

    pub fn select_course(&mut self, key: OptionKey) -> Result<(), CascadeError> {
        if !self.with_courses || !contains(&self.courses, &key) {
            return Err(CascadeError::UnknownOption(label_of(&key)));
        }
        self.course = key;
        Ok(())
    }

    /// Re-resolves the chain so it points at `department` (and its faculty).
    /// `None` selects the sentinel when this chain has one, placeholders otherwise.
    pub fn restore<S: Store>(
        &mut self,
        store: &S,
        department: Option<&Department>,
    ) -> Result<(), CascadeError> {
        self.reset();
        match department {
            Some(dept) => {
                self.select_faculty(store, OptionKey::Id(dept.faculty_id.clone()))?;
                self.select_department(store, OptionKey::Id(dept.id.clone()))?;
            }
            None if self.sentinel => {
                self.department = OptionKey::NotSpecified;
            }
            None => {}
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut v = json!({
            "faculty": self.faculty.to_json(),
            "department": self.department.to_json(),
            "faculties": options_json(&self.faculties),
            "departments": options_json(&self.departments),
        });
        if self.with_courses {
            v["course"] = self.course.to_json();
            v["courses"] = options_json(&self.courses);
        }
        v
    }
}

fn label_of(key: &OptionKey) -> String {
    match key {
        OptionKey::Unset => "(unset)".to_string(),
        OptionKey::NotSpecified => SENTINEL_KEY.to_string(),
        OptionKey::Id(id) => id.clone(),
    }
}

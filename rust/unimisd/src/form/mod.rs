//! Create/update/delete workflows shared by every entity screen.
//!
//! A [`FormController`] owns one screen's form state, its record selection and
//! the rows it currently shows. Each operation takes the store explicitly and
//! either succeeds with an [`Outcome`] or fails with a [`FormError`] that left
//! the form exactly as it was.

mod course;
mod enrollment;
mod instructor;
mod selection;
mod student;
mod view;

use std::collections::HashMap;

use serde_json::json;
use tracing::{error, info, warn};

use crate::lookup::{CascadeError, OptionKey};
use crate::model::{Course, Department, Faculty, Instructor};
use crate::store::{Store, StoreError, Table};

pub use course::CourseForm;
pub use enrollment::EnrollmentForm;
pub use instructor::InstructorForm;
pub use selection::Selection;
pub use student::StudentForm;
pub use view::{ListView, ViewRow};

pub type FormResult<T> = Result<T, FormError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Persistence(String),
}

impl FormError {
    pub fn code(&self) -> &'static str {
        match self {
            FormError::Validation(_) => "validation_error",
            FormError::Conflict(_) => "uniqueness_violation",
            FormError::NotFound(_) => "not_found",
            FormError::Persistence(_) => "persistence_failed",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        FormError::Validation(message.into())
    }
}

impl From<StoreError> for FormError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniquenessViolation { entity, .. } => {
                FormError::Conflict(format!("{entity} already exists."))
            }
            StoreError::NotFound { entity, .. } => {
                FormError::NotFound(format!("{entity} not found."))
            }
            StoreError::Sqlite(e) => {
                error!(error = %e, "store failure");
                FormError::Persistence(e.to_string())
            }
        }
    }
}

impl From<CascadeError> for FormError {
    fn from(e: CascadeError) -> Self {
        match e {
            CascadeError::UnknownOption(_) => FormError::Validation(e.to_string()),
            CascadeError::Store(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created { id: String },
    Updated { id: String },
    Deleted { id: String },
    Declined,
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Created { .. } => "created",
            Outcome::Updated { .. } => "updated",
            Outcome::Deleted { .. } => "deleted",
            Outcome::Declined => "declined",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Outcome::Created { id } | Outcome::Updated { id } | Outcome::Deleted { id } => {
                Some(id)
            }
            Outcome::Declined => None,
        }
    }

    pub fn message(&self, label: &str) -> String {
        match self {
            Outcome::Created { .. } => format!("{label} added successfully."),
            Outcome::Updated { .. } => format!("{label} updated successfully."),
            Outcome::Deleted { .. } => format!("{label} deleted."),
            Outcome::Declined => "Delete cancelled.".to_string(),
        }
    }
}

/// Display names needed to render table rows, loaded once per refresh.
#[derive(Debug, Default)]
pub struct Directory {
    faculties: HashMap<String, String>,
    departments: HashMap<String, Department>,
    instructors: HashMap<String, String>,
    courses: HashMap<String, Course>,
}

impl Directory {
    pub fn load<S: Store>(store: &S) -> FormResult<Self> {
        Ok(Directory {
            faculties: store
                .find_all::<Faculty>()?
                .into_iter()
                .map(|f| (f.id, f.name))
                .collect(),
            departments: store
                .find_all::<Department>()?
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
            instructors: store
                .find_all::<Instructor>()?
                .into_iter()
                .map(|i| (i.id, i.full_name))
                .collect(),
            courses: store
                .find_all::<Course>()?
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        })
    }

    pub fn department_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.departments.get(id))
            .map(|d| d.name.as_str())
    }

    pub fn faculty_of_department(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.departments.get(id))
            .and_then(|d| self.faculties.get(&d.faculty_id))
            .map(String::as_str)
    }

    pub fn instructor_name(&self, id: Option<&str>) -> Option<&str> {
        id.and_then(|id| self.instructors.get(id))
            .map(String::as_str)
    }

    pub fn course(&self, id: &str) -> Option<&Course> {
        self.courses.get(id)
    }
}

pub(crate) fn opt_cell<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Trimmed text, `None` when empty.
pub(crate) fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

pub(crate) fn parse_int(
    raw: &str,
    message: &str,
    valid: impl Fn(i64) -> bool,
) -> FormResult<Option<i64>> {
    let t = raw.trim();
    if t.is_empty() {
        return Ok(None);
    }
    match t.parse::<i64>() {
        Ok(v) if valid(v) => Ok(Some(v)),
        _ => Err(FormError::validation(message)),
    }
}

/// Per-entity half of a screen: its fields, how they become a record and how
/// a record is shown in the table.
pub trait EntityForm: Clone {
    type Record: Table + Clone;

    const LABEL: &'static str;
    const HEADERS: &'static [&'static str];
    /// Indexes into [`EntityForm::cells`] that the search text is matched against.
    const SEARCH_COLUMNS: &'static [usize];
    const CONFLICT_MESSAGE: &'static str;
    const EMPTY_EXPORT_MESSAGE: Option<&'static str> = None;

    fn new() -> Self;

    /// (Re)loads option lists that do not depend on another selection,
    /// keeping current choices that are still offered.
    fn prepare<S: Store>(&mut self, store: &S) -> FormResult<()>;

    fn set_field(&mut self, field: &str, value: &str) -> FormResult<()>;

    fn choose<S: Store>(&mut self, store: &S, field: &str, key: OptionKey) -> FormResult<()>;

    /// Validates the fields and produces the record to persist. With
    /// `existing`, the record's identity and untouched fields are kept.
    fn build(&self, existing: Option<&Self::Record>) -> FormResult<Self::Record>;

    fn load<S: Store>(&mut self, store: &S, record: &Self::Record) -> FormResult<()>;

    fn reset<S: Store>(&mut self, store: &S) -> FormResult<()>;

    fn fetch<S: Store>(&self, store: &S) -> FormResult<Vec<Self::Record>> {
        Ok(store.find_all::<Self::Record>()?)
    }

    fn cells(record: &Self::Record, dir: &Directory) -> Vec<String>;

    fn ensure_ready(&self) -> FormResult<()> {
        Ok(())
    }

    /// Re-reads records the form depends on beyond its own. `NotFound` means
    /// one of them is gone and the form has locked itself.
    fn revalidate<S: Store>(&mut self, _store: &S) -> FormResult<()> {
        Ok(())
    }

    fn to_json(&self) -> serde_json::Value;
}

#[derive(Debug, Clone)]
pub struct FormController<F: EntityForm> {
    pub(crate) form: F,
    pub(crate) selection: Selection,
    pub(crate) view: ListView,
}

impl<F: EntityForm> Default for FormController<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: EntityForm> FormController<F> {
    pub fn new() -> Self {
        FormController {
            form: F::new(),
            selection: Selection::default(),
            view: ListView::default(),
        }
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn selected(&self) -> Option<&str> {
        self.selection.current()
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn open<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.form.prepare(store)?;
        self.refresh(store)
    }

    /// Runs `f` on a copy of the form and keeps the copy only if `f` succeeds.
    fn stage(&mut self, f: impl FnOnce(&mut F) -> FormResult<()>) -> FormResult<()> {
        let mut next = self.form.clone();
        f(&mut next)?;
        self.form = next;
        Ok(())
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> FormResult<()> {
        self.stage(|form| form.set_field(field, value))
    }

    pub fn choose<S: Store>(&mut self, store: &S, field: &str, key: OptionKey) -> FormResult<()> {
        self.stage(|form| form.choose(store, field, key))
    }

    fn revalidate<S: Store>(&mut self, store: &S) -> FormResult<()> {
        let res = self.form.revalidate(store);
        if let Err(FormError::NotFound(_)) = &res {
            self.selection.clear();
            self.view.clear_rows();
        }
        res
    }

    /// Clears and refreshes after a committed write. Failures are logged,
    /// not returned.
    fn settle<S: Store>(&mut self, store: &S, reset: bool) {
        let res = if reset {
            self.selection.clear();
            self.clear(store)
        } else {
            Ok(())
        };
        if let Err(e) = res.and_then(|_| self.refresh(store)) {
            error!(entity = F::Record::ENTITY, error = %e, "screen refresh after write failed");
        }
    }

    /// Re-reads the records and re-applies the current search text.
    pub fn refresh<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.revalidate(store)?;
        self.form.prepare(store)?;
        let records = self.form.fetch(store)?;
        if let Some(id) = self.selection.current() {
            if !records.iter().any(|r| r.id() == id) {
                self.selection.clear();
            }
        }
        let rows = if records.is_empty() {
            Vec::new()
        } else {
            let dir = Directory::load(store)?;
            records
                .iter()
                .map(|r| ViewRow {
                    id: r.id().to_string(),
                    cells: F::cells(r, &dir),
                })
                .collect()
        };
        self.view.replace(rows, F::SEARCH_COLUMNS);
        Ok(())
    }

    pub fn search<S: Store>(&mut self, store: &S, text: &str) -> FormResult<()> {
        self.view.set_filter(text);
        self.selection.clear();
        self.refresh(store)
    }

    /// Selects one of the visible rows and loads its record into the form.
    pub fn select_row<S: Store>(&mut self, store: &S, id: &str) -> FormResult<()> {
        self.revalidate(store)?;
        self.form.ensure_ready()?;
        if !self.view.rows().iter().any(|r| r.id == id) {
            warn!(entity = F::Record::ENTITY, %id, "selected id is not a visible row");
            return Err(FormError::NotFound(format!("{} not found.", F::LABEL)));
        }
        let Some(record) = store.find_by_id::<F::Record>(id)? else {
            warn!(entity = F::Record::ENTITY, %id, "selected row no longer exists");
            return Err(FormError::NotFound(format!("{} not found.", F::LABEL)));
        };
        self.stage(|form| form.load(store, &record))?;
        self.selection.select(id);
        Ok(())
    }

    pub fn clear<S: Store>(&mut self, store: &S) -> FormResult<()> {
        self.stage(|form| form.reset(store))?;
        self.selection.clear();
        Ok(())
    }

    pub fn create<S: Store>(&mut self, store: &S) -> FormResult<Outcome> {
        self.revalidate(store)?;
        self.form.ensure_ready()?;
        let record = self.form.build(None)?;
        let id = store
            .insert(&record)
            .map_err(Self::persist_failed)?;
        info!(entity = F::Record::ENTITY, %id, "created");

        self.settle(store, true);
        Ok(Outcome::Created { id })
    }

    pub fn update<S: Store>(&mut self, store: &S) -> FormResult<Outcome> {
        let Some(id) = self.selection.current().map(str::to_string) else {
            return Err(FormError::validation(format!(
                "Please select a {} from the table first.",
                F::LABEL.to_lowercase()
            )));
        };
        self.revalidate(store)?;
        self.form.ensure_ready()?;

        let Some(existing) = store.find_by_id::<F::Record>(&id)? else {
            warn!(entity = F::Record::ENTITY, %id, "selected record vanished before update");
            self.refresh(store)?;
            return Err(FormError::NotFound(format!("{} not found.", F::LABEL)));
        };
        let record = self.form.build(Some(&existing))?;
        store
            .update(&record)
            .map_err(Self::persist_failed)?;
        info!(entity = F::Record::ENTITY, %id, "updated");

        self.settle(store, false);
        Ok(Outcome::Updated { id })
    }

    pub fn delete<S: Store>(&mut self, store: &S, confirmed: bool) -> FormResult<Outcome> {
        let Some(id) = self.selection.current().map(str::to_string) else {
            return Err(FormError::validation(format!(
                "Please select a {} to delete.",
                F::LABEL.to_lowercase()
            )));
        };
        if !confirmed {
            return Ok(Outcome::Declined);
        }

        if let Err(e) = store.delete::<F::Record>(&id) {
            let err = Self::persist_failed(e);
            if matches!(err, FormError::NotFound(_)) {
                self.refresh(store)?;
            }
            return Err(err);
        }
        info!(entity = F::Record::ENTITY, %id, "deleted");

        self.settle(store, true);
        Ok(Outcome::Deleted { id })
    }

    /// The visible rows as CSV, header first, in display order.
    pub fn export_csv(&self) -> FormResult<String> {
        if self.view.rows().is_empty() {
            if let Some(message) = F::EMPTY_EXPORT_MESSAGE {
                return Err(FormError::validation(message));
            }
        }
        Ok(self.view.to_csv(F::HEADERS))
    }

    fn persist_failed(e: StoreError) -> FormError {
        match e {
            StoreError::UniquenessViolation { entity, message } => {
                warn!(entity, %message, "uniqueness violation");
                FormError::Conflict(F::CONFLICT_MESSAGE.to_string())
            }
            StoreError::NotFound { entity, id } => {
                warn!(entity, %id, "record not found");
                FormError::NotFound(format!("{} not found.", F::LABEL))
            }
            other => other.into(),
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "form": self.form().to_json(),
            "selectedId": self.selected(),
            "filter": self.view.filter(),
            "headers": F::HEADERS,
            "rows": self.view.rows_json(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::model::Student;
    use crate::store::StoreResult;
    use std::cell::RefCell;

    /// Delegates to another store and records which tables were read.
    pub struct CountingStore<'a, S: Store> {
        pub inner: &'a S,
        pub reads: RefCell<Vec<&'static str>>,
    }

    impl<'a, S: Store> CountingStore<'a, S> {
        pub fn new(inner: &'a S) -> Self {
            CountingStore {
                inner,
                reads: RefCell::new(Vec::new()),
            }
        }

        pub fn reads_of(&self, table: &str) -> usize {
            self.reads.borrow().iter().filter(|t| **t == table).count()
        }
    }

    impl<S: Store> Store for CountingStore<'_, S> {
        fn find_by_id<T: Table>(&self, id: &str) -> StoreResult<Option<T>> {
            self.reads.borrow_mut().push(T::TABLE);
            self.inner.find_by_id(id)
        }
        fn find_all<T: Table>(&self) -> StoreResult<Vec<T>> {
            self.reads.borrow_mut().push(T::TABLE);
            self.inner.find_all()
        }
        fn find_children<T: Table>(
            &self,
            parent_column: &'static str,
            parent_id: &str,
        ) -> StoreResult<Vec<T>> {
            self.reads.borrow_mut().push(T::TABLE);
            self.inner.find_children(parent_column, parent_id)
        }
        fn find_by_column<T: Table>(
            &self,
            column: &'static str,
            value: &str,
        ) -> StoreResult<Option<T>> {
            self.reads.borrow_mut().push(T::TABLE);
            self.inner.find_by_column(column, value)
        }
        fn insert<T: Table>(&self, record: &T) -> StoreResult<String> {
            self.inner.insert(record)
        }
        fn update<T: Table>(&self, record: &T) -> StoreResult<()> {
            self.inner.update(record)
        }
        fn delete<T: Table>(&self, id: &str) -> StoreResult<()> {
            self.inner.delete::<T>(id)
        }
        fn count<T: Table>(&self) -> StoreResult<i64> {
            self.inner.count::<T>()
        }
    }

    pub fn department<S: Store>(store: &S, name: &str) -> Department {
        store
            .find_all::<Department>()
            .expect("departments")
            .into_iter()
            .find(|d| d.name == name)
            .expect("department")
    }

    pub fn add_student<S: Store>(store: &S, code: &str, name: &str, dept: Option<&str>) -> String {
        store
            .insert(&Student {
                university_id: code.into(),
                full_name: name.into(),
                level: Some(1),
                status: "active".into(),
                department_id: dept.map(str::to_string),
                ..Default::default()
            })
            .expect("student")
    }

    pub fn add_course<S: Store>(store: &S, code: &str, name: &str, dept: Option<&str>) -> String {
        store
            .insert(&Course {
                code: code.into(),
                name: name.into(),
                credits: Some(3),
                semester: Some(1),
                department_id: dept.map(str::to_string),
                ..Default::default()
            })
            .expect("course")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::{SqliteStore, StoreResult};
    use std::cell::Cell;

    /// Fails every read once a write has gone through.
    struct ReadsFailAfterWrite<'a> {
        inner: SqliteStore<'a>,
        wrote: Cell<bool>,
    }

    impl ReadsFailAfterWrite<'_> {
        fn check(&self) -> StoreResult<()> {
            if self.wrote.get() {
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            Ok(())
        }
    }

    impl Store for ReadsFailAfterWrite<'_> {
        fn find_by_id<T: Table>(&self, id: &str) -> StoreResult<Option<T>> {
            self.check()?;
            self.inner.find_by_id(id)
        }
        fn find_all<T: Table>(&self) -> StoreResult<Vec<T>> {
            self.check()?;
            self.inner.find_all()
        }
        fn find_children<T: Table>(
            &self,
            parent_column: &'static str,
            parent_id: &str,
        ) -> StoreResult<Vec<T>> {
            self.check()?;
            self.inner.find_children(parent_column, parent_id)
        }
        fn find_by_column<T: Table>(
            &self,
            column: &'static str,
            value: &str,
        ) -> StoreResult<Option<T>> {
            self.check()?;
            self.inner.find_by_column(column, value)
        }
        fn insert<T: Table>(&self, record: &T) -> StoreResult<String> {
            let id = self.inner.insert(record)?;
            self.wrote.set(true);
            Ok(id)
        }
        fn update<T: Table>(&self, record: &T) -> StoreResult<()> {
            self.inner.update(record)?;
            self.wrote.set(true);
            Ok(())
        }
        fn delete<T: Table>(&self, id: &str) -> StoreResult<()> {
            self.inner.delete::<T>(id)?;
            self.wrote.set(true);
            Ok(())
        }
        fn count<T: Table>(&self) -> StoreResult<i64> {
            self.inner.count::<T>()
        }
    }

    #[test]
    fn committed_writes_report_success_when_the_refresh_fails() {
        let conn = db::open_in_memory().expect("open");
        let store = ReadsFailAfterWrite {
            inner: SqliteStore::new(&conn),
            wrote: Cell::new(false),
        };
        let mut ctl = FormController::<InstructorForm>::new();
        ctl.open(&store).expect("open screen");

        ctl.set_field("fullName", "Dr. Heba Kamal").expect("name");
        let outcome = ctl.create(&store).expect("create");
        let id = outcome.id().expect("id").to_string();
        assert_eq!(outcome, Outcome::Created { id: id.clone() });
        assert_eq!(store.count::<Instructor>().expect("count"), 1);
        assert_eq!(ctl.selected(), None);

        store.wrote.set(false);
        ctl.refresh(&store).expect("refresh");
        ctl.select_row(&store, &id).expect("select");
        ctl.set_field("rank", "Professor").expect("rank");
        assert_eq!(ctl.update(&store), Ok(Outcome::Updated { id: id.clone() }));

        store.wrote.set(false);
        assert_eq!(ctl.delete(&store, true), Ok(Outcome::Deleted { id }));
        assert_eq!(store.count::<Instructor>().expect("count"), 0);
    }
}

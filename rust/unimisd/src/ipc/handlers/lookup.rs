use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::lookup::{self, options_json, DropdownOption};
use crate::store::{SqliteStore, StoreResult};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let method = req.method.as_str();
    if !matches!(
        method,
        "lookup.faculties"
            | "lookup.departments"
            | "lookup.courses"
            | "lookup.departmentChoices"
            | "lookup.instructorChoices"
    ) {
        return None;
    }
    let Some(conn) = state.db.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let store = SqliteStore::new(conn);
    let param = |name: &str| req.params.get(name).and_then(|v| v.as_str());

    let options: StoreResult<Vec<DropdownOption>> = match method {
        "lookup.faculties" => lookup::faculty_options(&store),
        "lookup.departments" => {
            let sentinel = req
                .params
                .get("sentinel")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            lookup::department_options(&store, param("facultyId"), sentinel)
        }
        "lookup.courses" => lookup::course_options(&store, param("departmentId")),
        "lookup.departmentChoices" => lookup::department_choices(&store),
        _ => lookup::instructor_choices(&store),
    };

    Some(match options {
        Ok(options) => ok(&req.id, json!({ "options": options_json(&options) })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    })
}

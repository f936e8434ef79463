use std::path::PathBuf;

use anyhow::Context;
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use crate::form::{EntityForm, FormController, FormResult, Outcome};
use crate::ipc::error::{err, form_err, ok};
use crate::ipc::types::{AppState, Request, Screens};
use crate::lookup::OptionKey;
use crate::store::SqliteStore;

const ACTIONS: &[&str] = &[
    "get", "setField", "choose", "selectRow", "create", "update", "delete", "clear", "search",
    "export",
];

/// The open workspace and screen state, or the error reply when there is no
/// workspace or nobody is signed in.
pub fn session<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<(&'a Connection, &'a mut Screens), serde_json::Value> {
    let Some(conn) = state.db.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    if state.user.is_none() {
        return Err(err(&req.id, "not_authenticated", "please sign in first", None));
    }
    Ok((conn, &mut state.screens))
}

fn str_param<'r>(req: &'r Request, name: &str) -> Result<&'r str, serde_json::Value> {
    req.params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{name}"), None))
}

fn key_param(req: &Request) -> Result<OptionKey, serde_json::Value> {
    req.params
        .get("key")
        .and_then(OptionKey::from_json)
        .ok_or_else(|| err(&req.id, "bad_params", "params.key must be a string or null", None))
}

/// Result of one screen action before it is wrapped in a reply.
enum Reply {
    Screen,
    Done {
        outcome: &'static str,
        id: Option<String>,
        message: String,
    },
    Exported { path: String, rows: usize },
}

fn done<F: EntityForm>(outcome: Outcome) -> Reply {
    Reply::Done {
        outcome: outcome.kind(),
        id: outcome.id().map(str::to_string),
        message: outcome.message(F::LABEL),
    }
}

fn run_action<F: EntityForm>(
    ctl: &mut FormController<F>,
    store: &SqliteStore,
    req: &Request,
    action: &str,
) -> Result<FormResult<Reply>, serde_json::Value> {
    let res = match action {
        "get" => ctl.refresh(store).map(|_| Reply::Screen),
        "setField" => {
            let field = str_param(req, "field")?;
            let value = str_param(req, "value")?;
            ctl.set_field(field, value).map(|_| Reply::Screen)
        }
        "choose" => {
            let field = str_param(req, "field")?;
            let key = key_param(req)?;
            ctl.choose(store, field, key).map(|_| Reply::Screen)
        }
        "selectRow" => {
            let id = str_param(req, "id")?;
            ctl.select_row(store, id).map(|_| Reply::Screen)
        }
        "create" => ctl.create(store).map(done::<F>),
        "update" => ctl.update(store).map(done::<F>),
        "delete" => {
            let confirmed = req
                .params
                .get("confirmed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            ctl.delete(store, confirmed).map(done::<F>)
        }
        "clear" => ctl.clear(store).map(|_| Reply::Screen),
        "search" => {
            let text = req
                .params
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            ctl.search(store, text).map(|_| Reply::Screen)
        }
        "export" => {
            let out_path = PathBuf::from(str_param(req, "outPath")?);
            match ctl.export_csv() {
                Ok(csv) => {
                    if let Err(e) = std::fs::write(&out_path, csv)
                        .with_context(|| format!("failed to write {}", out_path.to_string_lossy()))
                    {
                        return Err(err(&req.id, "io_failed", format!("{e:?}"), None));
                    }
                    let rows = ctl.view().rows().len();
                    info!(entity = F::LABEL, rows, path = %out_path.to_string_lossy(), "exported");
                    Ok(Reply::Exported {
                        path: out_path.to_string_lossy().to_string(),
                        rows,
                    })
                }
                Err(e) => Err(e),
            }
        }
        _ => {
            return Err(err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            ))
        }
    };
    Ok(res)
}

fn reply<F: EntityForm>(
    ctl: &FormController<F>,
    req: &Request,
    res: FormResult<Reply>,
) -> serde_json::Value {
    let screen = ctl.snapshot();
    match res {
        Ok(Reply::Screen) => ok(&req.id, json!({ "screen": screen })),
        Ok(Reply::Done {
            outcome,
            id,
            message,
        }) => ok(
            &req.id,
            json!({ "outcome": outcome, "id": id, "message": message, "screen": screen }),
        ),
        Ok(Reply::Exported { path, rows }) => ok(
            &req.id,
            json!({ "path": path, "rowCount": rows, "screen": screen }),
        ),
        Err(e) => form_err(&req.id, &e, Some(json!({ "screen": screen }))),
    }
}

fn dispatch<F: EntityForm>(
    state: &mut AppState,
    req: &Request,
    action: &str,
    pick: impl FnOnce(&mut Screens) -> &mut FormController<F>,
) -> serde_json::Value {
    let (conn, screens) = match session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn);
    let ctl = pick(screens);
    match run_action(ctl, &store, req, action) {
        Ok(res) => reply(ctl, req, res),
        Err(resp) => resp,
    }
}

fn handle_find_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, screens) = match session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let code = match str_param(req, "code") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = SqliteStore::new(conn);
    let ctl = &mut screens.enrollments;
    let res = ctl.find_student(&store, code).map(|_| Reply::Screen);
    reply(ctl, req, res)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    if req.method == "enrollments.findStudent" {
        return Some(handle_find_student(state, req));
    }
    let (screen, action) = req.method.split_once('.')?;
    if !ACTIONS.contains(&action) {
        return None;
    }
    match screen {
        "students" => Some(dispatch(state, req, action, |s| &mut s.students)),
        "courses" => Some(dispatch(state, req, action, |s| &mut s.courses)),
        "instructors" => Some(dispatch(state, req, action, |s| &mut s.instructors)),
        "enrollments" => Some(dispatch(state, req, action, |s| &mut s.enrollments)),
        _ => None,
    }
}

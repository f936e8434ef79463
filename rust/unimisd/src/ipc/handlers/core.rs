use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{error, info};

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, Screens};
use crate::store::SqliteStore;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "user": state.user,
        }),
    )
}

/// Opens (or creates) the workspace database and re-initializes every screen.
/// The previous session is signed out.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    let mut screens = Screens::default();
    {
        let store = SqliteStore::new(&conn);
        screens.students.open(&store)?;
        screens.courses.open(&store)?;
        screens.instructors.open(&store)?;
        screens.enrollments.open(&store)?;
    }

    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.user = None;
    state.screens = screens;
    info!(workspace = %path.to_string_lossy(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            error!(error = ?e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}

use serde_json::json;
use tracing::info;

use crate::auth;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let username = req
        .params
        .get("username")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match auth::login(conn, username, password) {
        Ok(user) => {
            let result = json!({ "user": user });
            state.user = Some(user);
            ok(&req.id, result)
        }
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(user) = state.user.take() {
        info!(username = %user.username, "signed out");
    }
    ok(&req.id, json!({}))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        _ => None,
    }
}

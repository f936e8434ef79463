use serde_json::json;

use crate::dashboard;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::screens::session;
use crate::ipc::types::{AppState, Request};

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, _) = match session(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match dashboard::summary(conn) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(handle_summary(state, req)),
        _ => None,
    }
}

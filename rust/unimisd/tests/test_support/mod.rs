#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_env(env: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_unimisd");
        let mut cmd = Command::new(exe);
        cmd.env_remove("UNIMISD_WORKSPACE");
        for (k, v) in env {
            cmd.env(k, v);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn unimisd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    /// Full response envelope.
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// The `error` object of a call that must fail.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded",
            method
        );
        value.get("error").cloned().expect("error object")
    }

    pub fn select_workspace(&mut self, path: &Path) {
        self.request_ok(
            "workspace.select",
            json!({ "path": path.to_string_lossy() }),
        );
    }

    pub fn login_admin(&mut self) {
        self.request_ok(
            "auth.login",
            json!({ "username": "admin", "password": "admin" }),
        );
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A sidecar with a fresh workspace and the seeded admin signed in.
pub fn signed_in(prefix: &str) -> (Sidecar, PathBuf) {
    let workspace = temp_dir(prefix);
    let mut sidecar = Sidecar::spawn();
    sidecar.select_workspace(&workspace);
    sidecar.login_admin();
    (sidecar, workspace)
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

/// Key of the option labelled `label` in a `[{label, key}]` list.
pub fn option_key(options: &serde_json::Value, label: &str) -> String {
    options
        .as_array()
        .expect("options array")
        .iter()
        .find(|o| o.get("label").and_then(|v| v.as_str()) == Some(label))
        .and_then(|o| o.get("key"))
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("no option labelled {label}"))
        .to_string()
}

pub fn labels(options: &serde_json::Value) -> Vec<String> {
    options
        .as_array()
        .expect("options array")
        .iter()
        .filter_map(|o| o.get("label").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect()
}

/// `cells[column]` of every visible row of a screen snapshot.
pub fn column(screen: &serde_json::Value, column: usize) -> Vec<String> {
    screen
        .get("rows")
        .and_then(|v| v.as_array())
        .expect("rows")
        .iter()
        .filter_map(|r| r.get("cells").and_then(|c| c.get(column)))
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect()
}

pub fn row_id(screen: &serde_json::Value, index: usize) -> String {
    screen["rows"][index]["id"]
        .as_str()
        .expect("row id")
        .to_string()
}

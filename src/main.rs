mod config;
mod db;
mod export;
mod ipc;
mod metrics;
mod model;
mod portal;
mod reports;
mod repo;

use std::io::{self, BufRead, Write};

fn main() {
    config::init_tracing();
    let cfg = config::Config::from_env();

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(error = %format!("{e:#}"), "failed to open startup workspace");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "schoold ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                let span = tracing::info_span!("request", id = %req.id, method = %req.method);
                let _guard = span.enter();
                let resp = ipc::handle_request(&mut state, req);
                if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
                    tracing::debug!(code = %resp["error"]["code"], "request failed");
                }
                resp
            }
            // No id to echo back.
            Err(e) => ipc::bad_json(e.to_string()),
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

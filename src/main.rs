mod config;
mod db;
mod ingest;
mod ipc;
mod store;

use env_logger::Env;
use std::io::{self, BufRead, Write};

fn main() {
    // stdout carries the IPC protocol; env_logger writes to stderr.
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = match config::ServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    let mut state = ipc::AppState::new(config);
    if let Some(path) = state.config.workspace.clone() {
        match db::open_db(&path) {
            Ok(conn) => {
                log::info!("workspace opened at {}", path.to_string_lossy());
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => log::warn!("could not open configured workspace: {:#}", e),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                log::warn!("dropping malformed request: {}", e);
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        log::debug!("request {} {}", req.id, req.method);
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

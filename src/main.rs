mod attendance;
mod calc;
mod calendar;
mod config;
mod db;
mod discipline;
mod grades;
mod ipc;
mod logging;
mod model;
mod ranking;
mod report_card;
mod trend;

use std::io::{self, BufRead, Write};
use tracing::{info, warn};

fn main() {
    logging::init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "classsheetd started");

    let mut state = ipc::AppState::default();

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
                // Can't reply without id; answer anyway so the caller is not left waiting.
                warn!(error = %e, "bad json line");
                let _ = writeln!(stdout, "{}", ipc::bad_json(e.to_string()));
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const EVENT_LOG_FILE: &str = "events.log";

/// Append-only JSON-lines log of service operations. Logging must never
/// fail a request, so write errors are swallowed.
#[derive(Debug)]
pub struct EventLog {
    logs_dir: PathBuf,
    guard: Mutex<()>,
}

impl EventLog {
    pub fn new(logs_dir: impl AsRef<Path>) -> Self {
        Self {
            logs_dir: logs_dir.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub fn info(&self, operation: &str, message: &str) {
        self.append("info", operation, message);
    }

    pub fn error(&self, operation: &str, message: &str) {
        self.append("error", operation, message);
    }

    fn append(&self, level: &str, operation: &str, message: &str) {
        let Ok(_guard) = self.guard.lock() else {
            return;
        };
        let path = self.logs_dir.join(EVENT_LOG_FILE);
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "operation": operation,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

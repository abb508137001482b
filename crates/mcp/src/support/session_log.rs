#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Bounded, best-effort session record for debugging transport issues.
/// Written to the storage dir and never to stdout/stderr: stdout carries
/// the protocol and stderr may be swallowed by the host editor.
#[derive(Clone, Debug)]
pub(crate) struct SessionLog {
    path: PathBuf,
    start_rfc3339: String,
    pid: u32,
    args: Vec<String>,
    mode: Option<String>,
    first_line: Option<String>,
    last_method: Option<String>,
    last_error: Option<String>,
    exit: Option<String>,
}

impl SessionLog {
    pub(crate) fn new(storage_dir: &Path) -> Self {
        let this = Self {
            path: storage_dir.join("wbs_mcp_last_session.txt"),
            start_rfc3339: crate::ts_ms_to_rfc3339(crate::now_ms_i64()),
            pid: std::process::id(),
            args: std::env::args().collect(),
            mode: None,
            first_line: None,
            last_method: None,
            last_error: None,
            exit: None,
        };
        this.flush();
        this
    }

    pub(crate) fn note_mode(&mut self, mode: &str, first_line: &str) {
        self.mode = Some(mode.to_string());
        self.first_line = Some(truncate(first_line.trim_end(), 240));
        self.flush();
    }

    pub(crate) fn note_method(&mut self, method: &str) {
        let method = method.trim();
        if method.is_empty() {
            return;
        }
        self.last_method = Some(truncate(method, 96));
        self.flush();
    }

    pub(crate) fn note_error(&mut self, error: &str) {
        let error = error.trim();
        if error.is_empty() {
            return;
        }
        self.last_error = Some(truncate(error, 300));
        self.flush();
    }

    pub(crate) fn note_exit(&mut self, reason: &str) {
        self.exit = Some(truncate(reason.trim(), 120));
        self.flush();
    }

    fn flush(&self) {
        let Some(dir) = self.path.parent() else {
            return;
        };
        let _ = std::fs::create_dir_all(dir);

        let mut out = String::new();
        let _ = writeln!(out, "start={}", self.start_rfc3339);
        let _ = writeln!(out, "pid={}", self.pid);
        let _ = writeln!(out, "args={:?}", self.args);
        if let Some(mode) = &self.mode {
            let _ = writeln!(out, "mode={mode}");
        }
        if let Some(first_line) = &self.first_line {
            let _ = writeln!(out, "first_line={first_line}");
        }
        if let Some(method) = &self.last_method {
            let _ = writeln!(out, "last_method={method}");
        }
        if let Some(error) = &self.last_error {
            let _ = writeln!(out, "last_error={error}");
        }
        if let Some(exit) = &self.exit {
            let _ = writeln!(out, "exit={exit}");
        }

        let _ = std::fs::write(&self.path, out);
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}

#![forbid(unsafe_code)]

mod entry;
mod handlers;
mod server;
mod support;
mod tools;

pub(crate) use support::*;

use std::fmt::Write as _;
use wbs_storage::SqliteStore;
pub(crate) use wbs_storage::StoreError;

// Protocol negotiation: some MCP clients are strict about the server echoing
// a compatible protocol version. Keep this at the widely deployed baseline.
const MCP_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "wbs-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) struct McpServer {
    initialized: bool,
    store: SqliteStore,
    session_log: SessionLog,
}

fn usage() -> &'static str {
    "wbs_mcp — Work Breakdown Structure MCP server (stdio)\n\n\
USAGE:\n\
  wbs_mcp [--storage-dir DIR]\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V, --version    Print version and exit\n\
\n\
NOTES:\n\
  - Store location: --storage-dir, else $WBS_DATA_DIR, else ./.wbs\n\
  - Speaks newline-delimited JSON-RPC 2.0 on stdin/stdout\n"
}

fn version_line() -> String {
    format!("wbs_mcp {SERVER_VERSION}")
}

fn write_last_crash(storage_dir: &std::path::Path, detail: &str) {
    // Best-effort crash report for debugging transport issues without ever
    // writing to stdout/stderr (stdout carries the protocol).
    let _ = std::fs::create_dir_all(storage_dir);
    let path = storage_dir.join("wbs_mcp_last_crash.txt");

    let mut out = String::new();
    let _ = writeln!(out, "ts={}", ts_ms_to_rfc3339(now_ms_i64()));
    let _ = writeln!(out, "pid={}", std::process::id());
    let _ = writeln!(out, "version={SERVER_VERSION}");
    let _ = writeln!(out, "detail={detail}");

    let _ = std::fs::write(path, out);
}

fn install_crash_reporter(storage_dir: std::path::PathBuf) {
    std::panic::set_hook(Box::new(move |info| {
        write_last_crash(&storage_dir, &info.to_string());
    }));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().collect::<Vec<_>>();
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print!("{}", usage());
        return Ok(());
    }
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
    {
        println!("{}", version_line());
        return Ok(());
    }

    let storage_dir = parse_storage_dir();
    install_crash_reporter(storage_dir.clone());

    let mut session_log = SessionLog::new(&storage_dir);
    let store = match SqliteStore::open(&storage_dir) {
        Ok(store) => store,
        Err(err) => {
            session_log.note_error(&format!("store open failed: {err}"));
            session_log.note_exit("store_open_failed");
            return Err(Box::new(err));
        }
    };

    let mut server = McpServer::new(store, session_log);
    let result = entry::run_stdio(&mut server);
    match &result {
        Ok(()) => server.session_log.note_exit("eof"),
        Err(err) => {
            let detail = format!("transport: {err}");
            server.session_log.note_error(&detail);
            server.session_log.note_exit("transport_error");
        }
    }
    result
}

#![forbid(unsafe_code)]

//! Stdio client for the WBS MCP server. Spawns the server binary, performs
//! the initialize handshake, and lets callers pipeline tool calls: every
//! request gets a distinct id, responses are joined back through a
//! pending-request table, and entries abandoned by the inactivity timeout
//! make any late response unroutable.

mod pending;

pub use pending::{PendingRequests, Routed};

use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

const PROTOCOL_VERSION: &str = "2024-11-05";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ClientError {
    Io(std::io::Error),
    Protocol(String),
    /// The pending entry for this id outlived the inactivity window and was
    /// abandoned.
    TimedOut {
        id: i64,
    },
    /// The server answered with a tool-level failure envelope.
    Tool {
        code: String,
        message: String,
    },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Protocol(message) => write!(f, "protocol: {message}"),
            Self::TimedOut { id } => write!(f, "request {id} timed out"),
            Self::Tool { code, message } => write!(f, "tool failure [{code}]: {message}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

pub struct WbsClient {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: i64,
    pending: PendingRequests,
    ready: HashMap<i64, Value>,
}

impl WbsClient {
    pub fn spawn(server_bin: &str, storage_dir: &Path) -> Result<Self, ClientError> {
        Self::spawn_with_timeout(server_bin, storage_dir, DEFAULT_TIMEOUT)
    }

    pub fn spawn_with_timeout(
        server_bin: &str,
        storage_dir: &Path,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        std::fs::create_dir_all(storage_dir)?;

        let mut child = Command::new(server_bin)
            .arg("--storage-dir")
            .arg(storage_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Protocol("server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Protocol("server stdout unavailable".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
            pending: PendingRequests::new(timeout),
            ready: HashMap::new(),
        })
    }

    pub fn initialize(&mut self) -> Result<(), ClientError> {
        let id = self.send_request(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": "wbs_client", "version": env!("CARGO_PKG_VERSION") }
            }),
        )?;
        let _ = self.wait_for(id)?;
        self.send_notification("notifications/initialized", json!({}))?;
        Ok(())
    }

    /// Sends one request and returns its id without waiting. Callers may
    /// pipeline several of these and collect answers with `wait_for`.
    pub fn send_request(&mut self, method: &str, params: Value) -> Result<i64, ClientError> {
        let id = self.next_id;
        self.next_id += 1;
        let req = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        writeln!(self.stdin, "{req}")?;
        self.stdin.flush()?;
        self.pending.register(id, Instant::now());
        Ok(id)
    }

    pub fn send_notification(&mut self, method: &str, params: Value) -> Result<(), ClientError> {
        let req = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        writeln!(self.stdin, "{req}")?;
        self.stdin.flush()?;
        Ok(())
    }

    pub fn send_tool_call(&mut self, name: &str, arguments: Value) -> Result<i64, ClientError> {
        self.send_request("tools/call", json!({ "name": name, "arguments": arguments }))
    }

    /// Reads responses until the one for `id` arrives. Answers for other
    /// pipelined requests are parked for their own `wait_for`; frames that
    /// match nothing pending (late arrivals after expiry, duplicates) are
    /// dropped.
    pub fn wait_for(&mut self, id: i64) -> Result<Value, ClientError> {
        loop {
            if let Some(response) = self.ready.remove(&id) {
                return Ok(response);
            }
            let expired = self.pending.expire(Instant::now());
            if expired.contains(&id) {
                return Err(ClientError::TimedOut { id });
            }
            if !self.pending.is_pending(id) {
                return Err(ClientError::TimedOut { id });
            }

            let mut line = String::new();
            let read = self.stdout.read_line(&mut line)?;
            if read == 0 {
                return Err(ClientError::Protocol("server closed stdout".to_string()));
            }
            if line.trim().is_empty() {
                continue;
            }
            let response: Value = serde_json::from_str(&line)
                .map_err(|e| ClientError::Protocol(format!("bad response json: {e}")))?;

            match self.pending.route(&response) {
                Routed::Matched(matched) if matched == id => return Ok(response),
                Routed::Matched(other) => {
                    self.ready.insert(other, response);
                }
                Routed::Unroutable => continue,
            }
        }
    }

    /// Convenience wrapper: send one tool call, wait for its response, and
    /// unwrap the envelope down to the `result` payload.
    pub fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        let id = self.send_tool_call(name, arguments)?;
        let resp = self.wait_for(id)?;

        if let Some(error) = resp.get("error") {
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("rpc error");
            return Err(ClientError::Protocol(format!("{name} failed: {message}")));
        }

        let text = resp
            .get("result")
            .and_then(|v| v.get("content"))
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("text"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ClientError::Protocol(format!("{name} missing result.content[0].text"))
            })?;

        let envelope: Value = serde_json::from_str(text)
            .map_err(|e| ClientError::Protocol(format!("{name} returned non-JSON text: {e}")))?;

        if envelope.get("success").and_then(|v| v.as_bool()) != Some(true) {
            let code = envelope
                .get("error")
                .and_then(|v| v.get("code"))
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            let message = envelope
                .get("error")
                .and_then(|v| v.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("tool error")
                .to_string();
            return Err(ClientError::Tool { code, message });
        }

        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// True when a failure was a stale-version rejection: the caller should
/// re-read and retry rather than treat it as fatal.
pub fn is_version_conflict(err: &ClientError) -> bool {
    matches!(err, ClientError::Tool { code, .. } if code == "VERSION_CONFLICT")
}

impl Drop for WbsClient {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

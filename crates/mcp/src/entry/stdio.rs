#![forbid(unsafe_code)]

use super::framing::{
    TransportMode, detect_mode_from_first_line, read_content_length_frame,
    write_content_length_json, write_newline_json,
};
use crate::{JsonRpcRequest, McpServer, json_rpc_error};
use serde_json::Value;
use std::io::{BufRead, BufReader};

pub(crate) fn run_stdio(server: &mut McpServer) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let mut stdout = std::io::stdout().lock();

    // Framing is auto-detected once per process so responses never mix
    // styles on the same transport.
    let mut mode: Option<TransportMode> = None;

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }

        let effective_mode = match mode {
            Some(v) => v,
            None => {
                let Some(detected) = detect_mode_from_first_line(&line) else {
                    continue;
                };
                server.session_log.note_mode(
                    match detected {
                        TransportMode::NewlineJson => "newline_json",
                        TransportMode::ContentLength => "content_length",
                    },
                    &line,
                );
                mode = Some(detected);
                detected
            }
        };

        match effective_mode {
            TransportMode::NewlineJson => {
                let raw = line.trim();
                if raw.is_empty() {
                    continue;
                }
                handle_frame(server, &mut stdout, raw.as_bytes(), effective_mode)?;
            }
            TransportMode::ContentLength => {
                if line.trim().is_empty() {
                    continue;
                }
                let Some(body) = read_content_length_frame(&mut reader, line)? else {
                    break;
                };
                handle_frame(server, &mut stdout, &body, effective_mode)?;
            }
        }
    }

    Ok(())
}

fn write_response(
    stdout: &mut std::io::StdoutLock<'_>,
    resp: &Value,
    mode: TransportMode,
) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        TransportMode::NewlineJson => write_newline_json(stdout, resp),
        TransportMode::ContentLength => write_content_length_json(stdout, resp),
    }
}

fn handle_frame(
    server: &mut McpServer,
    stdout: &mut std::io::StdoutLock<'_>,
    body: &[u8],
    mode: TransportMode,
) -> Result<(), Box<dyn std::error::Error>> {
    // One malformed frame must never take the transport loop down: answer a
    // protocol error, record it, and keep reading.
    let data: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            server.session_log.note_error(&format!("parse error: {e}"));
            let resp = json_rpc_error(None, -32700, &format!("Parse error: {e}"));
            write_response(stdout, &resp, mode)?;
            return Ok(());
        }
    };

    let (id, has_method) = match data.as_object() {
        Some(obj) => (obj.get("id").cloned(), obj.contains_key("method")),
        None => {
            let resp = json_rpc_error(None, -32600, "Invalid Request");
            write_response(stdout, &resp, mode)?;
            return Ok(());
        }
    };
    if !has_method {
        let resp = json_rpc_error(id, -32600, "Invalid Request");
        write_response(stdout, &resp, mode)?;
        return Ok(());
    }

    let request: JsonRpcRequest = match serde_json::from_value(data) {
        Ok(v) => v,
        Err(e) => {
            let resp = json_rpc_error(id, -32600, &format!("Invalid Request: {e}"));
            write_response(stdout, &resp, mode)?;
            return Ok(());
        }
    };

    server.session_log.note_method(&request.method);
    if let Some(resp) = server.handle(request) {
        write_response(stdout, &resp, mode)?;
    }

    Ok(())
}

#![forbid(unsafe_code)]

use crate::{McpServer, SessionLog, StoreError};
use serde_json::{Value, json};
use wbs_storage::SqliteStore;

impl McpServer {
    pub(crate) fn new(store: SqliteStore, session_log: SessionLog) -> Self {
        Self {
            initialized: false,
            store,
            session_log,
        }
    }

    pub(crate) fn handle(&mut self, request: crate::JsonRpcRequest) -> Option<Value> {
        let method = request.method.as_str();

        if method == "initialize" {
            // Answering the handshake is enough to accept follow-up calls;
            // notifications/initialized is an acknowledgement, not a gate.
            self.initialized = true;
            return Some(crate::json_rpc_response(
                request.id,
                json!({
                    "protocolVersion": crate::MCP_VERSION,
                    "serverInfo": { "name": crate::SERVER_NAME, "version": crate::SERVER_VERSION },
                    "capabilities": { "tools": {} }
                }),
            ));
        }

        if !self.initialized && method != "notifications/initialized" {
            return Some(crate::json_rpc_error(
                request.id,
                -32002,
                "Server not initialized",
            ));
        }

        if method == "notifications/initialized" {
            self.initialized = true;
            return None;
        }

        if method == "ping" {
            return Some(crate::json_rpc_response(request.id, json!({})));
        }

        if method == "tools/list" {
            return Some(crate::json_rpc_response(
                request.id,
                json!({ "tools": crate::tools::tool_definitions() }),
            ));
        }

        if method == "tools/call" {
            let Some(params_obj) = request.params.as_ref().and_then(|v| v.as_object()) else {
                return Some(crate::json_rpc_error(
                    request.id,
                    -32602,
                    "params must be an object",
                ));
            };

            let tool_name = params_obj
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let args = params_obj
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));
            let response_body = self.call_tool(tool_name, args);

            return Some(crate::json_rpc_response(
                request.id,
                json!({
                    "content": [crate::tool_text_content(&response_body)],
                    "isError": !response_body.get("success").and_then(|v| v.as_bool()).unwrap_or(false)
                }),
            ));
        }

        Some(crate::json_rpc_error(
            request.id,
            -32601,
            &format!("Method not found: {method}"),
        ))
    }

    pub(crate) fn call_tool(&mut self, name: &str, args: Value) -> Value {
        match crate::tools::dispatch_tool(self, name, args) {
            Some(resp) => resp,
            None => crate::ai_error("UNKNOWN_TOOL", &format!("Unknown tool: {name}")),
        }
    }

    /// Store-error exit path shared by every handler: callers get the typed
    /// failure envelope; infrastructure detail stays in the session log.
    pub(crate) fn store_failure(&mut self, err: StoreError) -> Value {
        if matches!(err, StoreError::Io(_) | StoreError::Sql(_)) {
            self.session_log.note_error(&format!("store: {err}"));
        }
        crate::ai_error(crate::store_error_code(&err), &crate::format_store_error(&err))
    }
}

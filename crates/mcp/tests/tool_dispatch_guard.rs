#![forbid(unsafe_code)]

mod support;
use support::*;

use serde_json::json;

/// Every advertised tool must actually dispatch: calling it with empty
/// arguments may fail validation, but never with UNKNOWN_TOOL.
#[test]
fn every_advertised_tool_dispatches() {
    let mut server = Server::start_initialized("dispatch_guard");

    let tools_list = server.request(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/list",
        "params": {}
    }));
    let names: Vec<String> = tools_list
        .get("result")
        .and_then(|v| v.get("tools"))
        .and_then(|v| v.as_array())
        .expect("result.tools")
        .iter()
        .filter_map(|tool| {
            tool.get("name")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .collect();
    assert!(!names.is_empty());

    for name in names {
        let envelope = server.call_tool(&name, json!({}));
        assert_ne!(
            envelope_error_code(&envelope),
            Some("UNKNOWN_TOOL"),
            "{name} is advertised but does not dispatch"
        );
    }
}

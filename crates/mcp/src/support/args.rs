#![forbid(unsafe_code)]

use super::ai::ai_error;
use serde_json::Value;
use wbs_core::model::TaskStatus;

pub(crate) fn require_string(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<String, Value> {
    let Some(v) = args.get(key).and_then(|v| v.as_str()) else {
        return Err(ai_error("INVALID_INPUT", &format!("{key} is required")));
    };
    Ok(v.to_string())
}

pub(crate) fn optional_string(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<String>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::String(v) => Ok(Some(v.to_string())),
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be a string"),
        )),
    }
}

/// Three-state extraction for nullable columns: absent → unchanged,
/// explicit null → clear, string → set.
pub(crate) fn optional_nullable_string(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<Option<String>>, Value> {
    if !args.contains_key(key) {
        return Ok(None);
    }
    match args.get(key) {
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(v)) => Ok(Some(Some(v.to_string()))),
        Some(_) => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be a string or null"),
        )),
        None => Ok(None),
    }
}

pub(crate) fn optional_i64(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<i64>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ai_error("INVALID_INPUT", &format!("{key} must be an integer"))),
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be an integer"),
        )),
    }
}

pub(crate) fn optional_string_list(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, Value> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Some(v) = item.as_str() else {
                    return Err(ai_error(
                        "INVALID_INPUT",
                        &format!("{key} must be an array of strings"),
                    ));
                };
                out.push(v.to_string());
            }
            Ok(Some(out))
        }
        _ => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be an array of strings"),
        )),
    }
}

pub(crate) fn optional_status(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<TaskStatus>, Value> {
    let Some(raw) = optional_string(args, key)? else {
        return Ok(None);
    };
    match TaskStatus::parse(&raw) {
        Some(status) => Ok(Some(status)),
        None => Err(ai_error(
            "INVALID_INPUT",
            &format!("{key} must be one of: pending|in-progress|completed|blocked"),
        )),
    }
}

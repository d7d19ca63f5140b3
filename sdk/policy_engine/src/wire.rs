// Helpers for reading loosely typed values out of service responses.
//
// The service is inconsistent about scalar encodings: ids arrive as numbers
// or numeric strings, flags as 0/1, booleans or "SET_TRUE".

use serde_json::Value;

/// Reads an unsigned id that may be encoded as a number or a numeric string.
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a signed integer that may be encoded as a number or a numeric string.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a flag. Missing or unrecognised values are `false`.
pub fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("set_true") || s == "1"
        }
        _ => false,
    }
}

/// Converts a bool into the 0/1 encoding used throughout the copy document.
pub fn bit(enabled: bool) -> i64 {
    i64::from(enabled)
}

/// Reads an optional 0/1 field.
pub fn is_set(value: Option<i64>) -> bool {
    value.map(|v| v != 0).unwrap_or(false)
}

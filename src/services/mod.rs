pub mod account;
pub mod dashboard;
pub mod financial;

use serde_json::Value;

/// Unwraps the `{ "data": ... }` envelope most endpoints use. A missing or
/// null `data` means the body itself is the payload.
pub(crate) fn payload(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if !data.is_null() => data,
        _ => body,
    }
}

/// Lenient string read: numbers and booleans are stringified, anything else
/// missing becomes empty.
pub(crate) fn read_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub(crate) fn read_opt_string(value: Option<&Value>) -> Option<String> {
    let s = read_string(value);
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Lenient number read: numeric strings are parsed, anything unusable is 0.
pub(crate) fn read_number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

pub(crate) fn read_array(value: Option<&Value>) -> &[Value] {
    value
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

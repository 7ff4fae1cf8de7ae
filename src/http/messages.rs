use crate::error::ApiError;
use crate::session::TokenPair;
use serde_json::Value;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Operation succeeded";
pub const DEFAULT_ERROR_MESSAGE: &str = "Operation failed";

const ACCESS_TOKEN_PATHS: [&[&str]; 6] = [
    &["accessToken"],
    &["token"],
    &["data", "accessToken"],
    &["data", "token"],
    &["result", "accessToken"],
    &["result", "token"],
];

const REFRESH_TOKEN_PATHS: [&[&str]; 3] = [
    &["refreshToken"],
    &["data", "refreshToken"],
    &["result", "refreshToken"],
];

const SUCCESS_MESSAGE_PATHS: [&[&str]; 3] = [
    &["message"],
    &["result", "message"],
    &["data", "message"],
];

const ERROR_MESSAGE_PATHS: [&[&str]; 2] = [&["message"], &["error"]];

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Strings and numbers count as text; blanks, objects and nulls do not.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| lookup(value, path).and_then(as_text))
}

/// Pulls a token pair out of a login or refresh response, whatever envelope
/// the server chose.
pub fn extract_tokens(body: &Value) -> Option<TokenPair> {
    let access_token = first_text(body, &ACCESS_TOKEN_PATHS)?;
    Some(TokenPair {
        access_token,
        refresh_token: first_text(body, &REFRESH_TOKEN_PATHS),
    })
}

pub fn success_message(explicit: Option<&str>, body: &Value) -> String {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .or_else(|| first_text(body, &SUCCESS_MESSAGE_PATHS))
        .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string())
}

/// Server-provided message from an error body, if there is one.
pub fn server_message(body: &Value) -> Option<String> {
    first_text(body, &ERROR_MESSAGE_PATHS)
}

pub fn error_message(err: &ApiError) -> String {
    let message = match err {
        ApiError::Status { status, body } => server_message(body)
            .unwrap_or_else(|| format!("Request failed with status code {status}")),
        ApiError::Network(message) | ApiError::InvalidRequest(message) => message.trim().to_string(),
        ApiError::Cancelled => String::new(),
    };
    if message.is_empty() {
        DEFAULT_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

use serde_json::Value;
use thiserror::Error;

/// Failure of a single API call.
///
/// Recovered 401s never show up here; everything else is forwarded as the
/// transport reported it so callers can still branch on the status code.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("request failed with status {status}")]
    Status { status: u16, body: Value },
    #[error("network error: {0}")]
    Network(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set in environment")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("an access token is required for authentication")]
    Unauthenticated,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_is_exposed_only_for_http_failures() {
        let err = ApiError::Status {
            status: 401,
            body: json!({ "message": "expired" }),
        };
        assert_eq!(err.status(), Some(401));
        assert!(err.is_unauthorized());
        assert_eq!(err.body().and_then(|b| b.get("message")), Some(&json!("expired")));

        assert_eq!(ApiError::Network("reset".into()).status(), None);
        assert!(ApiError::Cancelled.is_cancelled());
    }
}

use crate::cancel::CancelToken;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// Suppresses both the success and the error toast for a request (`1`/`true`).
pub const HEADER_SUPPRESS_TOAST: &str = "x-suppress-toast";
/// Suppresses only the error toast (`1`/`true`).
pub const HEADER_SUPPRESS_ERROR_TOAST: &str = "x-suppress-error-toast";
/// Overrides the success toast text.
pub const HEADER_SUCCESS_MESSAGE: &str = "x-success-message";

pub const REFRESH_TOKEN_PATH: &str = "/users/refresh-token";

/// Descriptor of one API call. Built per call and never shared between
/// logically distinct requests.
#[derive(Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) cancel: Option<CancelToken>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) authorized: bool,
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            cancel: None,
            timeout: None,
            authorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Sets a header, replacing any earlier value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn cancel_with(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    #[must_use]
    pub fn with_cancel(self, token: Option<&CancelToken>) -> Self {
        match token {
            Some(token) => self.cancel_with(token),
            None => self,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends the request without a bearer token and without 401 recovery.
    #[must_use]
    pub fn without_auth(mut self) -> Self {
        self.authorized = false;
        self
    }

    #[must_use]
    pub fn suppress_toasts(self) -> Self {
        self.header(HEADER_SUPPRESS_TOAST, "1")
    }

    #[must_use]
    pub fn suppress_error_toast(self) -> Self {
        self.header(HEADER_SUPPRESS_ERROR_TOAST, "1")
    }

    #[must_use]
    pub fn success_message(self, message: impl Into<String>) -> Self {
        self.header(HEADER_SUCCESS_MESSAGE, message)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    pub fn is_refresh_call(&self) -> bool {
        self.path.contains(REFRESH_TOKEN_PATH)
    }

    pub fn toasts_suppressed(&self) -> bool {
        self.header_value(HEADER_SUPPRESS_TOAST).is_some_and(is_truthy)
    }

    pub fn error_toast_suppressed(&self) -> bool {
        self.toasts_suppressed()
            || self
                .header_value(HEADER_SUPPRESS_ERROR_TOAST)
                .is_some_and(is_truthy)
    }

    /// Absolute URL for this request against `base_url`. Paths that are
    /// already absolute URLs are used as-is.
    pub fn url(&self, base_url: &str) -> String {
        let mut url = if self.path.starts_with("http://") || self.path.starts_with("https://") {
            self.path.clone()
        } else if self.path.starts_with('/') {
            format!("{}{}", base_url.trim_end_matches('/'), self.path)
        } else {
            format!("{}/{}", base_url.trim_end_matches('/'), self.path)
        };

        if !self.query.is_empty() {
            let encoded = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encoded);
        }
        url
    }
}

/// Per-call retry state. Lives for one `ApiClient::send` and is dropped with it.
pub(crate) struct RequestContext {
    pub(crate) request: ApiRequest,
    pub(crate) retried: bool,
    pub(crate) bearer_override: Option<String>,
}

impl RequestContext {
    pub(crate) fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
            bearer_override: None,
        }
    }
}

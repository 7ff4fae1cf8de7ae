use crate::error::ApiError;
use crate::redact::redact_secrets;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully resolved request, ready for the wire.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body. Non-JSON text is kept as a JSON string and an empty
    /// body is `null`.
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub(crate) fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// The network seam under `ApiClient`. Non-2xx statuses are returned as
/// responses; only failures to get a response at all are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, ApiError>;
}

pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Cookie store is always on so session cookies travel alongside the
    /// bearer token.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(CONNECT_TIMEOUT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

fn network_error(err: reqwest::Error) -> ApiError {
    ApiError::Network(redact_secrets(&err.to_string()).into_owned())
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .http
            .request(request.method, request.url.as_str())
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let res = builder.send().await.map_err(network_error)?;
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.map_err(network_error)?;

        Ok(ApiResponse {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use std::sync::{Arc, Mutex};

    type Handler = dyn Fn(&OutgoingRequest) -> Result<ApiResponse, ApiError> + Send + Sync;

    /// Answers requests from a closure and records everything it was sent.
    #[derive(Clone)]
    pub(crate) struct ScriptedTransport {
        handler: Arc<Handler>,
        delay: Option<Duration>,
        sent: Arc<Mutex<Vec<OutgoingRequest>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(
            handler: impl Fn(&OutgoingRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Arc::new(handler),
                delay: None,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn sent(&self) -> Vec<OutgoingRequest> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn sent_to(&self, path: &str) -> Vec<OutgoingRequest> {
            self.sent()
                .into_iter()
                .filter(|r| path_of(r) == path)
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, ApiError> {
            self.sent.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.handler)(&request)
        }
    }

    pub(crate) fn respond(status: u16, body: Value) -> Result<ApiResponse, ApiError> {
        Ok(ApiResponse {
            status,
            headers: HeaderMap::new(),
            body,
        })
    }

    pub(crate) fn path_of(request: &OutgoingRequest) -> &str {
        let without_scheme = request
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&request.url);
        let path = without_scheme
            .find('/')
            .map(|i| &without_scheme[i..])
            .unwrap_or("/");
        path.split('?').next().unwrap_or(path)
    }

    pub(crate) fn bearer_of(request: &OutgoingRequest) -> Option<String> {
        request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }
}

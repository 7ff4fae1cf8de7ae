use super::messages::{error_message, extract_tokens, success_message};
use super::request::{ApiRequest, RequestContext, HEADER_SUCCESS_MESSAGE, REFRESH_TOKEN_PATH};
use super::transport::{ApiResponse, OutgoingRequest, ReqwestTransport, Transport};
use crate::config::Config;
use crate::error::ApiError;
use crate::notify::{Notifier, Toast};
use crate::redact::redact_secrets;
use crate::session::{SessionStore, TokenPair};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// HTTP client for the financial API.
///
/// Every request gets the stored bearer token. A 401 triggers one token
/// refresh and one resubmission per call; whatever happens after that is
/// returned to the caller as-is. Mutations and failures are reported to the
/// notifier unless the request opts out.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        session: SessionStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                transport,
                session,
                notifier,
            }),
        }
    }

    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self, reqwest::Error> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        let session = SessionStore::new(config.session_backend.open());
        Ok(Self::new(
            config.api_base_url.clone(),
            Arc::new(transport),
            session,
            notifier,
        ))
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn notify(&self, toast: Toast) {
        self.inner.notifier.notify(toast);
    }

    /// Sends `request`, recovering from one expired access token.
    ///
    /// A cancelled request resolves as [`ApiError::Cancelled`] and never
    /// produces a toast.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let cancel = request.cancel.clone();
        let mut ctx = RequestContext::new(request);

        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ApiError::Cancelled),
                    result = self.run(&mut ctx) => result,
                }
            }
            None => self.run(&mut ctx).await,
        };

        if result.as_ref().is_err_and(ApiError::is_cancelled) {
            debug!(
                method = %ctx.request.method,
                path = %ctx.request.path,
                "request cancelled"
            );
        }
        self.report(&ctx.request, &result);
        result
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<ApiResponse, ApiError> {
        loop {
            match self.dispatch(ctx).await {
                Err(err) if self.should_recover(ctx, &err) => {
                    ctx.retried = true;
                    match self.refresh_detached().await {
                        Some(tokens) => {
                            debug!(path = %ctx.request.path, "retrying with refreshed access token");
                            ctx.bearer_override = Some(tokens.access_token);
                        }
                        None => return Err(err),
                    }
                }
                outcome => return outcome,
            }
        }
    }

    fn should_recover(&self, ctx: &RequestContext, err: &ApiError) -> bool {
        err.is_unauthorized()
            && !ctx.retried
            && ctx.request.authorized
            && !ctx.request.is_refresh_call()
    }

    /// Runs the refresh on its own task. Cancelling the caller only stops the
    /// wait; the server rotates the pair either way, so the new tokens must
    /// still land in the session.
    async fn refresh_detached(&self) -> Option<TokenPair> {
        let client = self.clone();
        match tokio::spawn(async move { client.refresh_tokens().await }).await {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(error = %err, "token refresh task failed");
                None
            }
        }
    }

    /// Calls the refresh endpoint and persists whatever tokens it returns.
    ///
    /// Returns `None` when the call fails or the response carries no access
    /// token. Never recovers or notifies on its own.
    pub async fn refresh_tokens(&self) -> Option<TokenPair> {
        let body = match self.inner.session.access_token() {
            Some(token) => json!({ "accessToken": token }),
            None => json!({}),
        };
        let ctx = RequestContext::new(ApiRequest::post(REFRESH_TOKEN_PATH).json(body));

        match self.dispatch(&ctx).await {
            Ok(response) => match extract_tokens(&response.body) {
                Some(tokens) => {
                    self.inner.session.store_tokens(&tokens);
                    info!(
                        rotated_refresh_token = tokens.refresh_token.is_some(),
                        "access token refreshed"
                    );
                    Some(tokens)
                }
                None => {
                    warn!("token refresh response carried no access token");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                None
            }
        }
    }

    async fn dispatch(&self, ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
        let outgoing = self.build(ctx)?;
        debug!(method = %outgoing.method, url = %outgoing.url, "sending request");

        let response = self.inner.transport.send(outgoing).await?;
        if response.is_success() {
            return Ok(response);
        }

        debug!(
            status = response.status,
            path = %ctx.request.path,
            body = %redact_secrets(&response.body.to_string()),
            "request failed"
        );
        Err(ApiError::Status {
            status: response.status,
            body: response.body,
        })
    }

    fn build(&self, ctx: &RequestContext) -> Result<OutgoingRequest, ApiError> {
        let request = &ctx.request;
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::InvalidRequest(format!("invalid header name ({name}): {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ApiError::InvalidRequest(format!("invalid header value for {name}: {e}"))
            })?;
            headers.insert(name, value);
        }

        if request.authorized {
            let token = ctx
                .bearer_override
                .clone()
                .or_else(|| self.inner.session.access_token());
            if let Some(token) = token {
                let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    ApiError::InvalidRequest("stored access token is not a valid header value".into())
                })?;
                headers.insert(AUTHORIZATION, value);
            }
        }

        Ok(OutgoingRequest {
            method: request.method.clone(),
            url: request.url(&self.inner.base_url),
            headers,
            body: request.body.clone(),
            timeout: request.timeout,
        })
    }

    fn report(&self, request: &ApiRequest, result: &Result<ApiResponse, ApiError>) {
        if request.is_refresh_call() {
            return;
        }

        match result {
            Ok(response) => {
                if request.is_mutating() && !request.toasts_suppressed() {
                    let explicit = request.header_value(HEADER_SUCCESS_MESSAGE);
                    self.notify(Toast::success(success_message(explicit, &response.body)));
                }
            }
            Err(ApiError::Cancelled) => {}
            Err(err) => {
                if request.error_toast_suppressed() {
                    return;
                }
                let has_error_status = err.status().is_some_and(|s| s >= 400);
                let is_network = matches!(err, ApiError::Network(_));
                if request.is_mutating() || has_error_status || is_network {
                    self.notify(Toast::error(error_message(err)));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::http::transport::testing::ScriptedTransport;
    use crate::notify::testing::RecordingNotifier;
    use crate::storage::MemoryStorage;

    pub(crate) const BASE_URL: &str = "https://api.test";

    pub(crate) fn client_with(transport: &ScriptedTransport) -> (ApiClient, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let client = ApiClient::new(
            BASE_URL,
            Arc::new(transport.clone()),
            SessionStore::new(Arc::new(MemoryStorage::new())),
            Arc::new(notifier.clone()),
        );
        (client, notifier)
    }
}

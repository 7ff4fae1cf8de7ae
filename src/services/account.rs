//! Sign-in, sign-up, sign-out and the profile bootstrap.
//!
//! Login and register bypass the bearer/refresh machinery (there is no
//! session yet) and report their own outcome, so the client's generic toasts
//! are suppressed for them.

use super::read_opt_string;
use crate::error::ApiError;
use crate::http::messages::{extract_tokens, server_message};
use crate::http::{ApiClient, ApiRequest};
use crate::notify::Toast;
use crate::session::TokenPair;
use crate::types::UserProfile;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/users/login";
pub const REGISTER_PATH: &str = "/users/register";
pub const LOGOUT_PATH: &str = "/users/logout";
pub const PROFILE_PATH: &str = "/users/profile";

const LOGIN_TIMEOUT: Duration = Duration::from_secs(15);

const MSG_SIGNED_IN: &str = "Signed in successfully";
const MSG_SIGN_IN_FAILED: &str = "Invalid email or password";
const MSG_REGISTERED: &str = "Account created successfully!";
const MSG_REGISTER_FAILED: &str = "Registration failed. Please try again.";
const MSG_LOGGED_OUT: &str = "Logged out";

fn failure_text(err: &ApiError, fallback: &str) -> String {
    err.body()
        .and_then(server_message)
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_profile(body: &Value) -> UserProfile {
    let root = match body {
        Value::Object(map) if map.contains_key("data") => &map["data"],
        _ => body,
    };
    UserProfile {
        id: read_opt_string(root.get("id")),
        full_name: read_opt_string(root.get("fullName")),
        email: read_opt_string(root.get("email")),
        role: read_opt_string(root.get("role")),
    }
}

#[derive(Clone)]
pub struct AccountService {
    api: ApiClient,
}

impl AccountService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Signs in and stores the returned session. Returns the stored pair,
    /// which is `None` when the server relies on its session cookie alone.
    ///
    /// Right after a successful login the refresh endpoint is called once
    /// with the new access token so the server can rotate it; any fresher
    /// pair it returns replaces the login pair.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TokenPair>, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .json(json!({ "email": email.trim(), "password": password }))
            .timeout(LOGIN_TIMEOUT)
            .without_auth()
            .suppress_toasts();

        let response = match self.api.send(request).await {
            Ok(response) if response.status == 200 => response,
            Ok(response) => {
                debug!(status = response.status, "unexpected login status; not signing in");
                return Ok(None);
            }
            Err(err) => {
                if !err.is_cancelled() {
                    self.api.notify(Toast::error(failure_text(&err, MSG_SIGN_IN_FAILED)));
                }
                return Err(err);
            }
        };

        let tokens = extract_tokens(&response.body);
        match &tokens {
            Some(tokens) => self.api.session().store_tokens(tokens),
            None => warn!("login response carried no access token; relying on session cookie"),
        }

        if self.api.refresh_tokens().await.is_none() {
            debug!("post-login refresh returned no tokens; keeping login session");
        }

        info!(email = %email.trim(), "signed in");
        self.api.notify(Toast::success(MSG_SIGNED_IN));
        Ok(self.api.session().tokens())
    }

    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post(REGISTER_PATH)
            .json(json!({
                "fullName": full_name.trim(),
                "email": email.trim(),
                "password": password,
            }))
            .without_auth()
            .suppress_toasts();

        match self.api.send(request).await {
            Ok(response) if matches!(response.status, 200 | 201) => {
                info!(email = %email.trim(), "account created");
                self.api.notify(Toast::success(MSG_REGISTERED));
                Ok(())
            }
            Ok(response) => {
                debug!(status = response.status, "unexpected register status");
                Ok(())
            }
            Err(err) => {
                if !err.is_cancelled() {
                    self.api.notify(Toast::error(failure_text(&err, MSG_REGISTER_FAILED)));
                }
                Err(err)
            }
        }
    }

    /// Clears the local session immediately. The server-side logout runs in
    /// the background and its outcome is ignored; the handle only lets a
    /// short-lived process wait for it before exiting.
    pub fn logout(&self) -> JoinHandle<()> {
        let api = self.api.clone();
        let request = ApiRequest::post(LOGOUT_PATH).without_auth().suppress_toasts();
        let server_logout = tokio::spawn(async move {
            if let Err(err) = api.send(request).await {
                debug!(error = %err, "server logout failed");
            }
        });

        self.api.notify(Toast::success(MSG_LOGGED_OUT));
        self.api.session().clear();
        info!("signed out");
        server_logout
    }

    /// Loads the signed-in user's profile and caches the display name.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let response = self.api.send(ApiRequest::get(PROFILE_PATH)).await?;
        let profile = parse_profile(&response.body);
        if let Some(full_name) = profile.full_name.as_deref() {
            self.api.session().set_full_name(full_name);
        }
        Ok(profile)
    }

    /// Display name for the top bar: cached value first, then the profile.
    pub async fn display_name(&self) -> Option<String> {
        if let Some(name) = self.api.session().full_name() {
            return Some(name);
        }
        self.fetch_profile().await.ok()?.full_name
    }
}

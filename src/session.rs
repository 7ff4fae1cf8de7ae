//! The one place that reads or writes the persisted session.
//!
//! Login and refresh store tokens, profile bootstrap caches the display name,
//! logout clears everything. Nothing else in the crate touches the storage
//! keys directly.

use crate::storage::Storage;
use std::sync::Arc;
use tracing::warn;

pub const KEY_ACCESS_TOKEN: &str = "accessToken";
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";
pub const KEY_FULL_NAME: &str = "fullName";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => normalize(value),
            Err(e) => {
                warn!(key, error = %e, "session storage read failed");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        if let Err(e) = self.storage.set(key, value) {
            warn!(key, error = %e, "session storage write failed");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key, error = %e, "session storage delete failed");
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(KEY_ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(KEY_REFRESH_TOKEN)
    }

    pub fn full_name(&self) -> Option<String> {
        self.read(KEY_FULL_NAME)
    }

    pub fn has_session(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        Some(TokenPair {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token(),
        })
    }

    /// Stores the access token and, when present, the refresh token. An
    /// absent refresh token leaves the previously stored one in place.
    pub fn store_tokens(&self, tokens: &TokenPair) {
        self.write(KEY_ACCESS_TOKEN, &tokens.access_token);
        if let Some(refresh) = tokens.refresh_token.as_deref() {
            self.write(KEY_REFRESH_TOKEN, refresh);
        }
    }

    pub fn set_full_name(&self, full_name: &str) {
        self.write(KEY_FULL_NAME, full_name);
    }

    pub fn clear(&self) {
        self.delete(KEY_ACCESS_TOKEN);
        self.delete(KEY_REFRESH_TOKEN);
        self.delete(KEY_FULL_NAME);
    }
}

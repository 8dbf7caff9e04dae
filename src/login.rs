use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::{
    auth::{JwtUserSecurity, SESSION_COOKIE},
    error::DispatchError,
    handlers::{ActionHandler, Invocation},
    models::{AuthLevel, DataMap, UserInfo},
};

/// Binding set on the login page after a rejected attempt.
pub const LOGIN_ERROR_KEY: &str = "login_error";

/// CredentialStore Contract
///
/// Verifies a username/password pair and returns the matching identity. Where users
/// live (directory, database, config) is up to the implementation.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Option<UserInfo>;
}

/// CredentialState
///
/// The shared handle used to pass the credential store around the application.
pub type CredentialState = Arc<dyn CredentialStore>;

struct Account {
    user: UserInfo,
    password_hash: String,
}

/// StaticCredentials
///
/// A fixed set of accounts holding Argon2 PHC password hashes.
#[derive(Default)]
pub struct StaticCredentials {
    accounts: HashMap<String, Account>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserInfo, password_hash: impl Into<String>) -> Self {
        self.accounts.insert(
            user.username.clone(),
            Account {
                user,
                password_hash: password_hash.into(),
            },
        );
        self
    }

    /// parse
    ///
    /// Reads `name:level:phc-hash` entries separated by `;`, e.g.
    /// `alice:1:$argon2id$v=19$...`. Blank entries are ignored.
    pub fn parse(accounts: &str) -> Result<Self, String> {
        let mut store = Self::new();
        for entry in accounts.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let mut fields = entry.splitn(3, ':');
            let (Some(name), Some(level), Some(hash)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(format!("malformed account entry '{}'", entry));
            };
            let level: i32 = level
                .parse()
                .map_err(|_| format!("invalid level for account '{}'", name))?;
            PasswordHash::new(hash)
                .map_err(|e| format!("invalid password hash for account '{}': {}", name, e))?;
            store = store.with_user(UserInfo::new(name, AuthLevel::from_i32(level)), hash);
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn verify(&self, username: &str, password: &str) -> Option<UserInfo> {
        let account = self.accounts.get(username)?;
        let hash = PasswordHash::new(&account.password_hash).ok()?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .ok()?;
        Some(account.user.clone())
    }
}

/// LoginHandler
///
/// Receives the login form, POSTed to the login template route. On success it sets
/// the `session` cookie and redirects to `success_url`; on failure it renders the
/// login page again with a 401 and a `login_error` binding.
pub struct LoginHandler {
    security: Arc<JwtUserSecurity>,
    credentials: CredentialState,
    ttl_secs: usize,
    success_url: String,
}

impl LoginHandler {
    pub fn new(
        security: Arc<JwtUserSecurity>,
        credentials: CredentialState,
        ttl_secs: usize,
        success_url: &str,
    ) -> Self {
        Self {
            security,
            credentials,
            ttl_secs,
            success_url: success_url.to_string(),
        }
    }

    fn rejected(&self, call: Invocation<'_>) -> Result<Response, DispatchError> {
        let template = call
            .key
            .ok_or_else(|| DispatchError::Internal("login form posted without a template".into()))?;

        let mut extra = DataMap::new();
        extra.insert(
            LOGIN_ERROR_KEY.to_string(),
            Value::from("Invalid username or password."),
        );

        let mut response = call
            .app
            .serve_template(call.user, call.request, template, Some(&extra))?;
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        Ok(response)
    }
}

#[async_trait]
impl ActionHandler for LoginHandler {
    async fn handle(&self, call: Invocation<'_>) -> Result<Response, DispatchError> {
        let username = call.request.param("username").unwrap_or_default();
        let password = call.request.param("password").unwrap_or_default();

        let user = match self.credentials.verify(username, password).await {
            Some(user) => user,
            None => {
                warn!(%username, "login rejected");
                return self.rejected(call);
            }
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as usize)
            .unwrap_or_default();
        let token = self
            .security
            .issue_token(&user, now, self.ttl_secs)
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        info!(username = %user.username, level = user.level.role_name(), "login accepted");

        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE, token, self.ttl_secs
        );
        Ok((
            [(header::SET_COOKIE, cookie)],
            Redirect::to(&self.success_url),
        )
            .into_response())
    }
}

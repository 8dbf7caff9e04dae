use async_trait::async_trait;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::{
    dispatch::TEMPLATE_PARAM,
    models::{ActionRequest, AuthLevel, UserInfo},
    render::normalize_template_name,
};

/// Resolution
///
/// Outcome of resolving the caller. `Redirected` means the security layer has already
/// produced the full response (typically a redirect to a login page) and the dispatcher
/// must do nothing further.
#[derive(Debug)]
pub enum Resolution {
    Identified(UserInfo),
    Redirected(Response),
}

/// UserSecurity Contract
///
/// The pluggable authentication layer consumed by the dispatcher. How users are stored
/// and verified is entirely up to the implementation.
///
/// Implementations should:
/// - resolve their own login template requests to an identity with `AuthLevel::Invalid`,
/// - answer every other unauthenticated request with `Resolution::Redirected`,
/// - produce a security response when a resource exceeds the caller's level.
#[async_trait]
pub trait UserSecurity: Send + Sync {
    async fn resolve_identity(&self, request: &ActionRequest) -> Resolution;

    /// Response sent instead of a resource when `actual` is below `required`.
    fn security_redirect(&self, required: AuthLevel, actual: AuthLevel) -> Response;
}

/// SecurityState
///
/// The shared handle used to pass the security layer around the application.
pub type SecurityState = Arc<dyn UserSecurity>;

// --- Fixed Identity ---

/// StaticUserSecurity
///
/// Resolves every request to the same identity. Useful for demos, kiosks and tests
/// where a user is always considered logged in.
#[derive(Debug, Clone)]
pub struct StaticUserSecurity {
    user: UserInfo,
}

impl StaticUserSecurity {
    pub fn new(user: UserInfo) -> Self {
        Self { user }
    }
}

#[async_trait]
impl UserSecurity for StaticUserSecurity {
    async fn resolve_identity(&self, _request: &ActionRequest) -> Resolution {
        Resolution::Identified(self.user.clone())
    }

    fn security_redirect(&self, required: AuthLevel, actual: AuthLevel) -> Response {
        security_page(required, actual)
    }
}

// --- Token Identity ---

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Claims
///
/// Payload of the session token issued after a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the username.
    pub sub: String,
    /// Raw authorization rank, see `AuthLevel::from_i32`.
    pub level: i32,
    /// Application reference id.
    #[serde(default)]
    pub uid: i32,
    pub exp: usize,
    pub iat: usize,
}

/// JwtUserSecurity
///
/// Resolves the caller from a signed session token, read from the `Authorization: Bearer`
/// header or from the `session` cookie.
///
/// Requests without a valid token are redirected to `login_url`, except requests for
/// the login template itself which resolve to an `Invalid` identity so the login form can
/// be rendered.
#[derive(Clone)]
pub struct JwtUserSecurity {
    secret: String,
    login_template: String,
    login_url: String,
}

impl JwtUserSecurity {
    pub fn new(secret: &str, login_template: &str, login_url: &str) -> Self {
        Self {
            secret: secret.to_string(),
            login_template: normalize_template_name(login_template),
            login_url: login_url.to_string(),
        }
    }

    /// issue_token
    ///
    /// Signs a session token for `user`, valid for `ttl_secs` seconds from `now_secs`.
    /// Login handlers call this after verifying credentials.
    pub fn issue_token(
        &self,
        user: &UserInfo,
        now_secs: usize,
        ttl_secs: usize,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user.username.clone(),
            level: user.level.as_i32(),
            uid: user.reference_uid,
            exp: now_secs + ttl_secs,
            iat: now_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    fn token_from(request: &ActionRequest) -> Option<&str> {
        request
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .or_else(|| request.cookie(SESSION_COOKIE))
    }

    fn decode_user(&self, token: &str) -> Option<UserInfo> {
        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Some(
                UserInfo::new(data.claims.sub, AuthLevel::from_i32(data.claims.level))
                    .with_reference_uid(data.claims.uid),
            ),
            Err(e) => {
                debug!(error = %e, "session token rejected");
                None
            }
        }
    }

    fn is_login_request(&self, request: &ActionRequest) -> bool {
        request
            .param(TEMPLATE_PARAM)
            .map(normalize_template_name)
            .is_some_and(|name| name == self.login_template)
    }
}

#[async_trait]
impl UserSecurity for JwtUserSecurity {
    async fn resolve_identity(&self, request: &ActionRequest) -> Resolution {
        if let Some(user) = Self::token_from(request).and_then(|token| self.decode_user(token)) {
            return Resolution::Identified(user);
        }

        if self.is_login_request(request) {
            return Resolution::Identified(UserInfo::new("", AuthLevel::Invalid));
        }

        debug!(uri = %request.uri, "no session, redirecting to login");
        Resolution::Redirected(Redirect::to(&self.login_url).into_response())
    }

    fn security_redirect(&self, required: AuthLevel, actual: AuthLevel) -> Response {
        security_page(required, actual)
    }
}

/// security_page
///
/// The stock permission failure page: 403 with the required and actual role names.
pub fn security_page(required: AuthLevel, actual: AuthLevel) -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(format!(
            "<html><body><h1>Access Denied</h1><p>This page requires the {} role; you are logged in as {}.</p></body></html>",
            required.role_name(),
            actual.role_name()
        )),
    )
        .into_response()
}

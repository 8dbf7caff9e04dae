use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri, header},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Identity Model ---

/// AuthLevel
///
/// The fixed, totally ordered set of authorization ranks. A resource requiring a level
/// may only be accessed by identities holding that level or higher.
///
/// `Invalid` is not an error state: it marks an identity in the middle of logging in
/// (e.g. currently viewing the login page). Such identities may only reach template routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum AuthLevel {
    #[default]
    Invalid = 0,
    User = 1,
    Installer = 2,
    Admin = 3,
}

impl AuthLevel {
    /// from_i32
    ///
    /// Maps a raw integer rank onto the enumeration. Anything outside the known range
    /// collapses to `Invalid`, never to a higher privilege.
    pub fn from_i32(level: i32) -> Self {
        match level {
            1 => AuthLevel::User,
            2 => AuthLevel::Installer,
            3 => AuthLevel::Admin,
            _ => AuthLevel::Invalid,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// role_name
    ///
    /// Human readable role name, used in security pages and log lines.
    pub fn role_name(self) -> &'static str {
        match self {
            AuthLevel::Invalid => "Invalid",
            AuthLevel::User => "User",
            AuthLevel::Installer => "Installer",
            AuthLevel::Admin => "Admin",
        }
    }
}

/// UserInfo
///
/// The resolved identity of the caller for a single request. Created fresh per request by
/// the `UserSecurity` collaborator and discarded once the response is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserInfo {
    /// The user's login name.
    pub username: String,
    /// The user's authorization rank.
    pub level: AuthLevel,
    /// Application specific reference id (e.g. a row id in the application's user table).
    pub reference_uid: i32,
}

impl UserInfo {
    pub fn new(username: impl Into<String>, level: AuthLevel) -> Self {
        Self {
            username: username.into(),
            level,
            reference_uid: 0,
        }
    }

    pub fn with_reference_uid(mut self, uid: i32) -> Self {
        self.reference_uid = uid;
        self
    }

    /// is_authorized_for
    ///
    /// The single access rule of the system: `level >= required`.
    pub fn is_authorized_for(&self, required: AuthLevel) -> bool {
        self.level >= required
    }
}

// --- Request Model ---

/// QueryParams
///
/// The raw request parameter multimap. Values keep their arrival order per key; the
/// first value is what `get` returns. Serialized as `{ name: [values...] }` when bound
/// into a template data context under `urlparams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, Vec<String>>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// parse
    ///
    /// Decodes an `application/x-www-form-urlencoded` string (a URI query or a form body).
    pub fn parse(encoded: &str) -> Self {
        let mut params = Self::new();
        params.extend_from_encoded(encoded);
        params
    }

    pub fn extend_from_encoded(&mut self, encoded: &str) {
        for (name, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
            self.insert(name.into_owned(), value.into_owned());
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// ActionRequest
///
/// A fully buffered inbound request as seen by the dispatcher and its handlers.
/// `params` holds the query parameters followed by any url-encoded form body parameters.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: QueryParams,
    pub body: Bytes,
}

impl ActionRequest {
    /// from_parts
    ///
    /// Builds the request view from the HTTP pieces. For POSTs carrying a url-encoded form
    /// body the form fields are merged into `params`, after the query fields.
    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let mut params = uri.query().map(QueryParams::parse).unwrap_or_default();

        let is_form = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if method == Method::POST && is_form {
            if let Ok(form) = std::str::from_utf8(&body) {
                params.extend_from_encoded(form);
            }
        }

        Self {
            method,
            uri,
            headers,
            params,
            body,
        }
    }

    /// get
    ///
    /// Convenience constructor for a bodiless GET, mostly used by tests and demos.
    pub fn get(uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_default();
        Self::from_parts(Method::GET, uri, HeaderMap::new(), Bytes::new())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// DataMap
///
/// Key/value bindings handed to the template renderer.
pub type DataMap = serde_json::Map<String, serde_json::Value>;

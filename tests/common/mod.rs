#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use ftl_dispatch::{
    DispatcherBuilder,
    auth::{Resolution, SecurityState, UserSecurity},
    error::DispatchError,
    handlers::{ActionHandler, Invocation, TemplateDataFactory},
    models::{ActionRequest, AuthLevel, DataMap, UserInfo},
    render::{RenderError, RendererState, TemplateRenderer},
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

// --- Mock Security ---

/// Resolves every request to `user`, or redirects to `/login` when `user` is None.
/// Records every security redirect it is asked to produce.
pub struct MockSecurity {
    pub user: Option<UserInfo>,
    pub resolve_calls: AtomicUsize,
    pub redirects: Mutex<Vec<(AuthLevel, AuthLevel)>>,
}

impl MockSecurity {
    pub fn with_level(level: AuthLevel) -> Arc<Self> {
        Arc::new(Self {
            user: Some(UserInfo::new("tester", level)),
            resolve_calls: AtomicUsize::new(0),
            redirects: Mutex::new(vec![]),
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self {
            user: None,
            resolve_calls: AtomicUsize::new(0),
            redirects: Mutex::new(vec![]),
        })
    }

    pub fn redirects(&self) -> Vec<(AuthLevel, AuthLevel)> {
        self.redirects.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserSecurity for MockSecurity {
    async fn resolve_identity(&self, _request: &ActionRequest) -> Resolution {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        match &self.user {
            Some(user) => Resolution::Identified(user.clone()),
            None => Resolution::Redirected(Redirect::to("/login").into_response()),
        }
    }

    fn security_redirect(&self, required: AuthLevel, actual: AuthLevel) -> Response {
        self.redirects.lock().unwrap().push((required, actual));
        (StatusCode::FORBIDDEN, "security redirect").into_response()
    }
}

// --- Mock Renderer ---

/// Renders `rendered:<name>` for known templates, fails for templates marked failing,
/// and reports everything else as missing. Records every call with its data context.
#[derive(Default)]
pub struct MockRenderer {
    pub known: HashSet<String>,
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<(String, DataMap)>>,
}

impl MockRenderer {
    pub fn with_templates(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            known: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn with_failing(names: &[&str], failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            known: names.iter().map(|n| n.to_string()).collect(),
            failing: failing.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(String, DataMap)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rendered_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }
}

impl TemplateRenderer for MockRenderer {
    fn render(&self, template_name: &str, context: &DataMap) -> Result<String, RenderError> {
        self.calls
            .lock()
            .unwrap()
            .push((template_name.to_string(), context.clone()));

        if self.failing.contains(template_name) {
            return Err(RenderError::Failed(format!(
                "undefined variable in {}",
                template_name
            )));
        }
        if self.known.contains(template_name) {
            Ok(format!("rendered:{}", template_name))
        } else {
            Err(RenderError::NotFound(template_name.to_string()))
        }
    }
}

// --- Mock Handlers ---

/// Answers 200 with a fixed body and counts invocations, remembering the keys.
pub struct RecordingHandler {
    pub body: &'static str,
    pub calls: AtomicUsize,
    pub keys: Mutex<Vec<Option<String>>>,
}

impl RecordingHandler {
    pub fn new(body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            body,
            calls: AtomicUsize::new(0),
            keys: Mutex::new(vec![]),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<Option<String>> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn handle(&self, call: Invocation<'_>) -> Result<Response, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(call.key.map(str::to_string));
        Ok(self.body.into_response())
    }
}

/// Data factory counting how often it is asked to build.
#[derive(Default)]
pub struct CountingFactory {
    pub builds: AtomicUsize,
}

impl CountingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateDataFactory for CountingFactory {
    async fn build_template_data(&self) -> DataMap {
        let n = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        let mut map = DataMap::new();
        map.insert("build".into(), Value::from(n));
        map
    }
}

// --- Builders ---

pub fn builder(security: Arc<MockSecurity>, renderer: Arc<MockRenderer>) -> DispatcherBuilder {
    DispatcherBuilder::new(
        "action",
        security as SecurityState,
        renderer as RendererState,
    )
}

pub fn get(uri: &str) -> ActionRequest {
    ActionRequest::get(uri)
}

pub fn post(uri: &str) -> ActionRequest {
    let uri: Uri = uri.parse().unwrap();
    ActionRequest::from_parts(Method::POST, uri, HeaderMap::new(), Bytes::new())
}

pub fn post_form(uri: &str, form: &'static str) -> ActionRequest {
    let uri: Uri = uri.parse().unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    ActionRequest::from_parts(Method::POST, uri, headers, Bytes::from_static(form.as_bytes()))
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use tracing::{debug, trace};

/// content_type_for_resource
///
/// Only resources with a known type are ever served. Anything else (sources, configs,
/// binaries) yields `None` and is refused.
pub fn content_type_for_resource(name: &str) -> Option<&'static str> {
    const TYPES: &[(&str, &str)] = &[
        (".css.map", "application/json"),
        (".js", "text/javascript"),
        (".css", "text/css"),
        (".gif", "image/gif"),
        (".woff", "application/x-font-woff"),
        (".woff2", "application/font-woff2"),
        (".svg", "image/svg+xml"),
        (".ttf", "application/x-font-ttf"),
        (".ico", "image/x-icon"),
        (".html", "text/html"),
        (".png", "image/png"),
        (".jpg", "image/jpeg"),
    ];

    TYPES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, content_type)| *content_type)
}

/// resource_from_path
///
/// The resource name is the last segment of the request path. Directory components
/// are never honoured, which keeps lookups inside the configured directories.
pub fn resource_from_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// StaticResources
///
/// Serves bundled files (scripts, styles, fonts, images) from an ordered list of
/// directories. The first directory containing the resource wins.
#[derive(Debug, Clone)]
pub struct StaticResources {
    dirs: Vec<PathBuf>,
    cache_control: Option<String>,
}

impl StaticResources {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dirs: vec![dir.into()],
            cache_control: None,
        }
    }

    /// Adds another search directory; duplicates are ignored.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir);
        }
        self
    }

    /// with_cache_days
    ///
    /// `0` sends `no-cache`, a positive value sends `max-age` for that many days, and a
    /// negative value leaves caching to the client.
    pub fn with_cache_days(mut self, days: i64) -> Self {
        self.cache_control = match days {
            0 => Some("no-cache".to_string()),
            d if d > 0 => Some(format!("max-age={}", d * 24 * 60 * 60)),
            _ => None,
        };
        self
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.cache_control.as_deref()
    }

    /// serve
    ///
    /// Answers 403 for unknown resource types and 404 for resources no directory holds.
    pub async fn serve(&self, resource: &str) -> Response {
        trace!(%resource, "static resource requested");

        if resource.is_empty() || resource == "." || resource == ".." {
            return StatusCode::NOT_FOUND.into_response();
        }

        let Some(content_type) = content_type_for_resource(resource) else {
            debug!(%resource, "refusing resource with unmapped type");
            return StatusCode::FORBIDDEN.into_response();
        };

        for dir in &self.dirs {
            match tokio::fs::read(dir.join(resource)).await {
                Ok(bytes) => {
                    let mut response =
                        ([(header::CONTENT_TYPE, content_type)], bytes).into_response();
                    if let Some(cache) = &self.cache_control {
                        if let Ok(value) = cache.parse() {
                            response.headers_mut().insert(header::CACHE_CONTROL, value);
                        }
                    }
                    return response;
                }
                Err(_) => continue,
            }
        }

        debug!(%resource, "static resource not found");
        StatusCode::NOT_FOUND.into_response()
    }
}

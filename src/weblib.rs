use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::models::QueryParams;

// --- Parameter Coercion ---

/// Returns the parameter, or `default` when it is absent.
pub fn string_param<'a>(params: &'a QueryParams, name: &str, default: &'a str) -> &'a str {
    params.get(name).unwrap_or(default)
}

/// bool_param
///
/// `true` and `on` (any case) are true; any other present value is false.
/// An absent parameter yields `default`.
pub fn bool_param(params: &QueryParams, name: &str, default: bool) -> bool {
    match params.get(name) {
        Some(value) => value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("on"),
        None => default,
    }
}

/// Returns the parameter as an integer, or `default` when it is absent or malformed.
pub fn int_param(params: &QueryParams, name: &str, default: i32) -> i32 {
    params
        .get(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

// --- JSON Responses ---

/// StandardResult
///
/// The `{ "result": bool, "message": text }` body used by form-style endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandardResult {
    pub result: bool,
    pub message: String,
}

pub fn standard_json_response(result: bool, message: impl Into<String>) -> Response {
    Json(StandardResult {
        result,
        message: message.into(),
    })
    .into_response()
}

/// array_json_response
///
/// Pairs results with messages by position. Extra entries on the longer side are dropped.
pub fn array_json_response(results: &[bool], messages: &[&str]) -> Response {
    let body: Vec<StandardResult> = results
        .iter()
        .zip(messages)
        .map(|(result, message)| StandardResult {
            result: *result,
            message: message.to_string(),
        })
        .collect();
    Json(body).into_response()
}

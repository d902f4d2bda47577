//! HTTP response building helpers
//!
//! Every handler answers with JSON. Errors carry `{ "error": message }` and,
//! for validation failures, the offending `field`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;

use crate::error::JournalError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

pub fn no_content() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// 302 Found with a `Location` header
pub fn redirect(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, &serde_json::json!({ "error": message }))
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

/// Convert a JournalError to an appropriate HTTP response
pub fn error_response(error: JournalError) -> Response<Full<Bytes>> {
    let status = error.status_code();
    let body = match &error {
        JournalError::Validation { field, message } => {
            serde_json::json!({ "error": message, "field": field })
        }
        JournalError::Unauthorized(msg) | JournalError::NotFound(msg) => {
            serde_json::json!({ "error": msg })
        }
        JournalError::Conflict(_) => serde_json::json!({ "error": "Conflict" }),
        // Store internals are not echoed to clients
        JournalError::Database(_) => serde_json::json!({ "error": "Storage unavailable" }),
        _ => serde_json::json!({ "error": "Internal server error" }),
    };

    json_response(status, &body)
}

/// Wrap a service result into a 200 response
pub fn from_result<T: Serialize>(result: Result<T, JournalError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into a 201 response
pub fn from_create_result<T: Serialize>(result: Result<T, JournalError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a delete result into a 204 response
pub fn from_delete_result(result: Result<(), JournalError>) -> Response<Full<Bytes>> {
    match result {
        Ok(()) => no_content(),
        Err(e) => error_response(e),
    }
}

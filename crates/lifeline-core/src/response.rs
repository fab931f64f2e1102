//! Wire envelopes returned by the content operations.
//!
//! Reads answer `{success, data}`, writes `{success, message, data}`, and
//! failures become an `ErrorResponse` carrying an HTTP status and a fixed
//! JSON body. Store connectivity failures are reported as 200 with empty
//! data so clients keep rendering.

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> WriteEnvelope<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status}: {body}")]
pub struct ErrorResponse {
    pub status: u16,
    pub body: Value,
}

impl ErrorResponse {
    fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "success": false, "message": message.into() }),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::failure(400, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::failure(500, message)
    }

    pub fn not_found(path: &str) -> Self {
        Self::failure(404, format!("Cannot find {path} on this server"))
    }

    pub fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => Self {
                status: 400,
                body: json!({
                    "success": false,
                    "message": "Validation Error",
                    "errors": errors,
                }),
            },
            StoreError::DuplicateKey(_) => Self::bad_request("Duplicate field value entered"),
            StoreError::InvalidId(_) => Self::bad_request("Invalid resource ID"),
            StoreError::Connection(_) => Self {
                status: 200,
                body: json!({
                    "success": true,
                    "message": "Service temporarily unavailable, running in demo mode",
                    "data": {},
                }),
            },
            StoreError::Timeout(_) => Self {
                status: 200,
                body: json!({
                    "success": true,
                    "message": "Service temporarily slow, showing demo data",
                    "data": {},
                }),
            },
            StoreError::Query(message) => Self::server_error(message.clone()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.body
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

//! Error types for the Todoable client.
//!
//! # Design
//! Every remote failure category gets its own variant so callers can match
//! narrowly (`ApiError::NotFound { .. }`) or treat `ApiError` as the single
//! umbrella type. Variants produced from an HTTP response keep the status
//! code and raw body for debugging.

use thiserror::Error;

use crate::http::HttpResponse;

/// Errors returned by `TodoableClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 401, or reauthentication was needed but no
    /// credentials were stored.
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// The server returned 400 or 422.
    #[error("malformed request made, status code {status} received, body: {body}")]
    InvalidRequest { status: u16, body: String },

    /// The server returned 404.
    #[error("object not found, status code {status} received, body: {body}")]
    NotFound { status: u16, body: String },

    /// The server returned 429.
    #[error("too many requests, status code {status} received, body: {body}")]
    RateLimited { status: u16, body: String },

    /// The server returned a 5xx status.
    #[error("internal server error, status code {status} received, body: {body}")]
    InternalServer { status: u16, body: String },

    /// The connection failed before a response was received.
    #[error("timed out while making request: {message}")]
    Timeout { message: String },

    /// A successful response did not carry the fields needed to build
    /// `entity`.
    #[error("error initializing {entity} with data: {payload}")]
    MalformedResponse {
        entity: &'static str,
        payload: String,
    },

    /// Any other non-2xx status.
    #[error("error reached while making request, status code {status} received, body: {body}")]
    Unknown { status: u16, body: String },
}

impl ApiError {
    /// HTTP status that caused this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. } => *status,
            ApiError::InvalidRequest { status, .. }
            | ApiError::NotFound { status, .. }
            | ApiError::RateLimited { status, .. }
            | ApiError::InternalServer { status, .. }
            | ApiError::Unknown { status, .. } => Some(*status),
            ApiError::Timeout { .. } | ApiError::MalformedResponse { .. } => None,
        }
    }

    pub(crate) fn malformed(entity: &'static str, payload: impl ToString) -> Self {
        ApiError::MalformedResponse {
            entity,
            payload: payload.to_string(),
        }
    }
}

/// Map a non-2xx status code to the matching `ApiError` variant.
pub(crate) fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let status = response.status;
    let body = response.body.clone();
    Err(match status {
        401 => ApiError::Authentication {
            message: format!("error authenticating, status code {status} received, body: {body}"),
            status: Some(status),
            body: Some(body),
        },
        404 => ApiError::NotFound { status, body },
        400 | 422 => ApiError::InvalidRequest { status, body },
        429 => ApiError::RateLimited { status, body },
        500..=599 => ApiError::InternalServer { status, body },
        _ => ApiError::Unknown { status, body },
    })
}

//! Error responses.
//!
//! Every failure leaves the gateway as `{"message": ..., "timestamp": ...}`,
//! the timestamp being milliseconds since the Unix epoch.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{now_millis, ErrorKind, LedgerError};

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub timestamp: u64,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                message: message.into(),
                timestamp: now_millis(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match err.kind() {
            ErrorKind::Endorsement | ErrorKind::Network | ErrorKind::Commit => StatusCode::BAD_GATEWAY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Config | ErrorKind::DuplicateEndpoint | ErrorKind::Topology => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let timestamp = err.timestamp_millis().unwrap_or_else(now_millis);
        let message = match err {
            LedgerError::Server { message, .. } | LedgerError::Endorsement { message, .. } => message,
            other => other.to_string(),
        };
        Self {
            status,
            body: ErrorBody { message, timestamp },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

//! Stream server error types

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::auth::AuthError;
use crate::source::SourceError;
use crate::token::TokenError;

/// Stream server error type
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Authorization header format must be Bearer {{credential}}")]
    Unauthorized,

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("User not whitelisted: {email}")]
    NotWhitelisted { email: String },

    #[error("Capability token rejected: {0}")]
    Token(#[from] TokenError),

    #[error("Missing or invalid token in query")]
    InvalidQueryToken,

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Invalid path: {path}")]
    BadPath { path: String },

    #[error("Path '{path}' is not covered by the token")]
    OutsideToken { path: String },

    #[error("Cannot list directory '{path}': {reason}")]
    ListFailed { path: String, reason: String },

    #[error("Requested range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server bind failed: {reason}")]
    BindFailed { reason: String },

    #[error("Internal server error: {reason}")]
    Internal { reason: String },
}

impl ServerError {
    /// Check if this error should result in a 403 Forbidden response
    pub fn is_forbidden(&self) -> bool {
        matches!(
            self,
            ServerError::Auth(_) | ServerError::NotWhitelisted { .. } | ServerError::OutsideToken { .. }
        )
    }

    /// Check if this error should result in a 404 Not Found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServerError::Token(_) | ServerError::NotFound { .. })
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            e if e.is_forbidden() => StatusCode::FORBIDDEN,
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            ServerError::InvalidQueryToken
            | ServerError::BadPath { .. }
            | ServerError::ListFailed { .. } => StatusCode::BAD_REQUEST,
            ServerError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected: {}", self);
        }

        let mut response = (status, self.to_string()).into_response();
        if let ServerError::RangeNotSatisfiable { size } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

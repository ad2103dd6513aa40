use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

use crate::response::ErrorResponse;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Outcome of a request that did not succeed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("resource not found")]
    NotFound,

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_user_data() -> Self {
        ApiError::InvalidInput("Invalid user data.".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::InvalidInput(msg) => (status, msg).into_response(),
            ApiError::Unauthorized(reason) => {
                (status, format!("Unauthorized: {}", reason)).into_response()
            }
            ApiError::NotFound | ApiError::PayloadTooLarge { .. } => status.into_response(),
            ApiError::RateLimited { retry_after } => {
                let mut resp = status.into_response();
                // Round up so clients never retry inside the window.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                resp.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                resp
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed with internal error");
                ErrorResponse::internal().into_response()
            }
        }
    }
}

/// Failures raised by the in-memory user store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user {0} not found")]
    NotFound(u64),

    #[error("refusing to store a record with id {0}")]
    InvalidId(u64),

    #[error("store lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration from environment: {0}")]
    Env(#[from] envconfig::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

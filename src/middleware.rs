//! Request pipeline stages.
//!
//! Every stage has the same shape: it receives the request and a `Next`, and
//! either answers on its own (short-circuit) or forwards. `server::with_pipeline`
//! composes them in their fixed order around the user routes.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::LengthLimitError;
use std::any::Any;
use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;
use tower::ServiceExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::fixed_window::Admission;
use crate::response::ErrorResponse;
use crate::state::SharedState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Bodies longer than this are cut short in the request/response log lines.
const LOG_BODY_LIMIT: usize = 4096;

/// Exception boundary handler: turns a panic anywhere below into the generic 500.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    error!(panic = %detail, "Unhandled exception occurred");
    ErrorResponse::internal().into_response()
}

/// Routes reachable without credentials, dispatched straight to the terminal router.
#[derive(Clone)]
pub struct BypassRoute {
    pub prefix: String,
    pub terminal: Router,
}

impl BypassRoute {
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.as_bytes();
        path.len() >= prefix.len() && path.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix)
    }
}

pub async fn bypass_stage(
    State(bypass): State<BypassRoute>,
    request: Request,
    next: Next,
) -> Response {
    if !bypass.matches(request.uri().path()) {
        return next.run(request).await;
    }

    match bypass.terminal.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Check the `X-Api-Key` header against the accepted tokens.
pub fn authorize(state: &SharedState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get(API_KEY_HEADER)
        .ok_or(ApiError::Unauthorized("API token was not provided."))?;

    match token.to_str() {
        Ok(token) if state.auth.is_valid(token) => Ok(()),
        _ => Err(ApiError::Unauthorized("Invalid API token.")),
    }
}

pub async fn auth_stage(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    match authorize(&state, request.headers()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            warn!(path = %request.uri().path(), reason = %err, "Rejected unauthenticated request");
            err.into_response()
        }
    }
}

pub async fn rate_limit_stage(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let client_id = get_client_ip(&request, state.settings.trust_proxy_headers);

    let limit = state.rate_limiter.permit_limit();
    match state.rate_limiter.try_admit(&client_id, Instant::now()) {
        Ok(Admission::Admitted { remaining }) => {
            let mut response = next.run(request).await;
            insert_rate_limit_headers(response.headers_mut(), limit, remaining);
            response
        }
        Ok(Admission::Rejected { retry_after }) => {
            warn!(client_ip = %client_id, path = %request.uri().path(), "Rate limit exceeded");
            let mut response = ApiError::RateLimited { retry_after }.into_response();
            insert_rate_limit_headers(response.headers_mut(), limit, 0);
            response
        }
        Err(err) => err.into_response(),
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
}

/// Logging middleware for request/response tracking
pub async fn logging_stage(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    let limit = state.settings.max_body_bytes;

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(request_id = %request_id, limit, error = %err, "Failed to read request body");
            return body_read_error(err, limit).into_response();
        }
    };

    info!(
        target: "user_api::middleware",
        request_id = %request_id,
        method = %parts.method,
        path = %parts.uri.path(),
        query = %parts.uri.query().unwrap_or_default(),
        body = %body_preview(&body),
        "HTTP request"
    );

    let response = next.run(Request::from_parts(parts, Body::from(body))).await;

    let (parts, body) = response.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ApiError::Internal(format!("failed to buffer response body: {}", err))
                .into_response();
        }
    };

    info!(
        target: "user_api::middleware",
        request_id = %request_id,
        status = %parts.status,
        body = %body_preview(&body),
        "HTTP response"
    );

    Response::from_parts(parts, Body::from(body))
}

pub async fn tracking_stage(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let count = state.tracker.track_call(path);
    info!(path = %path, count, "API route called");

    next.run(request).await
}

/// Classify a failed body read; the caller never sees the underlying error text.
fn body_read_error(err: axum::Error, limit: usize) -> ApiError {
    if err.into_inner().is::<LengthLimitError>() {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::InvalidInput("Unable to read request body.".to_string())
    }
}

fn body_preview(body: &Bytes) -> Cow<'_, str> {
    String::from_utf8_lossy(&body[..body.len().min(LOG_BODY_LIMIT)])
}

/// Resolve the identity used for rate limiting.
///
/// Forwarding headers are only consulted when the service sits behind a
/// trusted proxy; otherwise the peer address is used, falling back to
/// loopback when the connection info is unavailable.
pub fn get_client_ip(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(forwarded) = request.headers().get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    let first_ip = first_ip.trim();
                    if !first_ip.is_empty() {
                        return first_ip.to_string();
                    }
                }
            }
        }

        if let Some(real_ip) = request.headers().get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                return ip_str.trim().to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .to_string()
}

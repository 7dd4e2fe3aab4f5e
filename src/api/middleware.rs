//! API Middleware
//!
//! Auth context extraction and request logging.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::AuthContext;

pub const USER_ID_HEADER: &str = "x-request-user-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// =========================================================================
// Auth context
// =========================================================================

/// Build the request's [`AuthContext`] from identity headers.
///
/// The user id has already been authenticated upstream; a missing header
/// yields an anonymous context and the operation decides whether that is
/// acceptable.
pub async fn auth_context_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let headers = request.headers();

    let user_id = match headers.get(USER_ID_HEADER) {
        None => None,
        Some(value) => match value.to_str().ok().and_then(|s| Uuid::parse_str(s.trim()).ok()) {
            Some(user_id) => Some(user_id),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid X-Request-User-Id header format",
                        "error_code": "invalid_argument"
                    })),
                )
                    .into_response());
            }
        },
    };

    // Extract correlation ID or generate new one
    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let context = AuthContext {
        user_id,
        correlation_id: Some(correlation_id),
    };
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// mask_headers_for_logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request logging
// =========================================================================

/// Request logging middleware; runs inside the auth context layer
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let context = request.extensions().get::<AuthContext>();
    let correlation_id = context.and_then(|ctx| ctx.correlation_id);
    let user_id = context.and_then(|ctx| ctx.user_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        user_id = ?user_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

//! Session gate for the `/api` routes.
//!
//! Login flows live outside this service. Callers present the shared
//! session token either as `Authorization: Bearer <token>` or in the
//! `X-Session-Token` header.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::AppError;
use crate::web::AppState;

pub const SESSION_HEADER: &str = "X-Session-Token";

/// Reject requests without a valid session token.
///
/// With no `SESSION_TOKEN` configured every request is let through.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.config.session_token.as_deref();
    let provided = session_token(request.headers());

    match (provided, expected) {
        (Some(provided), Some(expected)) if provided == expected => {}
        (None, Some(_)) => {
            warn!(path = %request.uri().path(), "session_missing");
            return unauthorized();
        }
        (Some(_), Some(_)) => {
            warn!(path = %request.uri().path(), "session_invalid");
            return unauthorized();
        }
        (_, None) => {
            warn!("session_auth_not_configured");
        }
    }

    next.run(request).await
}

fn unauthorized() -> Response {
    AppError::Unauthorized("Unauthorized. Please login first.".to_string()).into_response()
}

/// Bearer token first, then the session header.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|t| !t.is_empty())
}

//! API-key guard for the shelter routes.
//!
//! With `api_key` configured, every route outside [`PUBLIC_PATHS`] needs the
//! key as `Authorization: Bearer <key>` or `X-API-Key: <key>`. A wrong key
//! is 403, a missing one 401.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::json_error;
use super::state::AppState;

/// Routes reachable without a key (load balancer health checks).
const PUBLIC_PATHS: &[&str] = &["/health"];

#[derive(Debug, PartialEq, Eq)]
enum KeyRejection {
    Missing,
    Wrong,
}

impl KeyRejection {
    fn status(&self) -> StatusCode {
        match self {
            KeyRejection::Missing => StatusCode::UNAUTHORIZED,
            KeyRejection::Wrong => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            KeyRejection::Missing => "authentication required",
            KeyRejection::Wrong => "invalid API key",
        }
    }
}

/// The key a caller presented. A bearer token wins over `X-API-Key`;
/// non-bearer `Authorization` schemes are ignored.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header_str(header::AUTHORIZATION.as_str())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .or_else(|| header_str("x-api-key"))
        .map(str::trim)
}

fn check_key(expected: &str, headers: &HeaderMap) -> Result<(), KeyRejection> {
    match presented_key(headers) {
        None => Err(KeyRejection::Missing),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(KeyRejection::Wrong),
    }
}

pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match check_key(expected, request.headers()) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::debug!(
                path = %request.uri().path(),
                reason = rejection.message(),
                "request rejected by API-key guard"
            );
            json_error(rejection.status(), rejection.message()).into_response()
        }
    }
}

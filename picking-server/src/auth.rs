//! Bearer-token guard for the backup endpoints.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AuthMode;
use crate::http::ApiError;

pub const MISSING_TOKEN: &str = "Missing or invalid token";
pub const INVALID_TOKEN: &str = "Invalid token";

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header, or not of the `Bearer` form.
    Missing,
    /// A bearer token that does not match the secret.
    Invalid,
}

impl AuthFailure {
    pub fn message(self) -> &'static str {
        match self {
            AuthFailure::Missing => MISSING_TOKEN,
            AuthFailure::Invalid => INVALID_TOKEN,
        }
    }
}

/// Check an `Authorization` header value against `secret`.
pub fn check_bearer(header: Option<&str>, secret: &str) -> Result<(), AuthFailure> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AuthFailure::Missing)?
        .trim();
    if constant_time_eq(token.as_bytes(), secret.as_bytes()) {
        Ok(())
    } else {
        Err(AuthFailure::Invalid)
    }
}

/// Middleware for routes that require the bearer secret.
pub async fn require_bearer(
    State(auth): State<AuthMode>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let AuthMode::Bearer(secret) = &auth {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if let Err(failure) = check_bearer(header, secret) {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = failure.message(),
                "rejected request",
            );
            return Err(ApiError::unauthorized(failure));
        }
    }
    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_token() {
        assert_eq!(check_bearer(Some("Bearer s3cret"), "s3cret"), Ok(()));
        assert_eq!(check_bearer(Some("Bearer  s3cret "), "s3cret"), Ok(()));
    }

    #[test]
    fn missing_or_malformed_header() {
        assert_eq!(check_bearer(None, "s3cret"), Err(AuthFailure::Missing));
        assert_eq!(check_bearer(Some("Basic abc"), "s3cret"), Err(AuthFailure::Missing));
        assert_eq!(check_bearer(Some("bearer s3cret"), "s3cret"), Err(AuthFailure::Missing));
    }

    #[test]
    fn wrong_token() {
        assert_eq!(check_bearer(Some("Bearer nope"), "s3cret"), Err(AuthFailure::Invalid));
        assert_eq!(check_bearer(Some("Bearer "), "s3cret"), Err(AuthFailure::Invalid));
        assert_eq!(AuthFailure::Invalid.message(), "Invalid token");
    }
}

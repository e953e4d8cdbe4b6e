/// Request authentication for Axum
///
/// Bearer tokens are read from the `Authorization` header (or handed in
/// directly, as the socket endpoint does with its `?token=` query), validated
/// as session JWTs, and turned into an [`AuthContext`] that handlers pull out
/// of the request extensions.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use taskflow_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Error type for request authentication
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header or token
    MissingCredentials,

    /// Authorization header is not a bearer credential
    InvalidFormat(String),

    /// Token validation failed
    InvalidToken(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::MissingCredentials => "No token provided, authorization denied",
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => msg,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = if status == StatusCode::BAD_REQUEST {
            "bad_request"
        } else {
            "unauthorized"
        };

        (status, Json(json!({ "error": code, "message": self.message() }))).into_response()
    }
}

/// Extracts the bearer token from request headers
///
/// # Errors
///
/// - `MissingCredentials` when there is no `Authorization` header
/// - `InvalidFormat` when the header is not `Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Validates a raw session token and builds the auth context
pub fn authenticate_token(token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken("Token is not valid".to_string()),
    })?;

    Ok(AuthContext::new(claims.sub))
}

/// Authenticates a request from its `Authorization` header
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    authenticate_token(bearer_token(headers)?, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, Claims};
    use axum::http::HeaderValue;

    const SECRET: &str = "middleware-test-secret-32-bytes-long";

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingCredentials));
        assert_eq!(bearer_token(&headers_with("Bearer ")), Err(AuthError::MissingCredentials));
        assert!(matches!(
            bearer_token(&headers_with("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_authenticate_valid_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, chrono::Duration::days(1)), SECRET).unwrap();

        let ctx = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET).unwrap();
        assert_eq!(ctx, AuthContext::new(user_id));
    }

    #[test]
    fn test_authenticate_expired_token() {
        let claims = Claims::new(Uuid::new_v4(), chrono::Duration::seconds(-120));
        let token = create_token(&claims, SECRET).unwrap();

        assert_eq!(
            authenticate_token(&token, SECRET),
            Err(AuthError::InvalidToken("Token expired".to_string()))
        );
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(AuthError::MissingCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InvalidToken("bad".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}

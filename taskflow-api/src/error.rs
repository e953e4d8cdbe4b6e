/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]. An [`ApiError`] renders as
/// `{"error": <code>, "message": <text>, "details"?: [...]}` with the matching
/// status code, and domain errors convert into it with `?`.
///
/// # Example
///
/// ```
/// use taskflow_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(title: Option<String>) -> ApiResult<Json<Value>> {
///     let title = title.ok_or_else(|| ApiError::BadRequest("Title is required".into()))?;
///     Ok(Json(json!({ "title": title })))
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskflow_shared::{
    auth::{jwt::JwtError, middleware::AuthError, oauth::OAuthError, password::PasswordError},
    models::{task::ParseEnumError, task_query::ParseQueryError},
};

/// Unique constraint on `users.email`
const USERS_EMAIL_KEY: &str = "users_email_key";

/// Primary key of `task_shares`
const TASK_SHARES_PKEY: &str = taskflow_shared::models::task_share::TASK_SHARES_PKEY;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404)
    NotFound(String),

    /// Request body failed validation (400, with per-field details)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500); the message is logged, never returned
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `bad_request`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::InternalError(_) => "internal_error",
        }
    }

    /// Shorthand for the 404 used when a task is missing or not visible
    pub fn task_not_found() -> Self {
        ApiError::NotFound("Task not found".to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let mut retry_after = None;

        let (message, details) = match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::NotFound(msg) => (msg, None),
            ApiError::ValidationError(errors) => ("Validation failed".to_string(), Some(errors)),
            ApiError::RateLimitExceeded {
                retry_after: seconds,
                message,
            } => {
                retry_after = Some(seconds);
                (message, None)
            }
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ("Server error".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.constraint() {
                // Races past the pre-checks land here.
                Some(USERS_EMAIL_KEY) => {
                    ApiError::BadRequest("User with this email already exists".to_string())
                }
                Some(TASK_SHARES_PKEY) => {
                    ApiError::BadRequest("Task already shared with this user".to_string())
                }
                _ => ApiError::InternalError(format!("Database error: {}", db_err)),
            },
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Flattens validator errors into response details, sorted by field
pub fn validation_details(errors: &validator::ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| ValidationErrorDetail {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field)),
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(validation_details(&errors))
    }
}

/// Field a JSON data error points at, else `body`
///
/// A bad value reads `<prefix>: <path>: <error>`; an absent one names the
/// field in serde's "missing field" message.
fn rejected_field(message: &str) -> String {
    let detail = message.split_once("target type: ").map_or(message, |(_, rest)| rest);

    if let Some(name) = detail
        .split("missing field `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
    {
        return name.to_string();
    }

    detail
        .split_once(": ")
        .map(|(path, _)| path)
        .filter(|path| !path.is_empty() && !path.contains(char::is_whitespace))
        .unwrap_or("body")
        .to_string()
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                let message = err.body_text();
                ApiError::ValidationError(vec![ValidationErrorDetail {
                    field: rejected_field(&message),
                    message,
                }])
            }
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            other => ApiError::Unauthorized(other.message().to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Token is not valid".to_string()),
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::UnknownProvider(name) => {
                ApiError::NotFound(format!("OAuth provider '{}' is not available", name))
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl From<ParseEnumError> for ApiError {
    fn from(err: ParseEnumError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ParseQueryError> for ApiError {
    fn from(err: ParseQueryError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;
    use validator::Validate;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");
        assert_eq!(ApiError::task_not_found().to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_rejected_field() {
        let prefix = "Failed to deserialize the JSON body into the target type";
        assert_eq!(
            rejected_field(&format!("{prefix}: missing field `name` at line 1 column 40")),
            "name"
        );
        assert_eq!(
            rejected_field(&format!(
                "{prefix}: title: invalid type: integer `42`, expected a string at line 1 column 11"
            )),
            "title"
        );
        assert_eq!(rejected_field("something else entirely"), "body");
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = ApiError::task_not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Task not found");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let response = ApiError::InternalError("connection refused on 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Server error");
        assert!(!body.to_string().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 42,
            message: "Too many requests".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Please provide a valid email"))]
        email: String,
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    #[tokio::test]
    async fn test_validation_errors_become_details() {
        let errors = Signup {
            email: "nope".into(),
            name: String::new(),
        }
        .validate()
        .unwrap_err();

        let err = ApiError::from(errors);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let body = body_json(err.into_response()).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0]["field"], "email");
        assert_eq!(body["details"][0]["message"], "Please provide a valid email");
        assert_eq!(body["details"][1]["field"], "name");
    }

    #[test]
    fn test_auth_and_parse_conversions() {
        assert_eq!(ApiError::from(AuthError::MissingCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(AuthError::InvalidFormat("Expected Bearer token".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(JwtError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(JwtError::CreateError("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let err = ApiError::from("urgent".parse::<taskflow_shared::models::task::TaskPriority>().unwrap_err());
        assert_eq!(err.to_string(), "Bad request: Invalid priority 'urgent'");
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        assert_eq!(ApiError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(sqlx::Error::PoolTimedOut).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

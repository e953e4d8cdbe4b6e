/// Local account endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/signup` - Create an account
/// - `POST /api/auth/signin` - Sign in with email and password
/// - `GET /api/auth/check-email/:email` - Whether an email is registered
/// - `GET /api/auth/me` - Current user (JWT)
/// - `PUT /api/auth/profile` - Update name or avatar (JWT)
/// - `POST /api/auth/logout` - Clear the token cookie

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
    routes::deserialize_some,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use std::borrow::Cow;
use taskflow_shared::{
    auth::{middleware::AuthContext, password},
    models::user::{CreateUser, UpdateProfile, User, UserProfile},
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Longest accepted display name
pub const MAX_NAME_LENGTH: usize = 100;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Name is required")));
    }
    Ok(())
}

fn strong_password(value: &str) -> Result<(), ValidationError> {
    password::validate_password_strength(value)
        .map_err(|message| ValidationError::new("password_strength").with_message(Cow::Borrowed(message)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(custom(function = "strong_password"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body of signup and signin responses
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailCheckResponse {
    pub exists: bool,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,

    /// `null` removes the avatar
    #[serde(default, deserialize_with = "deserialize_some")]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateProfileRequest {
    /// Validates and normalises the request into a model update
    fn into_update(self) -> Result<UpdateProfile, ApiError> {
        let mut details = Vec::new();

        let name = match self.name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() || n.chars().count() > MAX_NAME_LENGTH => {
                details.push(ValidationErrorDetail {
                    field: "name".to_string(),
                    message: "Name must be between 1 and 100 characters".to_string(),
                });
                None
            }
            other => other,
        };

        let avatar_url = match self.avatar_url {
            Some(Some(url)) if url.trim().is_empty() => Some(None),
            Some(Some(url)) => match url::Url::parse(url.trim()) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(Some(parsed.to_string())),
                _ => {
                    details.push(ValidationErrorDetail {
                        field: "avatar_url".to_string(),
                        message: "Avatar must be an http(s) URL".to_string(),
                    });
                    None
                }
            },
            other => other,
        };

        if !details.is_empty() {
            return Err(ApiError::ValidationError(details));
        }

        Ok(UpdateProfile { name, avatar_url })
    }
}

/// Register a new local account
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/signup
/// Content-Type: application/json
///
/// {
///   "name": "Ada Lovelace",
///   "email": "ada@example.com",
///   "password": "Analytical#1"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, or the email is taken
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    if User::email_exists(&state.db, &req.email).await? {
        return Err(ApiError::BadRequest("User with this email already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash: Some(password_hash),
            name: req.name.trim().to_string(),
            avatar_url: None,
            email_verified: true,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User signed up");

    let token = state.issue_token(user.id)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".to_string(),
            user: UserProfile::from(&user),
            token,
        }),
    ))
}

/// Sign in with email and password
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Unknown email, wrong password, or an OAuth-only account
pub async fn signin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SigninRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let Some(hash) = user.password_hash.as_deref() else {
        let provider = user
            .oauth_provider()
            .map(|p| p.display_name())
            .unwrap_or("a social login");
        return Err(ApiError::Unauthorized(format!(
            "This account was created with {provider}. Please sign in with {provider}."
        )));
    };

    if !password::verify_password(&req.password, hash)? {
        tracing::warn!(user_id = %user.id, "Failed sign-in attempt");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;
    let token = state.issue_token(user.id)?;

    Ok(Json(AuthResponse {
        message: "Signin successful".to_string(),
        user: UserProfile::from(&user),
        token,
    }))
}

pub async fn check_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<EmailCheckResponse>> {
    let exists = User::email_exists(&state.db, &email).await?;

    Ok(Json(EmailCheckResponse {
        exists,
        message: if exists { "Email already registered" } else { "Email available" }.to_string(),
    }))
}

/// Current user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(Json(UserProfile::from(&user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let update = req.into_update()?;

    let user = User::update_profile(&state.db, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(Json(UserProfile::from(&user)))
}

/// Logout
///
/// Tokens are stateless, so this only clears the cookie; clients drop their
/// copy of the token.
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(
            header::SET_COOKIE,
            HeaderValue::from_static("token=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"),
        )]),
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(name: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("Ada", "ada@example.com", "Analytical#1").validate().is_ok());

        let errors = signup("   ", "not-an-email", "password").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert_eq!(
            fields["password"][0].message.as_deref(),
            Some("Password must contain at least one uppercase letter")
        );
    }

    #[test]
    fn test_signup_name_too_long() {
        let name = "x".repeat(101);
        assert!(signup(&name, "ada@example.com", "Analytical#1").validate().is_err());
    }

    #[test]
    fn test_profile_update_normalisation() {
        let update = UpdateProfileRequest {
            name: Some("  Ada  ".into()),
            avatar_url: Some(Some("https://img.example.com/ada.png".into())),
        }
        .into_update()
        .unwrap();
        assert_eq!(update.name.as_deref(), Some("Ada"));
        assert_eq!(update.avatar_url, Some(Some("https://img.example.com/ada.png".into())));

        let cleared = UpdateProfileRequest {
            name: None,
            avatar_url: Some(Some("".into())),
        }
        .into_update()
        .unwrap();
        assert_eq!(cleared.avatar_url, Some(None));
    }

    #[test]
    fn test_profile_update_rejections() {
        let err = UpdateProfileRequest {
            name: Some(" ".into()),
            avatar_url: Some(Some("javascript:alert(1)".into())),
        }
        .into_update()
        .unwrap_err();

        match err {
            ApiError::ValidationError(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, ["name", "avatar_url"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_profile_null_avatar_is_explicit() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"avatar_url": null}"#).unwrap();
        assert_eq!(req.avatar_url, Some(None));

        let req: UpdateProfileRequest = serde_json::from_str(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(req.avatar_url, None);
    }
}

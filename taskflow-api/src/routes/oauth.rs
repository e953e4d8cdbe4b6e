/// OAuth login endpoints
///
/// Registered once per provider (`google`, `github`, `facebook`):
///
/// - `GET /api/auth/{provider}` - 303 to the provider's consent page
/// - `GET /api/auth/{provider}/callback?code&state` - finishes the login and
///   redirects to the client with a session token
///
/// The CSRF state (and Google's PKCE verifier) is held in
/// [`PendingLogins`](taskflow_shared::auth::oauth::PendingLogins) between the
/// two requests. Any failure after the consent page sends the browser to
/// `CLIENT_URL/signin?error=oauth_failed`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::response::Redirect;
use serde::Deserialize;
use taskflow_shared::{
    auth::oauth::{AuthProvider, OAuthClient},
    models::user::User,
};

/// Query string the provider sends back
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied consent
    pub error: Option<String>,
}

fn configured_client(state: &AppState, provider: AuthProvider) -> ApiResult<&OAuthClient> {
    state.oauth_client(provider).ok_or_else(|| {
        ApiError::NotFound(format!("{} login is not configured", provider.display_name()))
    })
}

pub(crate) fn success_url(client_url: &str, token: &str) -> String {
    format!("{}/auth-success?token={}", client_url, token)
}

pub(crate) fn failure_url(client_url: &str) -> String {
    format!("{}/signin?error=oauth_failed", client_url)
}

/// Starts a login by redirecting to the provider
pub async fn authorize(state: AppState, provider: AuthProvider) -> ApiResult<Redirect> {
    let client = configured_client(&state, provider)?;

    let (url, csrf, verifier) = client.authorize_url();
    state
        .pending_logins
        .insert(csrf.secret().clone(), provider, verifier);

    tracing::debug!(provider = %provider, "Redirecting to OAuth consent page");
    Ok(Redirect::to(&url))
}

/// Completes a login
pub async fn callback(
    state: AppState,
    provider: AuthProvider,
    params: CallbackParams,
) -> ApiResult<Redirect> {
    let client = configured_client(&state, provider)?;
    let client_url = state.config.api.client_url.as_str();

    match complete_login(&state, client, params).await {
        Ok(token) => Ok(Redirect::to(&success_url(client_url, &token))),
        Err(reason) => {
            tracing::warn!(provider = %provider, reason = %reason, "OAuth login failed");
            Ok(Redirect::to(&failure_url(client_url)))
        }
    }
}

async fn complete_login(
    state: &AppState,
    client: &OAuthClient,
    params: CallbackParams,
) -> Result<String, String> {
    if let Some(error) = params.error {
        return Err(format!("provider returned error '{}'", error));
    }

    let csrf = params.state.ok_or("missing state")?;
    let verifier = state
        .pending_logins
        .take(&csrf, client.provider())
        .ok_or("unknown or expired state")?;
    let code = params.code.ok_or("missing code")?;

    let profile = client
        .exchange_code(&code, verifier)
        .await
        .map_err(|e| e.to_string())?;

    let user = User::find_or_create_oauth(&state.db, &profile)
        .await
        .map_err(|e| format!("account lookup failed: {}", e))?;

    User::update_last_login(&state.db, user.id)
        .await
        .map_err(|e| format!("last login update failed: {}", e))?;

    tracing::info!(user_id = %user.id, provider = %client.provider(), "OAuth login succeeded");

    state.issue_token(user.id).map_err(|e| e.to_string())
}

/// OAuth 2.0 authorization-code login for Google, GitHub and Facebook
///
/// Each configured provider gets an [`OAuthClient`]. A login starts with
/// [`OAuthClient::authorize_url`], which yields the consent URL plus the CSRF
/// state (and, for Google, a PKCE verifier) to park in [`PendingLogins`]. The
/// provider redirects back with `code` and `state`; the state is redeemed with
/// [`PendingLogins::take`] and the code exchanged through
/// [`OAuthClient::exchange_code`], which returns a provider-neutral
/// [`OAuthProfile`].
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::auth::oauth::{AuthProvider, OAuthClient, PendingLogins};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OAuthClient::new(
///     AuthProvider::Github,
///     "client-id",
///     "client-secret",
///     "http://localhost:5000/api/auth/github/callback",
/// )?;
/// let pending = PendingLogins::default();
///
/// let (url, state, verifier) = client.authorize_url();
/// pending.insert(state.secret().clone(), AuthProvider::Github, verifier);
/// println!("redirect the browser to {url}");
///
/// // ...later, in the callback handler
/// let verifier = pending.take(state.secret(), AuthProvider::Github).ok_or("unknown state")?;
/// let profile = client.exchange_code("code-from-provider", verifier).await?;
/// println!("{} <{}>", profile.name, profile.email);
/// # Ok(())
/// # }
/// ```

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

/// How long an authorization round trip may take before its state expires
pub const PENDING_LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
const FACEBOOK_ME_URL: &str = "https://graph.facebook.com/me";

/// Identity provider a user can sign in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    Github,
    Facebook,
}

impl AuthProvider {
    /// Every supported provider, in lookup precedence order
    pub const ALL: [AuthProvider; 3] = [AuthProvider::Google, AuthProvider::Github, AuthProvider::Facebook];

    /// Path segment and wire name (`google`, `github`, `facebook`)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
            AuthProvider::Facebook => "facebook",
        }
    }

    /// Human-readable name used in messages
    pub fn display_name(&self) -> &'static str {
        match self {
            AuthProvider::Google => "Google",
            AuthProvider::Github => "GitHub",
            AuthProvider::Facebook => "Facebook",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        match self {
            AuthProvider::Google => (GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL),
            AuthProvider::Github => (GITHUB_AUTH_URL, GITHUB_TOKEN_URL),
            AuthProvider::Facebook => (FACEBOOK_AUTH_URL, FACEBOOK_TOKEN_URL),
        }
    }

    fn scopes(&self) -> &'static [&'static str] {
        match self {
            AuthProvider::Google => &["openid", "email", "profile"],
            AuthProvider::Github => &["read:user", "user:email"],
            AuthProvider::Facebook => &["email", "public_profile"],
        }
    }

    fn uses_pkce(&self) -> bool {
        matches!(self, AuthProvider::Google)
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuthProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OAuthError::UnknownProvider(s.to_string()))
    }
}

/// Error type for OAuth operations
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Provider name not recognised
    #[error("Unknown OAuth provider: {0}")]
    UnknownProvider(String),

    /// Client could not be built from the given settings
    #[error("Invalid OAuth configuration: {0}")]
    Configuration(String),

    /// Authorization code could not be exchanged for a token
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Profile endpoint failed or returned something unusable
    #[error("Failed to fetch profile: {0}")]
    Profile(String),
}

/// Provider-neutral identity returned after a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: AuthProvider,
    /// Subject id at the provider
    pub provider_id: String,
    /// Normalised (trimmed, lowercase) email, possibly a provider fallback address
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GithubUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct FacebookUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
pub struct FacebookPicture {
    pub data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
pub struct FacebookPictureData {
    pub url: Option<String>,
}

fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Builds a profile from Google's OpenID Connect userinfo response
pub fn google_profile(info: GoogleUserInfo) -> Result<OAuthProfile, OAuthError> {
    let email = normalize_email(info.email.as_deref())
        .ok_or_else(|| OAuthError::Profile("Google account has no email address".to_string()))?;
    let name = non_blank(info.name).unwrap_or_else(|| {
        email.split('@').next().unwrap_or_default().to_string()
    });

    Ok(OAuthProfile {
        provider: AuthProvider::Google,
        provider_id: info.sub,
        email,
        name,
        avatar_url: info.picture,
    })
}

/// Builds a profile from GitHub's `/user` and `/user/emails` responses
///
/// The public profile email wins, then the primary verified address, then any
/// verified one. Accounts exposing none fall back to `<login>@github.com`.
pub fn github_profile(user: GithubUser, emails: &[GithubEmail]) -> OAuthProfile {
    let listed = emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.as_str());

    let email = normalize_email(user.email.as_deref())
        .or_else(|| normalize_email(listed))
        .unwrap_or_else(|| format!("{}@github.com", user.login.to_lowercase()));

    OAuthProfile {
        provider: AuthProvider::Github,
        provider_id: user.id.to_string(),
        email,
        name: non_blank(user.name).unwrap_or_else(|| user.login.clone()),
        avatar_url: user.avatar_url,
    }
}

/// Builds a profile from the Graph API `/me` response
pub fn facebook_profile(user: FacebookUser) -> OAuthProfile {
    let email = normalize_email(user.email.as_deref())
        .unwrap_or_else(|| format!("{}@facebook.com", user.id));

    OAuthProfile {
        provider: AuthProvider::Facebook,
        email,
        name: non_blank(user.name).unwrap_or_else(|| "Facebook User".to_string()),
        avatar_url: user.picture.and_then(|p| p.data.url),
        provider_id: user.id,
    }
}

type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// Authorization-code client for a single provider
#[derive(Clone)]
pub struct OAuthClient {
    provider: AuthProvider,
    client: ConfiguredClient,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("provider", &self.provider)
            .field("redirect_url", &self.redirect_url.as_str())
            .finish()
    }
}

impl OAuthClient {
    /// Creates a client for `provider` redirecting back to `redirect_url`
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Configuration` if a URL is malformed
    pub fn new(
        provider: AuthProvider,
        client_id: &str,
        client_secret: &str,
        redirect_url: &str,
    ) -> Result<Self, OAuthError> {
        let (auth_url, token_url) = provider.endpoints();
        let config_err = |e: oauth2::url::ParseError| OAuthError::Configuration(e.to_string());

        let mut client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).map_err(config_err)?)
            .set_token_uri(TokenUrl::new(token_url.to_string()).map_err(config_err)?);

        // GitHub and Facebook expect the credentials as form fields.
        if !matches!(provider, AuthProvider::Google) {
            client = client.set_auth_type(AuthType::RequestBody);
        }

        // GitHub rejects API calls without a User-Agent.
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("taskflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuthError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            redirect_url: RedirectUrl::new(redirect_url.to_string()).map_err(config_err)?,
            http_client,
        })
    }

    pub fn provider(&self) -> AuthProvider {
        self.provider
    }

    pub fn redirect_url(&self) -> &str {
        self.redirect_url.as_str()
    }

    /// Builds the consent page URL with a fresh CSRF state
    ///
    /// Returns the PKCE verifier for providers that use it.
    pub fn authorize_url(&self) -> (String, CsrfToken, Option<PkceCodeVerifier>) {
        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(Cow::Borrowed(&self.redirect_url))
            .add_scopes(
                self.provider
                    .scopes()
                    .iter()
                    .map(|s| Scope::new(s.to_string())),
            );

        let verifier = if self.provider.uses_pkce() {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            request = request.set_pkce_challenge(challenge);
            Some(verifier)
        } else {
            None
        };

        let (url, state) = request.url();
        (url.to_string(), state, verifier)
    }

    /// Exchanges an authorization code and fetches the caller's profile
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<PkceCodeVerifier>,
    ) -> Result<OAuthProfile, OAuthError> {
        let http_client = oauth2::reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OAuthError::Configuration(format!("HTTP client: {}", e)))?;

        let mut request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Borrowed(&self.redirect_url));
        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(verifier);
        }

        let token = request
            .request_async(&http_client)
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("{:?}", e)))?;

        self.fetch_profile(token.access_token().secret()).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, OAuthError> {
        match self.provider {
            AuthProvider::Google => {
                let info: GoogleUserInfo = self.get_json(GOOGLE_USERINFO_URL, access_token).await?;
                google_profile(info)
            }
            AuthProvider::Github => {
                let user: GithubUser = self.get_json(GITHUB_USER_URL, access_token).await?;
                let emails = if user.email.is_some() {
                    Vec::new()
                } else {
                    self.get_json::<Vec<GithubEmail>>(GITHUB_EMAILS_URL, access_token)
                        .await
                        .unwrap_or_else(|e| {
                            tracing::debug!(error = %e, "GitHub email list unavailable");
                            Vec::new()
                        })
                };
                Ok(github_profile(user, &emails))
            }
            AuthProvider::Facebook => {
                let user: FacebookUser = self
                    .http_client
                    .get(FACEBOOK_ME_URL)
                    .query(&[
                        ("fields", "id,name,email,picture.type(large)"),
                        ("access_token", access_token),
                    ])
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| OAuthError::Profile(e.to_string()))?
                    .json()
                    .await
                    .map_err(|e| OAuthError::Profile(e.to_string()))?;
                Ok(facebook_profile(user))
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, OAuthError> {
        self.http_client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OAuthError::Profile(e.to_string()))?
            .json::<T>()
            .await
            .map_err(|e| OAuthError::Profile(e.to_string()))
    }
}

struct PendingLogin {
    provider: AuthProvider,
    pkce_verifier: Option<PkceCodeVerifier>,
    created_at: Instant,
}

/// In-memory store of authorization round trips keyed by CSRF state
///
/// Entries are single use and expire after their TTL.
pub struct PendingLogins {
    entries: DashMap<String, PendingLogin>,
    ttl: Duration,
}

impl Default for PendingLogins {
    fn default() -> Self {
        Self::new(PENDING_LOGIN_TTL)
    }
}

impl PendingLogins {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Records a login started for `provider`, dropping stale entries first
    pub fn insert(&self, state: String, provider: AuthProvider, pkce_verifier: Option<PkceCodeVerifier>) {
        self.purge_expired();
        self.entries.insert(
            state,
            PendingLogin {
                provider,
                pkce_verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Redeems a state
    ///
    /// Returns `None` for unknown or expired states and for states issued to
    /// another provider. The entry is consumed either way.
    pub fn take(&self, state: &str, provider: AuthProvider) -> Option<Option<PkceCodeVerifier>> {
        let (_, login) = self.entries.remove(state)?;

        if login.provider != provider || login.created_at.elapsed() > self.ttl {
            return None;
        }

        Some(login.pkce_verifier)
    }

    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, login| login.created_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

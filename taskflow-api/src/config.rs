/// Configuration for the API server
///
/// Values come from environment variables, with a `.env` file loaded first
/// when present.
///
/// # Environment Variables
///
/// - `API_HOST` (default `0.0.0.0`), `API_PORT` or `PORT` (default 5000)
/// - `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS` (default 10)
/// - `JWT_SECRET` (required, at least 32 characters), `JWT_EXPIRATION_DAYS` (default 7)
/// - `CLIENT_URL` (default `http://localhost:5173`): where OAuth logins land
/// - `PUBLIC_URL`: externally visible base URL used for OAuth callbacks
/// - `CORS_ORIGINS`: comma separated, defaults to `CLIENT_URL`; `*` allows any origin
/// - `APP_ENV`: `production` turns on HSTS
/// - `LOG_FORMAT`: `json` for JSON logs
/// - `TRUST_PROXY`: `true` keys rate limits by `X-Forwarded-For`
/// - `{GOOGLE,GITHUB,FACEBOOK}_CLIENT_{ID,SECRET}`: a provider is enabled when both are set
///
/// # Example
///
/// ```no_run
/// use taskflow_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use taskflow_shared::auth::{jwt::DEFAULT_EXPIRATION_DAYS, oauth::AuthProvider};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub oauth: OAuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Base URL the server is reachable at, without trailing slash
    pub public_url: String,

    /// Frontend base URL, without trailing slash
    pub client_url: String,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,

    /// Behind a reverse proxy that sets `X-Forwarded-For`
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret; at least 32 bytes
    pub secret: String,

    /// Session lifetime in days
    pub expiration_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Credentials of the enabled OAuth providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub google: Option<OAuthCredentials>,
    pub github: Option<OAuthCredentials>,
    pub facebook: Option<OAuthCredentials>,
}

impl OAuthConfig {
    pub fn credentials(&self, provider: AuthProvider) -> Option<&OAuthCredentials> {
        match provider {
            AuthProvider::Google => self.google.as_ref(),
            AuthProvider::Github => self.github.as_ref(),
            AuthProvider::Facebook => self.facebook.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

fn parse_or<T: FromStr>(value: Option<String>, default: T, name: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match value.filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(
            lookup("API_PORT").or_else(|| lookup("PORT")),
            DEFAULT_PORT,
            "API_PORT",
        )?;

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = parse_or(lookup("DATABASE_MAX_CONNECTIONS"), 10u32, "DATABASE_MAX_CONNECTIONS")?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        let expiration_days = parse_or(lookup("JWT_EXPIRATION_DAYS"), DEFAULT_EXPIRATION_DAYS, "JWT_EXPIRATION_DAYS")?;
        if expiration_days < 1 {
            anyhow::bail!("JWT_EXPIRATION_DAYS must be at least 1");
        }

        let client_url = trim_url(lookup("CLIENT_URL").unwrap_or_else(|| DEFAULT_CLIENT_URL.to_string()));
        let public_url = trim_url(
            lookup("PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{}", port)),
        );
        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            _ => vec![client_url.clone()],
        };

        let production = lookup("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let trust_proxy = lookup("TRUST_PROXY")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);
        let json_logs = lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let credentials = |prefix: &str| -> Option<OAuthCredentials> {
            let id = lookup(&format!("{}_CLIENT_ID", prefix)).filter(|v| !v.is_empty())?;
            let secret = lookup(&format!("{}_CLIENT_SECRET", prefix)).filter(|v| !v.is_empty())?;
            Some(OAuthCredentials {
                client_id: id,
                client_secret: secret,
            })
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                public_url,
                client_url,
                cors_origins,
                production,
                trust_proxy,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expiration_days,
            },
            oauth: OAuthConfig {
                google: credentials("GOOGLE"),
                github: credentials("GITHUB"),
                facebook: credentials("FACEBOOK"),
            },
            logging: LoggingConfig { json: json_logs },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Callback URL registered with an OAuth provider
    pub fn oauth_callback_url(&self, provider: AuthProvider) -> String {
        format!("{}/api/auth/{}/callback", self.api.public_url, provider)
    }
}

/// User accounts and their queries
///
/// A user signs up with email and password, or arrives through an OAuth
/// provider, or both (a provider id gets linked to an existing account with
/// the same email). Emails are trimmed and lowercased before they are stored
/// or looked up.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL UNIQUE,
///     password_hash TEXT,
///     google_id TEXT UNIQUE,
///     github_id TEXT UNIQUE,
///     facebook_id TEXT UNIQUE,
///     name TEXT NOT NULL,
///     avatar_url TEXT,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "Ada@Example.com".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     name: "Ada".to_string(),
///     avatar_url: None,
///     email_verified: true,
/// })
/// .await?;
///
/// assert_eq!(user.email, "ada@example.com");
/// assert!(User::email_exists(&pool, "ADA@example.com").await?);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::oauth::{AuthProvider, OAuthProfile};

const USER_COLUMNS: &str = "id, email, password_hash, google_id, github_id, facebook_id, name, \
     avatar_url, email_verified, created_at, updated_at, last_login_at";

/// Canonical form of an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn provider_column(provider: AuthProvider) -> &'static str {
    match provider {
        AuthProvider::Google => "google_id",
        AuthProvider::Github => "github_id",
        AuthProvider::Facebook => "facebook_id",
    }
}

/// User account row
///
/// The password hash stays on this type; API responses go through
/// [`UserProfile`] or [`UserSummary`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Normalised email, unique across users
    pub email: String,

    /// Argon2id hash; `None` for accounts created through OAuth
    pub password_hash: Option<String>,

    pub google_id: Option<String>,
    pub github_id: Option<String>,
    pub facebook_id: Option<String>,

    pub name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

/// Profile fields a user may change themselves
///
/// `avatar_url: Some(None)` clears the avatar.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub avatar_url: Option<Option<String>>,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Provider subject id linked to this account, if any
    pub fn provider_id(&self, provider: AuthProvider) -> Option<&str> {
        match provider {
            AuthProvider::Google => self.google_id.as_deref(),
            AuthProvider::Github => self.github_id.as_deref(),
            AuthProvider::Facebook => self.facebook_id.as_deref(),
        }
    }

    /// First linked provider, in Google, GitHub, Facebook order
    pub fn oauth_provider(&self) -> Option<AuthProvider> {
        AuthProvider::ALL
            .into_iter()
            .find(|p| self.provider_id(*p).is_some())
    }

    pub fn has_oauth_provider(&self) -> bool {
        self.oauth_provider().is_some()
    }

    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` if the email is taken
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, name, avatar_url, email_verified)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.name.trim())
            .bind(data.avatar_url)
            .bind(data.email_verified)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Looks a user up by email, ignoring case and surrounding whitespace
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(normalize_email(email))
            .fetch_one(pool)
            .await
    }

    /// Finds the account holding this provider id, or else the one with this email
    pub async fn find_by_provider_or_email(
        pool: &PgPool,
        provider: AuthProvider,
        provider_id: &str,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let column = provider_column(provider);
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE {column} = $1 OR email = $2
             ORDER BY ({column} = $1) IS TRUE DESC
             LIMIT 1"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(provider_id)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Links a provider id to an existing account and refreshes the avatar
    pub async fn link_provider(
        pool: &PgPool,
        id: Uuid,
        provider: AuthProvider,
        provider_id: &str,
        avatar_url: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let column = provider_column(provider);
        let sql = format!(
            "UPDATE users
             SET {column} = $2, avatar_url = COALESCE($3, avatar_url), updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(provider_id)
            .bind(avatar_url)
            .fetch_one(pool)
            .await
    }

    /// Resolves the account for a completed OAuth login
    ///
    /// - an account with this provider id, or this email, is returned
    /// - a matching email account without the provider id gets it linked
    /// - otherwise a verified, passwordless account is created
    pub async fn find_or_create_oauth(pool: &PgPool, profile: &OAuthProfile) -> Result<Self, sqlx::Error> {
        let existing = Self::find_by_provider_or_email(
            pool,
            profile.provider,
            &profile.provider_id,
            &profile.email,
        )
        .await?;

        if let Some(user) = existing {
            if user.provider_id(profile.provider).is_some() {
                return Ok(user);
            }

            tracing::info!(
                user_id = %user.id,
                provider = %profile.provider,
                "Linking OAuth provider to existing account"
            );
            return Self::link_provider(
                pool,
                user.id,
                profile.provider,
                &profile.provider_id,
                profile.avatar_url.as_deref(),
            )
            .await;
        }

        let column = provider_column(profile.provider);
        let sql = format!(
            "INSERT INTO users (email, {column}, name, avatar_url, email_verified)
             VALUES ($1, $2, $3, $4, TRUE)
             RETURNING {USER_COLUMNS}"
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(&profile.email))
            .bind(&profile.provider_id)
            .bind(&profile.name)
            .bind(&profile.avatar_url)
            .fetch_one(pool)
            .await?;

        tracing::info!(user_id = %user.id, provider = %profile.provider, "Created user from OAuth login");
        Ok(user)
    }

    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let (set_avatar, avatar) = match data.avatar_url {
            Some(value) => (true, value),
            None => (false, None),
        };

        let sql = format!(
            "UPDATE users
             SET name = COALESCE($2, name),
                 avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(data.name.map(|n| n.trim().to_string()))
            .bind(set_avatar)
            .bind(avatar)
            .fetch_optional(pool)
            .await
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

/// Account as returned by the auth endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    /// First linked OAuth provider, `None` for local-only accounts
    pub auth_provider: Option<AuthProvider>,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            email_verified: user.email_verified,
            auth_provider: user.oauth_provider(),
            has_password: user.has_password(),
            created_at: user.created_at,
        }
    }
}

/// Public identity embedded in populated tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

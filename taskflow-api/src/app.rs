/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use taskflow_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = taskflow_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{DefaultBodyLimit, Query, Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc, time::Duration};
use taskflow_shared::{
    auth::{
        middleware::authenticate,
        oauth::{AuthProvider, OAuthClient, OAuthError, PendingLogins},
    },
    events::EventHub,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state
///
/// Cloned into every handler; everything heavy sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,

    pub config: Arc<Config>,

    /// Live event rooms, one per connected user
    pub hub: Arc<EventHub>,

    pub auth_limiter: Arc<RateLimiter>,

    pub api_limiter: Arc<RateLimiter>,

    /// Clients of the configured OAuth providers
    pub oauth: Arc<HashMap<AuthProvider, OAuthClient>>,

    /// CSRF states of logins waiting for their callback
    pub pending_logins: Arc<PendingLogins>,
}

impl AppState {
    /// Creates application state, building an OAuth client for every provider
    /// with credentials
    ///
    /// # Errors
    ///
    /// Returns an error if a provider's URLs cannot be built
    pub fn new(db: PgPool, config: Config) -> Result<Self, OAuthError> {
        let mut oauth = HashMap::new();
        for provider in AuthProvider::ALL {
            if let Some(credentials) = config.oauth.credentials(provider) {
                let client = OAuthClient::new(
                    provider,
                    &credentials.client_id,
                    &credentials.client_secret,
                    &config.oauth_callback_url(provider),
                )?;
                tracing::info!(provider = %provider, redirect_url = client.redirect_url(), "OAuth provider enabled");
                oauth.insert(provider, client);
            }
        }

        let trust_proxy = config.api.trust_proxy;

        Ok(Self {
            db,
            config: Arc::new(config),
            hub: Arc::new(EventHub::default()),
            auth_limiter: Arc::new(RateLimiter::auth().trust_proxy(trust_proxy)),
            api_limiter: Arc::new(RateLimiter::api().trust_proxy(trust_proxy)),
            oauth: Arc::new(oauth),
            pending_logins: Arc::new(PendingLogins::default()),
        })
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Issues a session token for `user_id`
    pub fn issue_token(&self, user_id: uuid::Uuid) -> Result<String, ApiError> {
        Ok(taskflow_shared::auth::jwt::issue_session_token(
            user_id,
            self.jwt_secret(),
            self.config.jwt.expiration_days,
        )?)
    }

    pub fn oauth_client(&self, provider: AuthProvider) -> Option<&OAuthClient> {
        self.oauth.get(&provider)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /api/health                   # Health check (public)
/// ├── /api/auth/
/// │   ├── POST /signup              # rate limited
/// │   ├── POST /signin              # rate limited
/// │   ├── GET  /check-email/:email
/// │   ├── GET  /me                  # JWT
/// │   ├── PUT  /profile             # JWT
/// │   ├── POST /logout
/// │   ├── GET  /{provider}          # OAuth redirect
/// │   └── GET  /{provider}/callback
/// ├── /api/tasks/                   # JWT + rate limited
/// │   ├── GET, POST /
/// │   ├── GET  /stats
/// │   ├── GET, PUT, DELETE /:id
/// │   └── POST /:id/share
/// └── /socket                       # WebSocket, token in query or header
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, tracing, compression, body limit.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let credential_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/signin", post(routes::auth::signin))
        .route_layer(from_fn_with_state(state.auth_limiter.clone(), rate_limit_layer));

    let account_routes = Router::new()
        .route("/me", get(routes::auth::me))
        .route("/profile", put(routes::auth::update_profile))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let mut auth_routes = Router::new()
        .route("/check-email/:email", get(routes::auth::check_email))
        .route("/logout", post(routes::auth::logout))
        .merge(credential_routes)
        .merge(account_routes);

    for provider in AuthProvider::ALL {
        auth_routes = auth_routes
            .route(
                &format!("/{}", provider),
                get(move |State(state): State<AppState>| routes::oauth::authorize(state, provider)),
            )
            .route(
                &format!("/{}/callback", provider),
                get(
                    move |State(state): State<AppState>, Query(params): Query<routes::oauth::CallbackParams>| {
                        routes::oauth::callback(state, provider, params)
                    },
                ),
            );
    }

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks).post(routes::tasks::create_task))
        .route("/stats", get(routes::tasks::task_stats))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/share", post(routes::tasks::share_task))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer))
        .route_layer(from_fn_with_state(state.api_limiter.clone(), rate_limit_layer));

    let api_routes = Router::new()
        .merge(health_routes)
        .nest("/auth", auth_routes)
        .nest("/tasks", task_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/socket", get(routes::socket::socket_handler))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects [`AuthContext`] into request
/// extensions.
///
/// [`AuthContext`]: taskflow_shared::auth::middleware::AuthContext
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(req.headers(), state.jwt_secret()).map_err(|e| {
        tracing::warn!(path = %req.uri().path(), reason = e.message(), "Rejected request");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
///
/// Passed to `with_graceful_shutdown`. A signal that cannot be listened for
/// is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, draining connections..."),
        _ = terminate => tracing::info!("SIGTERM received, draining connections..."),
    }
}

//! # TaskFlow API Server
//!
//! Loads configuration from the environment (and `.env`), migrates the
//! database and serves the API until Ctrl+C or SIGTERM.
//!
//! ```bash
//! cargo run -p taskflow-api
//! ```

use std::net::SocketAddr;
use taskflow_api::{
    app::{build_router, shutdown_signal, AppState},
    config::Config,
};
use taskflow_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.logging.json);

    tracing::info!("TaskFlow API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let db = create_pool(
        DatabaseConfig::new(config.database.url.clone()).with_max_connections(config.database.max_connections),
    )
    .await?;
    run_migrations(&db).await?;

    let addr = config.bind_address();
    let state = AppState::new(db.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskflow_api=debug,taskflow_shared=info,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

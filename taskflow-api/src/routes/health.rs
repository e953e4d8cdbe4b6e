/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /api/health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "OK",
///   "version": "0.1.0",
///   "database": "connected",
///   "timestamp": "2025-01-01T12:00:00Z"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskflow_shared::db::pool;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `OK`, or `degraded` when the database is unreachable
    pub status: String,

    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    pub timestamp: DateTime<Utc>,
}

/// Reports service health; always answers 200 so load balancers can read the body
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match pool::health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    Json(HealthResponse {
        status: if connected { "OK" } else { "degraded" }.to_string(),
        version: taskflow_shared::VERSION.to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        timestamp: Utc::now(),
    })
}

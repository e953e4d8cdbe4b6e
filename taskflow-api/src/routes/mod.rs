/// API route handlers
///
/// - `health`: health check
/// - `auth`: local accounts (signup, signin, profile)
/// - `oauth`: Google, GitHub and Facebook login
/// - `tasks`: task CRUD, sharing, listing and stats
/// - `socket`: live task events over WebSocket

pub mod auth;
pub mod health;
pub mod oauth;
pub mod socket;
pub mod tasks;

use crate::error::ApiError;

/// Fallback for unmatched routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// Deserializes a present field into `Some`, so `null` becomes `Some(None)`
///
/// Use with `#[serde(default, deserialize_with = "deserialize_some")]` on an
/// `Option<Option<T>>` to tell an absent field from an explicit `null`.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

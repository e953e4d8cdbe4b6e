/// Request extractors
///
/// [`ApiJson`] replaces `axum::Json` for request bodies so that malformed
/// or mistyped JSON answers with the usual [`ApiError`] body instead of a
/// plain-text rejection.

use crate::error::ApiError;
use axum::extract::FromRequest;

/// JSON request body
///
/// - Missing field or wrong type: 400 `validation_error`
/// - Syntax error or missing `Content-Type: application/json`: 400 `bad_request`
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

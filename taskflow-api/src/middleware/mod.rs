/// Middleware for the API server
///
/// - Security headers on every response
/// - Per-IP rate limiting on the auth and task routes

pub mod rate_limit;
pub mod security;

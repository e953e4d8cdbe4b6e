//! # TaskFlow Shared Library
//!
//! Types, persistence and auth primitives used by the TaskFlow API server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, JWT, request auth context and OAuth clients
//! - `db`: connection pool and migrations
//! - `models`: users, tasks and task shares with their queries
//! - `events`: live task events and the per-user broadcast hub

pub mod auth;
pub mod db;
pub mod events;
pub mod models;

/// Current version of the TaskFlow shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # TaskFlow API Server Library
//!
//! HTTP and WebSocket surface of TaskFlow: local and OAuth sign-in, task CRUD
//! with sharing, and live task events.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON body extractor with API-shaped rejections
//! - `middleware`: Rate limiting and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;

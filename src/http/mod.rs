//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the liveness, health and conversion endpoints
//! - One conversion handler per accepted source format
//! - JSON error bodies
//! - CORS and request body limits
//! - Request logging

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;

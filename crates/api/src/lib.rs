//! HTTP API layer for courier.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: notification, template, campaign and device token routes
//! - **Middleware**: shared application state
//! - **Response**: the JSON envelope used by every endpoint
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;

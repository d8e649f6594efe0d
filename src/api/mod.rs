//! API layer - HTTP handlers and middleware
//!
//! Routes, handlers, authentication and rate limiting middleware, and the
//! extractors that validate request input.

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

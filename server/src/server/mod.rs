//! HTTP server module for the dispatch engine.
//!
//! - Application state shared by handlers
//! - Health, readiness and metrics endpoints
//! - Router configuration

pub mod health;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;

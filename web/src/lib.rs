//! Axum integration for the Rush dispatch engine.
//!
//! The application crate owns routes and handlers; this crate supplies the
//! pieces every handler shares.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        HTTP / WebSocket (Axum)          │  ← correlation span, JSON bodies
//! ├─────────────────────────────────────────┤
//! │  AppError  ◄── DispatchError            │  ← status mapping, hidden causes
//! │  socket::pump ◄── Broker receivers      │  ← live topic fan-in
//! ├─────────────────────────────────────────┤
//! │        Application services             │
//! └─────────────────────────────────────────┘
//! ```

pub mod error;
pub mod middleware;
pub mod socket;

pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

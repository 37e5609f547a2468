//! # Rush Dispatch Server
//!
//! HTTP and WebSocket front of the order lifecycle and real-time dispatch
//! engine of a delivery marketplace.
//!
//! ```text
//!  HTTP mutation ──► service ──► OrderStore::transition (row lock, one commit)
//!                                   │
//!                                   └─ after commit ──► JobQueue::enqueue(FanOutJob)
//!                                                             │
//!  FanOutWorker pool ◄────────────────────────────────────────┘
//!        ├─► Notification rows (customer, rider, merchant)
//!        └─► Broker topics ──► /ws/... sockets
//! ```
//!
//! # Modules
//!
//! - [`app`]: application services and the fan-out worker
//! - [`api`]: request handlers by role, plus WebSocket endpoints
//! - [`auth`]: bearer token resolution into a principal
//! - [`server`]: state, router, health
//! - [`bootstrap`]: wiring from configuration
//! - [`config`]: environment configuration

#![forbid(unsafe_code)]

pub mod api;
pub mod app;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod server;

pub use bootstrap::Application;
pub use config::Config;

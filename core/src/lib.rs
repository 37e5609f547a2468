//! # Rush Core
//!
//! Domain model of the Rush dispatch engine: the part of the delivery
//! marketplace that prices carts, moves orders through their lifecycle while
//! four kinds of actors compete for them, and describes every committed change
//! as work for the fan-out pipeline.
//!
//! ## Components
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐
//!  │   pricing    │◄──│    quote     │◄── CatalogStore + FeeSettings
//!  └──────────────┘   └──────┬───────┘
//!                            │ OrderDraft
//!                            ▼
//!  ┌──────────────┐   ┌──────────────┐
//!  │    order     │◄──│  lifecycle   │◄── OrderStore::transition (row lock)
//!  └──────────────┘   └──────┬───────┘
//!                            │ TransitionOutcome
//!                            ▼
//!                     ┌──────────────┐
//!                     │  messaging   │──► FanOutJob, Topic, Notification
//!                     └──────────────┘
//! ```
//!
//! Everything here is deterministic. Time is passed in (see
//! [`environment::Clock`]) and I/O happens behind the traits in [`store`].

pub mod access;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod messaging;
pub mod order;
pub mod pricing;
pub mod quote;
pub mod store;
pub mod types;

pub use chrono::{DateTime, Utc};
pub use error::{DispatchError, Result};
pub use identity::{Capability, Principal, Role};
pub use order::{Order, OrderStatus};
pub use types::{Money, OrderId, UserId};

/// Environment module - Injected dependencies
pub mod environment {
    use super::{DateTime, Utc};

    /// Clock trait for time operations
    ///
    /// Services take their timestamps from a clock so tests can pin time.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

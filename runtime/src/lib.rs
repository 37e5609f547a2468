//! # Rush Runtime
//!
//! Asynchronous plumbing between a committed order change and the clients that
//! want to hear about it.
//!
//! ```text
//!  commit ─► JobQueue::enqueue ─► JobRunner workers ─► JobHandler
//!                                     │ retry::RetryPolicy      │
//!                                     ▼                         ▼
//!                          dispatch_jobs_total         Broker::publish(topic)
//!                                                               │
//!                                                               ▼
//!                                                  Broker::subscribe(topic)
//! ```
//!
//! - [`jobs`]: bounded worker pool with at-least-once execution
//! - [`retry`]: exponential backoff with a retry budget
//! - [`broker`]: topic pub/sub, in-process or Redis-backed
//! - [`metrics`]: Prometheus recorder and the engine's counters

pub mod broker;
pub mod jobs;
pub mod metrics;
pub mod retry;

pub use broker::{Broker, BrokerError, InProcessBroker, RedisBroker};
pub use jobs::{JobError, JobHandler, JobQueue, JobRunner, JobRunnerConfig, JobSender};
pub use retry::RetryPolicy;

//! Application assembly.
//!
//! Wires storage, broker, fan-out pool, services and router together:
//!
//! ```text
//! Config ──► PgStore (migrated) ─────────────┐
//!        ──► RedisBroker | InProcessBroker ──┼──► FanOutWorker ──► JobRunner
//!        ──► SignedTokenIdentity             │                        │ sender
//!                                            └──► Services ◄──────────┘
//!                                                    │
//!                                                    ▼
//!                                         AppState ──► Router
//! ```
//!
//! Tests call [`Application::assemble`] with in-memory parts.

use crate::app::{FanOutWorker, ServiceContext, Services};
use crate::auth::{IdentityProvider, SignedTokenIdentity};
use crate::config::Config;
use crate::server::{AppState, build_router};
use anyhow::Context;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use rush_core::environment::{Clock, SystemClock};
use rush_core::messaging::FanOutJob;
use rush_core::store::DispatchStore;
use rush_postgres::PgStore;
use rush_runtime::{Broker, InProcessBroker, JobRunner, JobRunnerConfig, RedisBroker};
use std::sync::Arc;
use std::time::Duration;

/// Redis channel patterns relayed into local subscribers.
const BROKER_PATTERNS: [&str; 2] = ["order:*", "user:*"];

/// A wired application with its running fan-out pool.
pub struct Application {
    state: AppState,
    runner: JobRunner<FanOutJob>,
}

impl Application {
    /// Wires the application from ready-made parts and starts the fan-out pool.
    #[must_use]
    pub fn assemble(
        store: Arc<dyn DispatchStore>,
        broker: Arc<dyn Broker>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityProvider>,
        fanout: JobRunnerConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let worker = Arc::new(FanOutWorker::new(
            Arc::clone(&store),
            Arc::clone(&broker),
            Arc::clone(&clock),
        ));
        let runner = JobRunner::start(worker, fanout);

        let ctx = ServiceContext::new(Arc::clone(&store), Arc::new(runner.sender()), clock);
        let state = AppState::new(Services::new(&ctx), identity, broker, store, metrics);

        Self { state, runner }
    }

    /// Connects to every dependency named in `config`.
    ///
    /// # Errors
    ///
    /// Fails when the database or Redis is unreachable or a migration fails.
    pub async fn from_config(config: &Config, metrics: Option<PrometheusHandle>) -> anyhow::Result<Self> {
        tracing::info!("Connecting to database...");
        let store = tokio::time::timeout(
            Duration::from_secs(config.database.connect_timeout),
            PgStore::connect(&config.database.url, config.database.max_connections),
        )
        .await
        .context("database connection timed out")?
        .context("database connection failed")?
        .with_default_fee(config.pricing.default_delivery_fee);
        store.migrate().await.context("database migration failed")?;
        tracing::info!("Database ready");

        let broker: Arc<dyn Broker> = match &config.broker.redis_url {
            Some(url) => {
                tracing::info!("Connecting to Redis broker...");
                Arc::new(
                    RedisBroker::connect(url, &BROKER_PATTERNS)
                        .await
                        .context("redis connection failed")?,
                )
            }
            None => {
                tracing::info!("REDIS_URL not set, using the in-process broker");
                Arc::new(InProcessBroker::new())
            }
        };

        let identity = Arc::new(SignedTokenIdentity::new(config.auth.token_secret.clone()));

        Ok(Self::assemble(
            Arc::new(store),
            broker,
            Arc::new(SystemClock),
            identity,
            config.fanout.runner_config(),
            metrics,
        ))
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// The HTTP router over this application's state.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Stops the fan-out pool, letting in-flight jobs finish within `timeout`.
    pub async fn shutdown(self, timeout: Duration) {
        self.runner.shutdown(timeout).await;
    }
}

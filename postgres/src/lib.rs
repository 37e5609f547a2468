//! `PostgreSQL` storage for the Rush dispatch engine.
//!
//! [`PgStore`] implements every storage port of `rush-core` on one connection
//! pool:
//!
//! - Catalog, addresses and the flat delivery fee
//! - Orders with their items, tracking log and payment ledger
//! - Rider availability, notifications and chat
//!
//! Order creation writes the order, its items, payment, `INIT` ledger entry
//! and `CREATED` event in one transaction. Transitions lock the order row with
//! `SELECT … FOR UPDATE`, so concurrent commands on one order are serialized
//! and the loser of an acceptance race observes the winner's rider.
//!
//! # Example
//!
//! ```no_run
//! use rush_postgres::PgStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PgStore::connect("postgres://localhost/rush", 10).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use rush_core::DispatchError;
use rush_core::pricing::DEFAULT_DELIVERY_FEE;
use rush_core::store::DispatchStore;
use rush_core::types::Money;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

mod activity;
mod catalog;
mod orders;
mod rows;

/// Storage adapter over a `PostgreSQL` pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    default_fee: Money,
}

impl PgStore {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            default_fee: DEFAULT_DELIVERY_FEE,
        }
    }

    /// Fee reported while no flat fee has been stored.
    #[must_use]
    pub fn with_default_fee(mut self, fee: Money) -> Self {
        self.default_fee = fee;
        self
    }

    /// Opens a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Storage`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DispatchError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| DispatchError::Storage(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), DispatchError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DispatchError::Storage(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DispatchStore for PgStore {
    async fn ping(&self) -> Result<(), DispatchError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(rows::db_err)?;
        Ok(())
    }
}

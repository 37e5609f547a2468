//! # Rush Testing
//!
//! Test doubles for the Rush dispatch engine.
//!
//! This crate provides:
//! - [`InMemoryStore`]: every storage port in memory, with per-order locking
//! - [`mocks::FixedClock`]: deterministic, manually advanced time
//! - [`RecordingJobQueue`]: captures fan-out jobs instead of running them
//! - [`fixtures::Marketplace`]: a seeded merchant, branch, customer and riders
//!
//! ## Example
//!
//! ```ignore
//! use rush_testing::{InMemoryStore, fixtures::Marketplace, mocks::test_clock};
//!
//! #[tokio::test]
//! async fn test_quote() {
//!     let store = InMemoryStore::new();
//!     let market = Marketplace::seed(&store, test_clock().now()).await;
//!     let quote = build_quote(&store, market.customer.user_id, &market.cart(2)).await?;
//!     assert_eq!(quote.pricing.total.to_string(), "25.00");
//! }
//! ```

use async_trait::async_trait;
use rush_runtime::{JobError, JobQueue};
use tokio::sync::Mutex;

mod memory;

pub use memory::InMemoryStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use chrono::{DateTime, Duration, Utc};
    use rush_core::environment::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that only moves when told to.
    ///
    /// # Example
    ///
    /// ```
    /// use rush_testing::mocks::test_clock;
    /// use rush_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = test_clock();
    /// let before = clock.now();
    /// assert_eq!(before, clock.now());
    /// clock.advance(Duration::minutes(30));
    /// assert_eq!(clock.now() - before, Duration::minutes(30));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        millis: AtomicI64,
    }

    impl FixedClock {
        /// Create a clock frozen at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                millis: AtomicI64::new(time.timestamp_millis()),
            }
        }

        /// Moves the clock forward.
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default(),
        )
    }
}

/// Job queue that keeps every job it is given.
pub struct RecordingJobQueue<J> {
    jobs: Mutex<Vec<J>>,
    closed: std::sync::atomic::AtomicBool,
}

impl<J> Default for RecordingJobQueue<J> {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl<J: Clone> RecordingJobQueue<J> {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs enqueued so far, oldest first.
    pub async fn jobs(&self) -> Vec<J> {
        self.jobs.lock().await.clone()
    }

    /// Makes every later enqueue fail as if the runner had shut down.
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl<J: Send + Sync> JobQueue<J> for RecordingJobQueue<J> {
    async fn enqueue(&self, job: J) -> Result<(), JobError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(JobError::QueueClosed);
        }
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

/// Seeded marketplace data.
pub mod fixtures {
    use chrono::{DateTime, Utc};
    use rush_core::catalog::{Branch, CustomerAddress, InventoryItem};
    use rush_core::quote::{CartLine, QuoteRequest};
    use rush_core::store::{CatalogStore, RiderStore};
    use rush_core::types::{AddressId, AddressSnapshot, BranchId, Coordinates, ItemId, Money};
    use rush_core::{Principal, Role, UserId};

    /// Address used for both pickup and dropoff fixtures.
    #[must_use]
    pub fn address(line1: &str) -> AddressSnapshot {
        AddressSnapshot {
            line1: line1.to_string(),
            line2: String::new(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
            coordinates: Some(Coordinates::new(39.78, -89.65)),
        }
    }

    /// One merchant with one branch, one customer with one address, two
    /// registered riders (offline) and an admin.
    ///
    /// The branch sells item X at 10.00 and lists an inactive item Y.
    #[derive(Clone, Debug)]
    pub struct Marketplace {
        /// Owner of `branch`
        pub merchant: Principal,
        /// A merchant owning nothing
        pub other_merchant: Principal,
        /// Owner of `address`
        pub customer: Principal,
        /// A customer with no orders
        pub other_customer: Principal,
        /// First rider
        pub rider: Principal,
        /// Second rider
        pub other_rider: Principal,
        /// Operator
        pub admin: Principal,
        /// The merchant's branch
        pub branch: BranchId,
        /// Active item priced 10.00
        pub item: ItemId,
        /// Inactive item
        pub inactive_item: ItemId,
        /// The customer's address
        pub address: AddressId,
    }

    impl Marketplace {
        /// Writes the fixture records into `store`.
        ///
        /// # Panics
        ///
        /// Panics if the store rejects an insert.
        #[allow(clippy::expect_used)]
        pub async fn seed<S: CatalogStore + RiderStore + ?Sized>(store: &S, at: DateTime<Utc>) -> Self {
            let market = Self {
                merchant: Principal::new(UserId::new(), Role::Merchant),
                other_merchant: Principal::new(UserId::new(), Role::Merchant),
                customer: Principal::new(UserId::new(), Role::Customer),
                other_customer: Principal::new(UserId::new(), Role::Customer),
                rider: Principal::new(UserId::new(), Role::Rider),
                other_rider: Principal::new(UserId::new(), Role::Rider),
                admin: Principal::new(UserId::new(), Role::Admin),
                branch: BranchId::new(),
                item: ItemId::new(),
                inactive_item: ItemId::new(),
                address: AddressId::new(),
            };

            store
                .insert_branch(&Branch {
                    id: market.branch,
                    merchant_id: market.merchant.user_id,
                    name: "Downtown".to_string(),
                    address: address("1 Market St"),
                    created_at: at,
                })
                .await
                .expect("branch insert");

            for (id, name, is_active) in [
                (market.item, "Item X", true),
                (market.inactive_item, "Item Y", false),
            ] {
                store
                    .insert_item(&InventoryItem {
                        id,
                        branch_id: market.branch,
                        name: name.to_string(),
                        description: String::new(),
                        price: Money::from_cents(1000),
                        stock: 10,
                        is_active,
                        created_at: at,
                    })
                    .await
                    .expect("item insert");
            }

            store
                .insert_address(&CustomerAddress {
                    id: market.address,
                    customer_id: market.customer.user_id,
                    label: "Home".to_string(),
                    address: address("742 Evergreen Ter"),
                    created_at: at,
                })
                .await
                .expect("address insert");

            for rider in [market.rider, market.other_rider] {
                store
                    .set_availability(rider.user_id, false, at)
                    .await
                    .expect("rider insert");
            }

            market
        }

        /// A cart of `quantity` × item X delivered to the customer's address.
        #[must_use]
        pub fn cart(&self, quantity: u32) -> QuoteRequest {
            QuoteRequest {
                branch_id: self.branch,
                address_id: self.address,
                items: vec![CartLine {
                    item_id: self.item,
                    quantity,
                }],
            }
        }
    }
}

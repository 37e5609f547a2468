//! Shared harness for the server integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use rush_core::environment::Clock;
use rush_core::messaging::FanOutJob;
use rush_core::store::RiderStore;
use rush_core::{Order, OrderId, OrderStatus, Principal};
use rush_server::app::{PlaceOrder, ServiceContext, Services};
use rush_testing::fixtures::Marketplace;
use rush_testing::mocks::{FixedClock, test_clock};
use rush_testing::{InMemoryStore, RecordingJobQueue};
use std::sync::Arc;

/// Services over an in-memory store, with fan-out jobs recorded instead of run.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub jobs: Arc<RecordingJobQueue<FanOutJob>>,
    pub clock: Arc<FixedClock>,
    pub services: Services,
    pub market: Marketplace,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let jobs = Arc::new(RecordingJobQueue::new());
        let clock = Arc::new(test_clock());
        let market = Marketplace::seed(store.as_ref(), clock.now()).await;
        let ctx = ServiceContext::new(store.clone(), jobs.clone(), clock.clone());

        Self {
            store,
            jobs,
            clock,
            services: Services::new(&ctx),
            market,
        }
    }

    /// A `CREATED` order of two item X for the fixture customer.
    pub async fn place(&self) -> Order {
        self.services
            .orders
            .place(
                &self.market.customer,
                PlaceOrder {
                    cart: self.market.cart(2),
                    payment_provider: Default::default(),
                },
            )
            .await
            .unwrap()
    }

    /// A `CONFIRMED` order waiting for a rider.
    pub async fn confirmed(&self) -> Order {
        let order = self.place().await;
        self.services
            .orders
            .confirm(&self.market.customer, order.id, None)
            .await
            .unwrap()
    }

    /// An order accepted by the fixture rider.
    pub async fn assigned(&self) -> Order {
        let order = self.confirmed().await;
        self.services
            .assignment
            .accept(&self.market.rider, order.id)
            .await
            .unwrap()
    }

    pub async fn go_online(&self, rider: &Principal) {
        self.store
            .set_availability(rider.user_id, true, self.clock.now())
            .await
            .unwrap();
    }

    pub async fn statuses(&self, order: OrderId) -> Vec<OrderStatus> {
        self.services
            .orders
            .tracking(&self.market.admin, order)
            .await
            .unwrap()
            .events
            .into_iter()
            .map(|event| event.status)
            .collect()
    }
}

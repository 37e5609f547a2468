//! Application services - the operations HTTP and WebSocket handlers call.
//!
//! Every service follows the same shape:
//! 1. Check the caller's capability (and relationship to the order)
//! 2. Run the transactional store operation
//! 3. On commit, log, count and schedule a fan-out job
//! 4. Return the committed state
//!
//! Fan-out runs later on the [`FanOutWorker`] pool, so request latency never
//! depends on notification delivery.

mod assignment;
mod catalog;
mod fanout;
mod messaging;
mod orders;

pub use assignment::AssignmentService;
pub use catalog::{CatalogService, NewAddress, NewBranch, NewItem};
pub use fanout::FanOutWorker;
pub use messaging::MessagingService;
pub use orders::{OrderService, OrderTracking, PlaceOrder, QuoteView};

use rush_core::access::ensure_visible;
use rush_core::environment::Clock;
use rush_core::lifecycle::TransitionOutcome;
use rush_core::messaging::FanOutJob;
use rush_core::order::TrackingEvent;
use rush_core::store::DispatchStore;
use rush_core::{DispatchError, Order, OrderId, Principal, Result};
use rush_runtime::JobQueue;
use rush_runtime::metrics::record_transition;
use std::sync::Arc;

/// Handles shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    /// Storage ports
    pub store: Arc<dyn DispatchStore>,
    /// Fan-out scheduling
    pub jobs: Arc<dyn JobQueue<FanOutJob>>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl ServiceContext {
    /// Bundles the shared handles.
    #[must_use]
    pub fn new(
        store: Arc<dyn DispatchStore>,
        jobs: Arc<dyn JobQueue<FanOutJob>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, jobs, clock }
    }

    /// Loads an order the caller may see.
    ///
    /// Orders outside the caller's relationships are reported as missing.
    pub(crate) async fn visible_order(&self, principal: &Principal, id: OrderId) -> Result<Order> {
        let order = self
            .store
            .find_order(id)
            .await?
            .ok_or_else(|| DispatchError::not_found("order"))?;
        ensure_visible(principal, &order)?;
        Ok(order)
    }

    /// Schedules the status fan-out for a committed tracking event.
    ///
    /// The change is already durable, so a full or closed queue costs only the
    /// live push and is logged instead of failing the request.
    pub(crate) async fn schedule_status(&self, event: &TrackingEvent) {
        let job = FanOutJob::OrderStatus {
            order_id: event.order_id,
            status: event.status,
            tracking_event_id: event.id,
        };
        if let Err(e) = self.jobs.enqueue(job).await {
            tracing::warn!(
                order_id = %event.order_id,
                status = %event.status,
                error = %e,
                "Failed to schedule status fan-out"
            );
        }
    }

    /// Post-commit bookkeeping shared by every transition.
    pub(crate) async fn announce(&self, outcome: &TransitionOutcome) {
        tracing::info!(
            order_id = %outcome.order.id,
            from = %outcome.from,
            to = %outcome.order.status,
            "Order transitioned"
        );
        record_transition(outcome.order.status.as_str());
        self.schedule_status(&outcome.event).await;
    }
}

/// All services, cheaply cloneable into handler state.
#[derive(Clone)]
pub struct Services {
    /// Quoting, placement and the order lifecycle
    pub orders: Arc<OrderService>,
    /// Rider assignment and availability
    pub assignment: Arc<AssignmentService>,
    /// Branches, items, addresses, fees and analytics
    pub catalog: Arc<CatalogService>,
    /// Chat and notifications
    pub messaging: Arc<MessagingService>,
}

impl Services {
    /// Builds every service over one context.
    #[must_use]
    pub fn new(ctx: &ServiceContext) -> Self {
        Self {
            orders: Arc::new(OrderService::new(ctx.clone())),
            assignment: Arc::new(AssignmentService::new(ctx.clone())),
            catalog: Arc::new(CatalogService::new(ctx.clone())),
            messaging: Arc::new(MessagingService::new(ctx.clone())),
        }
    }
}

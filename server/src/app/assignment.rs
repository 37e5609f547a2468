//! Assignment coordinator.
//!
//! Many riders may try to accept the same confirmed order at once. The store
//! serializes them on the order's row lock and re-checks `CONFIRMED` with no
//! rider after the lock is taken, so exactly one accept commits and every
//! other one gets [`DispatchError::Conflict`] without writing anything.
//!
//! ```text
//! rider A ──accept──┐                    ┌──► ASSIGNED(rider A)   200
//!                   ├──► lock(order) ────┤
//! rider B ──accept──┘                    └──► Conflict            409, re-poll
//! ```

use super::ServiceContext;
use rush_core::lifecycle::OrderCommand;
use rush_core::store::{OrderFilter, RiderAvailability};
use rush_core::types::Coordinates;
use rush_core::{Capability, DispatchError, Order, OrderId, Principal, Result, UserId};
use rush_runtime::metrics::record_assignment_conflict;

/// Rider-facing assignment and availability service.
pub struct AssignmentService {
    ctx: ServiceContext,
}

impl AssignmentService {
    /// Creates the service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Self-accept of an unassigned `CONFIRMED` order.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Conflict`] when another rider won or the order is no
    /// longer `CONFIRMED`; the caller should refresh its list.
    pub async fn accept(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        principal.require(Capability::AcceptOrder)?;
        let command = OrderCommand::Accept {
            rider_id: principal.user_id,
        };

        match self
            .ctx
            .store
            .transition(order_id, command, self.ctx.clock.now())
            .await
        {
            Ok(outcome) => {
                self.ctx.announce(&outcome).await;
                Ok(outcome.order)
            }
            Err(err @ DispatchError::Conflict(_)) => {
                record_assignment_conflict();
                tracing::info!(
                    order_id = %order_id,
                    rider_id = %principal.user_id,
                    "Lost assignment race"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Admin override: assigns `rider_id` from any non-terminal status.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] when `rider_id` is not a registered rider
    /// - [`DispatchError::Conflict`] for delivered or canceled orders
    pub async fn reassign(
        &self,
        principal: &Principal,
        order_id: OrderId,
        rider_id: UserId,
    ) -> Result<Order> {
        principal.require(Capability::ReassignOrder)?;
        if self.ctx.store.find_rider(rider_id).await?.is_none() {
            return Err(DispatchError::not_found("rider"));
        }
        let outcome = self
            .ctx
            .store
            .transition(order_id, OrderCommand::Reassign { rider_id }, self.ctx.clock.now())
            .await?;
        tracing::info!(
            order_id = %order_id,
            rider_id = %rider_id,
            admin_id = %principal.user_id,
            "Order reassigned"
        );
        self.ctx.announce(&outcome).await;
        Ok(outcome.order)
    }

    /// Unassigned `CONFIRMED` orders, or nothing while the rider is offline.
    pub async fn available_orders(&self, principal: &Principal) -> Result<Vec<Order>> {
        principal.require(Capability::AcceptOrder)?;
        if !self.ctx.store.availability(principal.user_id).await?.is_online {
            return Ok(Vec::new());
        }
        self.ctx.store.list_orders(OrderFilter::Unassigned).await
    }

    /// The caller's availability.
    pub async fn availability(&self, principal: &Principal) -> Result<RiderAvailability> {
        principal.require(Capability::ManageAvailability)?;
        self.ctx.store.availability(principal.user_id).await
    }

    /// Sets the caller's online flag.
    pub async fn set_availability(
        &self,
        principal: &Principal,
        is_online: bool,
    ) -> Result<RiderAvailability> {
        principal.require(Capability::ManageAvailability)?;
        let availability = self
            .ctx
            .store
            .set_availability(principal.user_id, is_online, self.ctx.clock.now())
            .await?;
        tracing::info!(rider_id = %principal.user_id, is_online, "Rider availability changed");
        Ok(availability)
    }

    /// Stores the caller's latest position. Positions are not broadcast.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] for out-of-range coordinates.
    pub async fn record_location(
        &self,
        principal: &Principal,
        location: Coordinates,
    ) -> Result<RiderAvailability> {
        principal.require(Capability::ReportLocation)?;
        if !location.is_valid() {
            return Err(DispatchError::validation(
                "location",
                "latitude or longitude out of range",
            ));
        }
        self.ctx
            .store
            .record_location(principal.user_id, location, self.ctx.clock.now())
            .await
    }
}

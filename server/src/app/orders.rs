//! Quoting, placement and the status lifecycle of orders.

use super::ServiceContext;
use rush_core::access::authorize_status_target;
use rush_core::lifecycle::{OrderCommand, OrderDraft};
use rush_core::order::{PaymentProvider, TrackingEvent};
use rush_core::pricing::PriceBreakdown;
use rush_core::quote::{QuoteRequest, QuotedItem, build_quote};
use rush_core::store::OrderFilter;
use rush_core::types::{BranchId, Coordinates};
use rush_core::{Capability, DispatchError, Order, OrderId, OrderStatus, Principal, Result};
use serde::{Deserialize, Serialize};

/// Priced preview of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteView {
    /// Quoted branch
    pub branch_id: BranchId,
    /// Subtotal, fee and total
    #[serde(flatten)]
    pub pricing: PriceBreakdown,
    /// Resolved line items
    pub items: Vec<QuotedItem>,
}

/// Body of an order placement: a cart plus the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    /// Cart to price and snapshot
    #[serde(flatten)]
    pub cart: QuoteRequest,
    /// Provider the payment will be taken through
    #[serde(default)]
    pub payment_provider: PaymentProvider,
}

/// An order with its full status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTracking {
    /// Current order
    pub order: Order,
    /// Tracking log in commit order
    pub events: Vec<TrackingEvent>,
}

/// Order placement and lifecycle service.
pub struct OrderService {
    ctx: ServiceContext,
}

impl OrderService {
    /// Creates the service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Prices a cart without writing anything.
    ///
    /// # Errors
    ///
    /// Validation failures of the cart, see [`build_quote`].
    pub async fn quote(&self, principal: &Principal, request: &QuoteRequest) -> Result<QuoteView> {
        principal.require(Capability::QuoteOrder)?;
        let quote = build_quote(self.ctx.store.as_ref(), principal.user_id, request).await?;
        Ok(QuoteView {
            branch_id: quote.branch.id,
            pricing: quote.pricing,
            items: quote.items,
        })
    }

    /// Prices the cart and creates the order in one unit.
    ///
    /// # Errors
    ///
    /// The quote's validation failures, or a storage failure.
    pub async fn place(&self, principal: &Principal, request: PlaceOrder) -> Result<Order> {
        principal.require(Capability::PlaceOrder)?;
        let quote = build_quote(self.ctx.store.as_ref(), principal.user_id, &request.cart).await?;
        let draft = quote.into_draft(principal.user_id, request.payment_provider, self.ctx.clock.now());

        self.ctx.store.create_order(&draft).await?;
        tracing::info!(
            order_id = %draft.order.id,
            customer_id = %principal.user_id,
            total = %draft.order.total,
            "Order placed"
        );
        self.ctx.schedule_status(&draft.event).await;
        Ok(draft.order)
    }

    /// Confirms payment for an own order: `CREATED → CONFIRMED`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] for someone else's order
    /// - [`DispatchError::InvalidTransition`] unless the order is `CREATED`
    /// - [`DispatchError::PaymentMissing`] when the order has no payment
    pub async fn confirm(
        &self,
        principal: &Principal,
        id: OrderId,
        provider_reference: Option<String>,
    ) -> Result<Order> {
        principal.require(Capability::ConfirmOrder)?;
        self.ctx.visible_order(principal, id).await?;
        self.apply(id, OrderCommand::Confirm { provider_reference }).await
    }

    /// Moves an order along the lifecycle on behalf of a rider, merchant or admin.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::PermissionDenied`] when the role may not request `to`
    /// - [`DispatchError::InvalidTransition`] for moves outside the legal table
    /// - [`DispatchError::Validation`] for `ASSIGNED` or an invalid location
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: OrderId,
        to: OrderStatus,
        location: Option<Coordinates>,
    ) -> Result<Order> {
        principal.require(Capability::UpdateOrderStatus)?;
        if location.is_some_and(|l| !l.is_valid()) {
            return Err(DispatchError::validation(
                "location",
                "latitude or longitude out of range",
            ));
        }
        let order = self.ctx.visible_order(principal, id).await?;
        authorize_status_target(principal, &order, to)?;
        self.apply(
            id,
            OrderCommand::Advance {
                by: *principal,
                to,
                location,
            },
        )
        .await
    }

    /// Cancels a non-terminal order.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidTransition`] once the order is terminal.
    pub async fn cancel(&self, principal: &Principal, id: OrderId) -> Result<Order> {
        principal.require(Capability::CancelOrder)?;
        let order = self.ctx.visible_order(principal, id).await?;
        authorize_status_target(principal, &order, OrderStatus::Canceled)?;
        self.apply(
            id,
            OrderCommand::Advance {
                by: *principal,
                to: OrderStatus::Canceled,
                location: None,
            },
        )
        .await
    }

    /// Copies an own order, in any status, into a new `CREATED` order.
    ///
    /// Items and totals are copied as they were, not re-priced.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] for someone else's order.
    pub async fn reorder(&self, principal: &Principal, id: OrderId) -> Result<Order> {
        principal.require(Capability::Reorder)?;
        let original = self.ctx.visible_order(principal, id).await?;
        let draft = OrderDraft::reorder(&original, self.ctx.clock.now());

        self.ctx.store.create_order(&draft).await?;
        tracing::info!(
            order_id = %draft.order.id,
            original_id = %original.id,
            "Order reordered"
        );
        self.ctx.schedule_status(&draft.event).await;
        Ok(draft.order)
    }

    /// The caller's own orders, newest first.
    pub async fn customer_orders(&self, principal: &Principal) -> Result<Vec<Order>> {
        principal.require(Capability::PlaceOrder)?;
        self.ctx
            .store
            .list_orders(OrderFilter::Customer(principal.user_id))
            .await
    }

    /// Orders of every branch the caller owns, newest first.
    pub async fn merchant_orders(&self, principal: &Principal) -> Result<Vec<Order>> {
        principal.require(Capability::ManageCatalog)?;
        self.ctx
            .store
            .list_orders(OrderFilter::Merchant(principal.user_id))
            .await
    }

    /// Every order, newest first.
    pub async fn all_orders(&self, principal: &Principal) -> Result<Vec<Order>> {
        principal.require(Capability::ViewAllOrders)?;
        self.ctx.store.list_orders(OrderFilter::All).await
    }

    /// An order with its tracking log.
    pub async fn tracking(&self, principal: &Principal, id: OrderId) -> Result<OrderTracking> {
        let order = self.ctx.visible_order(principal, id).await?;
        let events = self.ctx.store.tracking_events(id).await?;
        Ok(OrderTracking { order, events })
    }

    async fn apply(&self, id: OrderId, command: OrderCommand) -> Result<Order> {
        let outcome = self
            .ctx
            .store
            .transition(id, command, self.ctx.clock.now())
            .await?;
        self.ctx.announce(&outcome).await;
        Ok(outcome.order)
    }
}

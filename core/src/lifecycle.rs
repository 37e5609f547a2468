//! Transition decisions for the order aggregate.
//!
//! Storage adapters lock the order row, load the current order and payment,
//! and hand them to [`decide`]. The returned [`TransitionOutcome`] is the
//! complete set of writes for that unit of work: the new order state, exactly
//! one tracking event and, for confirmations, the payment update plus its
//! ledger entry. A rejected command produces no outcome and therefore no write.
//!
//! ```text
//!   lock(order) ─► decide(order, payment, command) ─► persist(outcome) ─► commit
//!                        │
//!                        └─► Err(..) ─► rollback (state untouched)
//! ```

use crate::access::authorize_status_target;
use crate::error::DispatchError;
use crate::identity::Principal;
use crate::order::{
    Order, OrderItem, OrderStatus, Payment, PaymentProvider, PaymentStatus, PaymentTransaction,
    TrackingEvent, TransactionStatus,
};
use crate::types::{
    Coordinates, OrderId, OrderItemId, PaymentId, PaymentTransactionId, TrackingEventId, UserId,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Provider reference recorded when a confirmation does not carry one.
pub const DEFAULT_CONFIRMATION_REFERENCE: &str = "CONFIRMED";

/// Provider reference of the ledger entry written at order creation.
pub const INITIAL_PAYMENT_REFERENCE: &str = "INIT";

/// A request to move an order.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderCommand {
    /// Confirm payment: `CREATED → CONFIRMED`.
    Confirm {
        /// Provider-side reference for the ledger
        provider_reference: Option<String>,
    },
    /// Rider self-accept: `CONFIRMED → ASSIGNED`, only while no rider is set.
    Accept {
        /// Accepting rider
        rider_id: UserId,
    },
    /// Admin reassignment from any non-terminal status, overriding any rider.
    Reassign {
        /// New rider
        rider_id: UserId,
    },
    /// Plain status update along the legal-transition table.
    ///
    /// The caller is re-checked against the locked order, so a rider replaced
    /// between read and write is rejected.
    Advance {
        /// Acting caller
        by: Principal,
        /// Target status
        to: OrderStatus,
        /// Optional position reported with the update
        location: Option<Coordinates>,
    },
}

impl OrderCommand {
    /// Status this command asks for.
    #[must_use]
    pub const fn target(&self) -> OrderStatus {
        match self {
            Self::Confirm { .. } => OrderStatus::Confirmed,
            Self::Accept { .. } | Self::Reassign { .. } => OrderStatus::Assigned,
            Self::Advance { to, .. } => *to,
        }
    }
}

/// Every write produced by one accepted command.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    /// Status before the transition
    pub from: OrderStatus,
    /// Order after the transition
    pub order: Order,
    /// The single tracking event appended
    pub event: TrackingEvent,
    /// Updated payment and its new ledger entry, for confirmations
    pub payment: Option<(Payment, PaymentTransaction)>,
}

/// Validates `command` against the current state and computes its effects.
///
/// # Errors
///
/// - [`DispatchError::Conflict`] when a self-accept finds the order taken or not
///   confirmed, or a reassignment finds it finished
/// - [`DispatchError::NotFound`] / [`DispatchError::PermissionDenied`] when the
///   caller of an advance may not move this order to the target
/// - [`DispatchError::InvalidTransition`] for moves outside the legal table
/// - [`DispatchError::PaymentMissing`] when confirming an order without a payment
/// - [`DispatchError::Validation`] when `ASSIGNED` is requested as a plain status
pub fn decide(
    order: &Order,
    payment: Option<&Payment>,
    command: OrderCommand,
    at: DateTime<Utc>,
) -> Result<TransitionOutcome, DispatchError> {
    let from = order.status;
    let mut next = order.clone();
    let mut location = None;
    let mut payment_update = None;

    if let OrderCommand::Advance { by, to, .. } = &command {
        authorize_status_target(by, order, *to)?;
    }

    match command {
        OrderCommand::Accept { rider_id } => {
            if from != OrderStatus::Confirmed || order.rider_id.is_some() {
                return Err(DispatchError::Conflict(format!(
                    "order {} is no longer available",
                    order.id
                )));
            }
            next.rider_id = Some(rider_id);
            next.status = OrderStatus::Assigned;
        }
        OrderCommand::Reassign { rider_id } => {
            if from.is_terminal() {
                return Err(DispatchError::Conflict(format!(
                    "order {} is already {from}",
                    order.id
                )));
            }
            next.rider_id = Some(rider_id);
            next.status = OrderStatus::Assigned;
        }
        OrderCommand::Advance {
            to: OrderStatus::Assigned,
            ..
        } => {
            return Err(DispatchError::validation(
                "status",
                "ASSIGNED requires a rider; accept or reassign the order instead",
            ));
        }
        OrderCommand::Advance {
            to: OrderStatus::Confirmed,
            location: reported,
            ..
        } => {
            payment_update = Some(confirm_payment(order, payment, None, at)?);
            next.status = OrderStatus::Confirmed;
            location = reported;
        }
        OrderCommand::Confirm { provider_reference } => {
            payment_update = Some(confirm_payment(order, payment, provider_reference, at)?);
            next.status = OrderStatus::Confirmed;
        }
        OrderCommand::Advance {
            to,
            location: reported,
            ..
        } => {
            ensure_legal(from, to)?;
            if to == OrderStatus::Canceled {
                next.rider_id = None;
            }
            next.status = to;
            location = reported;
        }
    }

    next.updated_at = at;
    let event = TrackingEvent {
        id: TrackingEventId::new(),
        order_id: order.id,
        status: next.status,
        location,
        created_at: at,
    };

    Ok(TransitionOutcome {
        from,
        order: next,
        event,
        payment: payment_update,
    })
}

fn ensure_legal(from: OrderStatus, to: OrderStatus) -> Result<(), DispatchError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(DispatchError::InvalidTransition { from, to })
    }
}

fn confirm_payment(
    order: &Order,
    payment: Option<&Payment>,
    provider_reference: Option<String>,
    at: DateTime<Utc>,
) -> Result<(Payment, PaymentTransaction), DispatchError> {
    ensure_legal(order.status, OrderStatus::Confirmed)?;
    let mut payment = payment.cloned().ok_or(DispatchError::PaymentMissing)?;
    payment.status = PaymentStatus::Confirmed;
    payment.updated_at = at;

    let transaction = PaymentTransaction {
        id: PaymentTransactionId::new(),
        payment_id: payment.id,
        provider_reference: provider_reference
            .filter(|reference| !reference.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIRMATION_REFERENCE.to_string()),
        status: TransactionStatus::Success,
        raw_response: json!({ "status": "confirmed" }),
        created_at: at,
    };
    Ok((payment, transaction))
}

/// Everything written atomically when an order is created.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderDraft {
    /// The new order, status `CREATED`
    pub order: Order,
    /// Its pending payment
    pub payment: Payment,
    /// The `INIT` ledger entry
    pub transaction: PaymentTransaction,
    /// The `CREATED` tracking event
    pub event: TrackingEvent,
}

impl OrderDraft {
    /// Wraps a freshly built order with its initial payment and log entries.
    ///
    /// The order's status is forced to `CREATED` and its rider cleared.
    #[must_use]
    pub fn new(mut order: Order, provider: PaymentProvider) -> Self {
        let at = order.created_at;
        order.status = OrderStatus::Created;
        order.rider_id = None;
        order.updated_at = at;

        let payment = Payment {
            id: PaymentId::new(),
            order_id: order.id,
            provider,
            status: PaymentStatus::Pending,
            amount: order.total,
            created_at: at,
            updated_at: at,
        };
        let transaction = PaymentTransaction {
            id: PaymentTransactionId::new(),
            payment_id: payment.id,
            provider_reference: INITIAL_PAYMENT_REFERENCE.to_string(),
            status: TransactionStatus::Pending,
            raw_response: json!({ "status": "initialized" }),
            created_at: at,
        };
        let event = TrackingEvent {
            id: TrackingEventId::new(),
            order_id: order.id,
            status: OrderStatus::Created,
            location: None,
            created_at: at,
        };

        Self {
            order,
            payment,
            transaction,
            event,
        }
    }

    /// Copies `original` into a new order without re-pricing it.
    ///
    /// Works from any status of the original, terminal ones included.
    #[must_use]
    pub fn reorder(original: &Order, at: DateTime<Utc>) -> Self {
        let items = original
            .items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(),
                ..item.clone()
            })
            .collect();

        let order = Order {
            id: OrderId::new(),
            status: OrderStatus::Created,
            rider_id: None,
            items,
            created_at: at,
            updated_at: at,
            ..original.clone()
        };
        Self::new(order, PaymentProvider::Stripe)
    }
}

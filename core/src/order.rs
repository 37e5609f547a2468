//! The order aggregate: order, line items, tracking log and payment ledger.
//!
//! # Lifecycle
//!
//! ```text
//! CREATED ──► CONFIRMED ──► ASSIGNED ──► PICKED_UP ──► IN_TRANSIT ──► DELIVERED
//!    │            │            │             │              │
//!    └────────────┴────────────┴─────────────┴──────────────┴──────► CANCELED
//! ```
//!
//! `DELIVERED` and `CANCELED` are terminal. An order owns its items, its
//! tracking events and its payment; riders, customers and branches are only
//! referenced.

use crate::types::{
    AddressSnapshot, BranchId, Coordinates, ItemId, Money, OrderId, OrderItemId, PaymentId,
    PaymentTransactionId, TrackingEventId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting payment confirmation
    Created,
    /// Paid, waiting for a rider
    Confirmed,
    /// A rider owns the delivery
    Assigned,
    /// The rider collected the goods
    PickedUp,
    /// On the way to the customer
    InTransit,
    /// Handed over (terminal)
    Delivered,
    /// Abandoned (terminal)
    Canceled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Created,
        Self::Confirmed,
        Self::Assigned,
        Self::PickedUp,
        Self::InTransit,
        Self::Delivered,
        Self::Canceled,
    ];

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Canceled)
    }

    /// Whether an order in this status must carry a rider.
    #[must_use]
    pub const fn requires_rider(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::PickedUp | Self::InTransit | Self::Delivered
        )
    }

    /// The legal-transition table.
    ///
    /// Forward moves advance exactly one step; cancellation is reachable from
    /// every non-terminal status.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Created, Self::Confirmed)
                | (Self::Confirmed, Self::Assigned)
                | (Self::Assigned, Self::PickedUp)
                | (Self::PickedUp, Self::InTransit)
                | (Self::InTransit, Self::Delivered)
                | (
                    Self::Created
                        | Self::Confirmed
                        | Self::Assigned
                        | Self::PickedUp
                        | Self::InTransit,
                    Self::Canceled
                )
        )
    }

    /// Wire name, e.g. `PICKED_UP`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Confirmed => "CONFIRMED",
            Self::Assigned => "ASSIGNED",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// Line item with its name and price frozen at order time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Line id
    pub id: OrderItemId,
    /// Source inventory item, if it still exists
    pub item_id: Option<ItemId>,
    /// Item name at order time
    pub name: String,
    /// Ordered quantity (at least 1)
    pub quantity: u32,
    /// Unit price at order time
    pub unit_price: Money,
}

impl OrderItem {
    /// `unit_price × quantity`, `None` on overflow.
    #[must_use]
    pub const fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// The order aggregate root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id
    pub id: OrderId,
    /// Current status
    pub status: OrderStatus,
    /// Ordering customer
    pub customer_id: UserId,
    /// Fulfilling branch
    pub branch_id: BranchId,
    /// Owner of the fulfilling branch
    pub merchant_id: UserId,
    /// Assigned rider; set iff the status requires one
    pub rider_id: Option<UserId>,
    /// Branch address at creation
    pub pickup: AddressSnapshot,
    /// Customer address at creation
    pub dropoff: AddressSnapshot,
    /// Sum of line totals
    pub subtotal: Money,
    /// Flat delivery fee at creation
    pub delivery_fee: Money,
    /// `subtotal + delivery_fee`
    pub total: Money,
    /// Snapshotted line items
    pub items: Vec<OrderItem>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last transition time
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user` is the customer, the assigned rider or the branch owner.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.customer_id == user || self.rider_id == Some(user) || self.merchant_id == user
    }

    /// Human recipients of a status event, without duplicates.
    #[must_use]
    pub fn interested_parties(&self) -> Vec<UserId> {
        let mut recipients = Vec::with_capacity(3);
        for user in [Some(self.customer_id), self.rider_id, Some(self.merchant_id)]
            .into_iter()
            .flatten()
        {
            if !recipients.contains(&user) {
                recipients.push(user);
            }
        }
        recipients
    }
}

/// One entry of the append-only per-order status log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Event id
    pub id: TrackingEventId,
    /// Owning order
    pub order_id: OrderId,
    /// Status entered
    pub status: OrderStatus,
    /// Reported position, if any
    pub location: Option<Coordinates>,
    /// Commit time
    pub created_at: DateTime<Utc>,
}

/// Supported payment providers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    /// Stripe
    #[default]
    Stripe,
    /// `PayPal`
    Paypal,
}

impl PaymentProvider {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stripe => "STRIPE",
            Self::Paypal => "PAYPAL",
        }
    }
}

impl FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STRIPE" => Ok(Self::Stripe),
            "PAYPAL" => Ok(Self::Paypal),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

/// Payment status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Initialized, not yet confirmed
    Pending,
    /// Confirmed by the provider
    Confirmed,
    /// Rejected by the provider
    Failed,
}

impl PaymentStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The single payment of an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id
    pub id: PaymentId,
    /// Owning order
    pub order_id: OrderId,
    /// Provider
    pub provider: PaymentProvider,
    /// Status
    pub status: PaymentStatus,
    /// Amount charged, equal to the order total
    pub amount: Money,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one provider interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Started
    Pending,
    /// Succeeded
    Success,
    /// Failed
    Failed,
}

impl TransactionStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

/// Append-only ledger entry of a payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    /// Entry id
    pub id: PaymentTransactionId,
    /// Owning payment
    pub payment_id: PaymentId,
    /// Provider-side reference
    pub provider_reference: String,
    /// Outcome
    pub status: TransactionStatus,
    /// Raw provider response
    pub raw_response: serde_json::Value,
    /// Insert time
    pub created_at: DateTime<Utc>,
}

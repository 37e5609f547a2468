//! Storage ports.
//!
//! The engine depends on these traits only. `rush-postgres` implements them on
//! PostgreSQL with row locks; `rush-testing` implements them in memory with a
//! mutex per order. Append-only records (tracking events, payment ledger
//! entries, notifications, chat messages) expose insert and read operations and
//! nothing else.

use crate::catalog::{Branch, CustomerAddress, InventoryItem};
use crate::error::DispatchError;
use crate::lifecycle::{OrderCommand, OrderDraft, TransitionOutcome};
use crate::messaging::{ChatMessage, Notification};
use crate::order::{Order, Payment, PaymentTransaction, TrackingEvent};
use crate::types::{
    AddressId, BranchId, ChatMessageId, Coordinates, ItemId, Money, OrderId, PaymentId,
    TrackingEventId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branches, inventory and customer addresses.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a branch.
    async fn insert_branch(&self, branch: &Branch) -> Result<(), DispatchError>;

    /// Loads a branch.
    async fn find_branch(&self, id: BranchId) -> Result<Option<Branch>, DispatchError>;

    /// Branches owned by `merchant`, oldest first.
    async fn list_branches(&self, merchant: UserId) -> Result<Vec<Branch>, DispatchError>;

    /// Inserts an inventory item.
    async fn insert_item(&self, item: &InventoryItem) -> Result<(), DispatchError>;

    /// Loads an inventory item.
    async fn find_item(&self, id: ItemId) -> Result<Option<InventoryItem>, DispatchError>;

    /// Overwrites an inventory item.
    async fn update_item(&self, item: &InventoryItem) -> Result<(), DispatchError>;

    /// The subset of `ids` that exist, are active and belong to `branch`.
    async fn active_items(
        &self,
        branch: BranchId,
        ids: &[ItemId],
    ) -> Result<Vec<InventoryItem>, DispatchError>;

    /// Inserts a customer address.
    async fn insert_address(&self, address: &CustomerAddress) -> Result<(), DispatchError>;

    /// Loads an address only if it belongs to `customer`.
    async fn find_address(
        &self,
        customer: UserId,
        id: AddressId,
    ) -> Result<Option<CustomerAddress>, DispatchError>;

    /// Addresses of `customer`, oldest first.
    async fn list_addresses(&self, customer: UserId)
    -> Result<Vec<CustomerAddress>, DispatchError>;
}

/// The process-wide flat delivery fee.
///
/// Implementations read the stored value on every call; it is never cached.
#[async_trait]
pub trait FeeSettings: Send + Sync {
    /// Current flat fee.
    async fn flat_delivery_fee(&self) -> Result<Money, DispatchError>;

    /// Replaces the flat fee. Existing orders keep their snapshotted totals.
    async fn set_flat_delivery_fee(&self, fee: Money) -> Result<(), DispatchError>;
}

/// Which orders a listing returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderFilter {
    /// Orders placed by a customer
    Customer(UserId),
    /// Orders of every branch a merchant owns
    Merchant(UserId),
    /// `CONFIRMED` orders without a rider
    Unassigned,
    /// Everything
    All,
}

/// Per-merchant order statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantAnalytics {
    /// Number of orders across the merchant's branches
    pub order_count: u64,
    /// Sum of order totals
    pub revenue: Money,
    /// Mean minutes from creation to the `DELIVERED` event, if any were delivered
    pub avg_delivery_time_minutes: Option<f64>,
}

/// Orders, their tracking log and their payment ledger.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes order, items, payment, `INIT` ledger entry and `CREATED` event in one unit.
    async fn create_order(&self, draft: &OrderDraft) -> Result<(), DispatchError>;

    /// Applies `command` under an exclusive lock on the order.
    ///
    /// The current status is re-read after the lock is taken and passed to
    /// [`crate::lifecycle::decide`]. On success every write of the returned
    /// outcome is committed together; on failure nothing is written.
    async fn transition(
        &self,
        id: OrderId,
        command: OrderCommand,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DispatchError>;

    /// Loads an order with its items.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, DispatchError>;

    /// Lists orders, newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, DispatchError>;

    /// Tracking log of an order in commit order.
    async fn tracking_events(&self, order: OrderId) -> Result<Vec<TrackingEvent>, DispatchError>;

    /// Loads one tracking event.
    async fn find_tracking_event(
        &self,
        id: TrackingEventId,
    ) -> Result<Option<TrackingEvent>, DispatchError>;

    /// Payment of an order.
    async fn find_payment(&self, order: OrderId) -> Result<Option<Payment>, DispatchError>;

    /// Ledger of a payment in insertion order.
    async fn payment_transactions(
        &self,
        payment: PaymentId,
    ) -> Result<Vec<PaymentTransaction>, DispatchError>;

    /// Statistics over the merchant's branches.
    async fn merchant_analytics(&self, merchant: UserId)
    -> Result<MerchantAnalytics, DispatchError>;
}

/// Rider availability flag and last reported position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiderAvailability {
    /// Rider
    pub rider_id: UserId,
    /// Whether the rider sees available orders
    pub is_online: bool,
    /// Last reported position
    pub location: Option<Coordinates>,
    /// Last change
    pub updated_at: Option<DateTime<Utc>>,
}

impl RiderAvailability {
    /// State of a rider that never reported anything: offline, nowhere.
    #[must_use]
    pub const fn offline(rider_id: UserId) -> Self {
        Self {
            rider_id,
            is_online: false,
            location: None,
            updated_at: None,
        }
    }
}

/// Rider availability and location.
#[async_trait]
pub trait RiderStore: Send + Sync {
    /// Current availability, offline when never set.
    async fn availability(&self, rider: UserId) -> Result<RiderAvailability, DispatchError>;

    /// The rider's record, `None` for a user that never registered as a rider.
    ///
    /// A record exists once the rider has set availability or reported a
    /// position.
    async fn find_rider(&self, rider: UserId) -> Result<Option<RiderAvailability>, DispatchError>;

    /// Sets the online flag.
    async fn set_availability(
        &self,
        rider: UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<RiderAvailability, DispatchError>;

    /// Stores the rider's latest position.
    async fn record_location(
        &self,
        rider: UserId,
        location: Coordinates,
        at: DateTime<Utc>,
    ) -> Result<RiderAvailability, DispatchError>;
}

/// Insert-only notification log.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Appends a notification.
    async fn insert_notification(&self, notification: &Notification)
    -> Result<(), DispatchError>;

    /// Notifications of `user`, newest first.
    async fn list_notifications(&self, user: UserId) -> Result<Vec<Notification>, DispatchError>;
}

/// Insert-only chat log.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Appends a message.
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), DispatchError>;

    /// Loads one message.
    async fn find_message(&self, id: ChatMessageId) -> Result<Option<ChatMessage>, DispatchError>;

    /// Messages of an order, oldest first.
    async fn list_messages(&self, order: OrderId) -> Result<Vec<ChatMessage>, DispatchError>;
}

/// Everything the application needs from storage.
#[async_trait]
pub trait DispatchStore:
    CatalogStore + FeeSettings + OrderStore + RiderStore + NotificationStore + ChatStore
{
    /// Cheap round trip used by readiness probes.
    async fn ping(&self) -> Result<(), DispatchError>;
}

//! In-memory implementation of every storage port.
//!
//! Orders are serialized through a per-order `tokio::sync::Mutex`, the same
//! single-writer guarantee PostgreSQL gives with `SELECT … FOR UPDATE`. A
//! lock entry lives only while some writer holds or awaits it. All
//! other records live in one table set behind an async `RwLock`; each write
//! path takes the write lock once, so multi-record writes are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rush_core::catalog::{Branch, CustomerAddress, InventoryItem};
use rush_core::lifecycle::{OrderCommand, OrderDraft, TransitionOutcome, decide};
use rush_core::messaging::{ChatMessage, Notification};
use rush_core::order::{Order, OrderStatus, Payment, PaymentTransaction, TrackingEvent};
use rush_core::pricing::DEFAULT_DELIVERY_FEE;
use rush_core::store::{
    CatalogStore, ChatStore, DispatchStore, FeeSettings, MerchantAnalytics, NotificationStore,
    OrderFilter, OrderStore, RiderAvailability, RiderStore,
};
use rush_core::types::{
    AddressId, BranchId, ChatMessageId, Coordinates, ItemId, Money, OrderId, PaymentId,
    TrackingEventId, UserId,
};
use rush_core::DispatchError;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct Tables {
    branches: Vec<Branch>,
    items: HashMap<ItemId, InventoryItem>,
    addresses: Vec<CustomerAddress>,
    orders: Vec<Order>,
    events: Vec<TrackingEvent>,
    payments: HashMap<OrderId, Payment>,
    transactions: Vec<PaymentTransaction>,
    riders: HashMap<UserId, RiderAvailability>,
    notifications: Vec<Notification>,
    messages: Vec<ChatMessage>,
    flat_fee: Option<Money>,
}

impl Tables {
    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|order| order.id == id)
    }
}

/// Storage for tests and single-process demos.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    order_locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
    default_fee: Money,
    notification_failures: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store whose fee setting defaults to 5.00.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_fee(DEFAULT_DELIVERY_FEE)
    }

    /// Empty store with a different fee default.
    #[must_use]
    pub fn with_default_fee(default_fee: Money) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            order_locks: Mutex::new(HashMap::new()),
            default_fee,
            notification_failures: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` notification inserts fail with a storage error.
    pub fn fail_next_notification_inserts(&self, count: usize) {
        self.notification_failures.store(count, Ordering::SeqCst);
    }

    /// Every notification, in insertion order.
    pub async fn all_notifications(&self) -> Vec<Notification> {
        self.tables.read().await.notifications.clone()
    }

    /// Overwrites an order's status and rider, bypassing the state machine.
    ///
    /// Only for arranging test preconditions.
    pub async fn force_status(&self, id: OrderId, status: OrderStatus, rider: Option<UserId>) {
        if let Some(order) = self.tables.write().await.order_mut(id) {
            order.status = status;
            order.rider_id = rider;
        }
    }

    /// Removes an order's payment row.
    ///
    /// Only for arranging test preconditions.
    pub async fn remove_payment(&self, order: OrderId) {
        self.tables.write().await.payments.remove(&order);
    }

    /// Number of per-order locks currently held or awaited.
    pub async fn order_lock_count(&self) -> usize {
        self.order_locks.lock().await.len()
    }

    async fn lock_for(&self, id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.order_locks.lock().await;
        Arc::clone(locks.entry(id).or_default())
    }

    /// Drops the order's lock entry unless another writer still holds a clone.
    async fn release_lock(&self, id: OrderId, lock: Arc<Mutex<()>>) {
        let mut locks = self.order_locks.lock().await;
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&id);
        }
    }

    // caller holds the order's lock
    async fn transition_locked(
        &self,
        id: OrderId,
        command: OrderCommand,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DispatchError> {
        let (order, payment) = {
            let tables = self.tables.read().await;
            let order = tables
                .orders
                .iter()
                .find(|o| o.id == id)
                .cloned()
                .ok_or_else(|| DispatchError::not_found("order"))?;
            (order, tables.payments.get(&id).cloned())
        };

        // other writers may run here; none of them may touch this order
        tokio::task::yield_now().await;

        let outcome = decide(&order, payment.as_ref(), command, at)?;

        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.order_mut(id) {
            *stored = outcome.order.clone();
        }
        tables.events.push(outcome.event.clone());
        if let Some((payment, transaction)) = &outcome.payment {
            tables.payments.insert(id, payment.clone());
            tables.transactions.push(transaction.clone());
        }
        Ok(outcome)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_branch(&self, branch: &Branch) -> Result<(), DispatchError> {
        self.tables.write().await.branches.push(branch.clone());
        Ok(())
    }

    async fn find_branch(&self, id: BranchId) -> Result<Option<Branch>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables.branches.iter().find(|b| b.id == id).cloned())
    }

    async fn list_branches(&self, merchant: UserId) -> Result<Vec<Branch>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .branches
            .iter()
            .filter(|b| b.merchant_id == merchant)
            .cloned()
            .collect())
    }

    async fn insert_item(&self, item: &InventoryItem) -> Result<(), DispatchError> {
        self.tables.write().await.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<InventoryItem>, DispatchError> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn update_item(&self, item: &InventoryItem) -> Result<(), DispatchError> {
        let mut tables = self.tables.write().await;
        match tables.items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(DispatchError::not_found("item")),
        }
    }

    async fn active_items(
        &self,
        branch: BranchId,
        ids: &[ItemId],
    ) -> Result<Vec<InventoryItem>, DispatchError> {
        let tables = self.tables.read().await;
        let mut found: Vec<InventoryItem> = tables
            .items
            .values()
            .filter(|item| item.branch_id == branch && item.is_active && ids.contains(&item.id))
            .cloned()
            .collect();
        found.sort_by_key(|item| item.created_at);
        Ok(found)
    }

    async fn insert_address(&self, address: &CustomerAddress) -> Result<(), DispatchError> {
        self.tables.write().await.addresses.push(address.clone());
        Ok(())
    }

    async fn find_address(
        &self,
        customer: UserId,
        id: AddressId,
    ) -> Result<Option<CustomerAddress>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .addresses
            .iter()
            .find(|a| a.id == id && a.customer_id == customer)
            .cloned())
    }

    async fn list_addresses(
        &self,
        customer: UserId,
    ) -> Result<Vec<CustomerAddress>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .addresses
            .iter()
            .filter(|a| a.customer_id == customer)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FeeSettings for InMemoryStore {
    async fn flat_delivery_fee(&self) -> Result<Money, DispatchError> {
        Ok(self.tables.read().await.flat_fee.unwrap_or(self.default_fee))
    }

    async fn set_flat_delivery_fee(&self, fee: Money) -> Result<(), DispatchError> {
        self.tables.write().await.flat_fee = Some(fee);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, draft: &OrderDraft) -> Result<(), DispatchError> {
        let mut tables = self.tables.write().await;
        if tables.orders.iter().any(|o| o.id == draft.order.id) {
            return Err(DispatchError::Conflict(format!(
                "order {} already exists",
                draft.order.id
            )));
        }
        tables.orders.push(draft.order.clone());
        tables.payments.insert(draft.order.id, draft.payment.clone());
        tables.transactions.push(draft.transaction.clone());
        tables.events.push(draft.event.clone());
        Ok(())
    }

    async fn transition(
        &self,
        id: OrderId,
        command: OrderCommand,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, DispatchError> {
        let lock = self.lock_for(id).await;
        let result = {
            let _guard = lock.lock().await;
            self.transition_locked(id, command, at).await
        };
        self.release_lock(id, lock).await;
        result
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, DispatchError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .iter()
            .rev()
            .filter(|order| match filter {
                OrderFilter::Customer(customer) => order.customer_id == customer,
                OrderFilter::Merchant(merchant) => order.merchant_id == merchant,
                OrderFilter::Unassigned => {
                    order.status == OrderStatus::Confirmed && order.rider_id.is_none()
                }
                OrderFilter::All => true,
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn tracking_events(&self, order: OrderId) -> Result<Vec<TrackingEvent>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.order_id == order)
            .cloned()
            .collect())
    }

    async fn find_tracking_event(
        &self,
        id: TrackingEventId,
    ) -> Result<Option<TrackingEvent>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables.events.iter().find(|e| e.id == id).cloned())
    }

    async fn find_payment(&self, order: OrderId) -> Result<Option<Payment>, DispatchError> {
        Ok(self.tables.read().await.payments.get(&order).cloned())
    }

    async fn payment_transactions(
        &self,
        payment: PaymentId,
    ) -> Result<Vec<PaymentTransaction>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.payment_id == payment)
            .cloned()
            .collect())
    }

    #[allow(clippy::cast_precision_loss)]
    async fn merchant_analytics(
        &self,
        merchant: UserId,
    ) -> Result<MerchantAnalytics, DispatchError> {
        let tables = self.tables.read().await;
        let orders: Vec<&Order> = tables
            .orders
            .iter()
            .filter(|o| o.merchant_id == merchant)
            .collect();

        let revenue = orders
            .iter()
            .try_fold(Money::ZERO, |acc, o| acc.checked_add(o.total))
            .ok_or_else(|| DispatchError::Storage("revenue overflow".into()))?;

        let durations: Vec<f64> = tables
            .events
            .iter()
            .filter(|e| e.status == OrderStatus::Delivered)
            .filter_map(|e| {
                orders
                    .iter()
                    .find(|o| o.id == e.order_id)
                    .map(|o| (e.created_at - o.created_at).num_seconds() as f64 / 60.0)
            })
            .collect();

        Ok(MerchantAnalytics {
            order_count: orders.len() as u64,
            revenue,
            avg_delivery_time_minutes: (!durations.is_empty())
                .then(|| durations.iter().sum::<f64>() / durations.len() as f64),
        })
    }
}

#[async_trait]
impl RiderStore for InMemoryStore {
    async fn availability(&self, rider: UserId) -> Result<RiderAvailability, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .riders
            .get(&rider)
            .copied()
            .unwrap_or_else(|| RiderAvailability::offline(rider)))
    }

    async fn find_rider(&self, rider: UserId) -> Result<Option<RiderAvailability>, DispatchError> {
        Ok(self.tables.read().await.riders.get(&rider).copied())
    }

    async fn set_availability(
        &self,
        rider: UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<RiderAvailability, DispatchError> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .riders
            .entry(rider)
            .or_insert_with(|| RiderAvailability::offline(rider));
        entry.is_online = is_online;
        entry.updated_at = Some(at);
        Ok(*entry)
    }

    async fn record_location(
        &self,
        rider: UserId,
        location: Coordinates,
        at: DateTime<Utc>,
    ) -> Result<RiderAvailability, DispatchError> {
        let mut tables = self.tables.write().await;
        let entry = tables
            .riders
            .entry(rider)
            .or_insert_with(|| RiderAvailability::offline(rider));
        entry.location = Some(location);
        entry.updated_at = Some(at);
        Ok(*entry)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), DispatchError> {
        let injected = self
            .notification_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DispatchError::Storage("injected notification failure".into()));
        }
        self.tables.write().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, user: UserId) -> Result<Vec<Notification>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    async fn insert_message(&self, message: &ChatMessage) -> Result<(), DispatchError> {
        self.tables.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn find_message(&self, id: ChatMessageId) -> Result<Option<ChatMessage>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_messages(&self, order: OrderId) -> Result<Vec<ChatMessage>, DispatchError> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.order_id == order)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn ping(&self) -> Result<(), DispatchError> {
        Ok(())
    }
}

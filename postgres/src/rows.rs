//! Row ↔ domain conversions.
//!
//! Money and counts are stored as `BIGINT`; conversions that would lose sign
//! or range surface as storage errors rather than wrapping.

use chrono::{DateTime, Utc};
use rush_core::DispatchError;
use rush_core::catalog::{Branch, CustomerAddress, InventoryItem};
use rush_core::messaging::{ChatMessage, Notification};
use rush_core::order::{Order, OrderItem, Payment, PaymentTransaction, TrackingEvent};
use rush_core::store::RiderAvailability;
use rush_core::types::{AddressSnapshot, Coordinates, Money};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

pub(crate) type Result<T> = std::result::Result<T, DispatchError>;

#[allow(clippy::needless_pass_by_value)]
pub(crate) fn db_err(e: sqlx::Error) -> DispatchError {
    DispatchError::Storage(e.to_string())
}

pub(crate) fn to_cents(amount: Money) -> Result<i64> {
    i64::try_from(amount.cents())
        .map_err(|_| DispatchError::Storage(format!("amount {amount} exceeds column range")))
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    let cents: i64 = row.try_get(column).map_err(db_err)?;
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| DispatchError::Storage(format!("negative amount in {column}")))
}

fn count(row: &PgRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column).map_err(db_err)?;
    u32::try_from(value).map_err(|_| DispatchError::Storage(format!("{column} out of range: {value}")))
}

fn parse<T: FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column).map_err(db_err)?;
    raw.parse().map_err(DispatchError::Storage)
}

fn id<T: From<Uuid>>(row: &PgRow, column: &str) -> Result<T> {
    row.try_get::<Uuid, _>(column).map(T::from).map_err(db_err)
}

fn optional_id<T: From<Uuid>>(row: &PgRow, column: &str) -> Result<Option<T>> {
    row.try_get::<Option<Uuid>, _>(column)
        .map(|v| v.map(T::from))
        .map_err(db_err)
}

fn address(row: &PgRow, column: &str) -> Result<AddressSnapshot> {
    row.try_get::<Json<AddressSnapshot>, _>(column)
        .map(|json| json.0)
        .map_err(db_err)
}

fn timestamp(row: &PgRow, column: &str) -> Result<DateTime<Utc>> {
    row.try_get(column).map_err(db_err)
}

fn location(row: &PgRow) -> Result<Option<Coordinates>> {
    let latitude: Option<f64> = row.try_get("latitude").map_err(db_err)?;
    let longitude: Option<f64> = row.try_get("longitude").map_err(db_err)?;
    Ok(latitude
        .zip(longitude)
        .map(|(lat, lng)| Coordinates::new(lat, lng)))
}

pub(crate) fn branch(row: &PgRow) -> Result<Branch> {
    Ok(Branch {
        id: id(row, "id")?,
        merchant_id: id(row, "merchant_id")?,
        name: row.try_get("name").map_err(db_err)?,
        address: address(row, "address")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn inventory_item(row: &PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: id(row, "id")?,
        branch_id: id(row, "branch_id")?,
        name: row.try_get("name").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        price: money(row, "price_cents")?,
        stock: count(row, "stock")?,
        is_active: row.try_get("is_active").map_err(db_err)?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn customer_address(row: &PgRow) -> Result<CustomerAddress> {
    Ok(CustomerAddress {
        id: id(row, "id")?,
        customer_id: id(row, "customer_id")?,
        label: row.try_get("label").map_err(db_err)?,
        address: address(row, "address")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: id(row, "id")?,
        item_id: optional_id(row, "item_id")?,
        name: row.try_get("name").map_err(db_err)?,
        quantity: count(row, "quantity")?,
        unit_price: money(row, "unit_price_cents")?,
    })
}

/// Builds an order from its row; `items` are attached by the caller.
pub(crate) fn order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    Ok(Order {
        id: id(row, "id")?,
        status: parse(row, "status")?,
        customer_id: id(row, "customer_id")?,
        branch_id: id(row, "branch_id")?,
        merchant_id: id(row, "merchant_id")?,
        rider_id: optional_id(row, "rider_id")?,
        pickup: address(row, "pickup")?,
        dropoff: address(row, "dropoff")?,
        subtotal: money(row, "subtotal_cents")?,
        delivery_fee: money(row, "delivery_fee_cents")?,
        total: money(row, "total_cents")?,
        items,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn tracking_event(row: &PgRow) -> Result<TrackingEvent> {
    Ok(TrackingEvent {
        id: id(row, "id")?,
        order_id: id(row, "order_id")?,
        status: parse(row, "status")?,
        location: location(row)?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn payment(row: &PgRow) -> Result<Payment> {
    Ok(Payment {
        id: id(row, "id")?,
        order_id: id(row, "order_id")?,
        provider: parse(row, "provider")?,
        status: parse(row, "status")?,
        amount: money(row, "amount_cents")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub(crate) fn payment_transaction(row: &PgRow) -> Result<PaymentTransaction> {
    Ok(PaymentTransaction {
        id: id(row, "id")?,
        payment_id: id(row, "payment_id")?,
        provider_reference: row.try_get("provider_reference").map_err(db_err)?,
        status: parse(row, "status")?,
        raw_response: row.try_get("raw_response").map_err(db_err)?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn rider(row: &PgRow) -> Result<RiderAvailability> {
    Ok(RiderAvailability {
        rider_id: id(row, "rider_id")?,
        is_online: row.try_get("is_online").map_err(db_err)?,
        location: location(row)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

pub(crate) fn notification(row: &PgRow) -> Result<Notification> {
    Ok(Notification {
        id: id(row, "id")?,
        user_id: id(row, "user_id")?,
        kind: parse(row, "type")?,
        payload: row.try_get("payload").map_err(db_err)?,
        is_read: row.try_get("is_read").map_err(db_err)?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub(crate) fn chat_message(row: &PgRow) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: id(row, "id")?,
        order_id: id(row, "order_id")?,
        sender_id: id(row, "sender_id")?,
        recipient_id: id(row, "recipient_id")?,
        message: row.try_get("message").map_err(db_err)?,
        created_at: timestamp(row, "created_at")?,
    })
}

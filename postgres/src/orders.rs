//! Orders, tracking log and payment ledger.

use crate::PgStore;
use crate::rows::{self, Result, db_err, to_cents};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rush_core::lifecycle::{OrderCommand, OrderDraft, TransitionOutcome, decide};
use rush_core::order::{Order, OrderItem, Payment, PaymentTransaction, TrackingEvent};
use rush_core::store::{MerchantAnalytics, OrderFilter, OrderStore};
use rush_core::types::{Money, OrderId, PaymentId, TrackingEventId};
use rush_core::{DispatchError, UserId};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, Row};
use std::collections::HashMap;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

async fn insert_event(conn: &mut PgConnection, event: &TrackingEvent) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO tracking_events (id, order_id, status, latitude, longitude, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(event.id.as_uuid())
    .bind(event.order_id.as_uuid())
    .bind(event.status.as_str())
    .bind(event.location.map(|l| l.latitude))
    .bind(event.location.map(|l| l.longitude))
    .bind(event.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn insert_transaction(conn: &mut PgConnection, entry: &PaymentTransaction) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO payment_transactions
            (id, payment_id, provider_reference, status, raw_response, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(entry.id.as_uuid())
    .bind(entry.payment_id.as_uuid())
    .bind(&entry.provider_reference)
    .bind(entry.status.as_str())
    .bind(&entry.raw_response)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn load_items(
    conn: &mut PgConnection,
    orders: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
    let rows = sqlx::query(
        "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
    )
    .bind(orders)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in &rows {
        let order_id: Uuid = row.try_get("order_id").map_err(db_err)?;
        grouped.entry(order_id).or_default().push(rows::order_item(row)?);
    }
    Ok(grouped)
}

async fn hydrate(conn: &mut PgConnection, order_rows: &[PgRow]) -> Result<Vec<Order>> {
    let ids = order_rows
        .iter()
        .map(|row| row.try_get::<Uuid, _>("id").map_err(db_err))
        .collect::<Result<Vec<_>>>()?;
    let mut items = load_items(conn, &ids).await?;

    order_rows
        .iter()
        .zip(ids)
        .map(|(row, id)| rows::order(row, items.remove(&id).unwrap_or_default()))
        .collect()
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, draft: &OrderDraft) -> Result<()> {
        let order = &draft.order;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r"
            INSERT INTO orders (
                id, status, customer_id, branch_id, merchant_id, rider_id, pickup, dropoff,
                subtotal_cents, delivery_fee_cents, total_cents, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.customer_id.as_uuid())
        .bind(order.branch_id.as_uuid())
        .bind(order.merchant_id.as_uuid())
        .bind(order.rider_id.map(|r| *r.as_uuid()))
        .bind(Json(&order.pickup))
        .bind(Json(&order.dropoff))
        .bind(to_cents(order.subtotal)?)
        .bind(to_cents(order.delivery_fee)?)
        .bind(to_cents(order.total)?)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().and_then(|d| d.code()).as_deref() == Some(UNIQUE_VIOLATION) {
                DispatchError::Conflict(format!("order {} already exists", order.id))
            } else {
                db_err(e)
            }
        })?;

        for (position, item) in (0_i32..).zip(&order.items) {
            sqlx::query(
                r"
                INSERT INTO order_items
                    (id, order_id, position, item_id, name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(position)
            .bind(item.item_id.map(|i| *i.as_uuid()))
            .bind(&item.name)
            .bind(i64::from(item.quantity))
            .bind(to_cents(item.unit_price)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let payment = &draft.payment;
        sqlx::query(
            r"
            INSERT INTO payments
                (id, order_id, provider, status, amount_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.provider.as_str())
        .bind(payment.status.as_str())
        .bind(to_cents(payment.amount)?)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        insert_transaction(&mut tx, &draft.transaction).await?;
        insert_event(&mut tx, &draft.event).await?;

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(order_id = %order.id, total = %order.total, "Order persisted");
        Ok(())
    }

    async fn transition(
        &self,
        id: OrderId,
        command: OrderCommand,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DispatchError::not_found("order"))?;
        let order = hydrate(&mut tx, std::slice::from_ref(&row))
            .await?
            .pop()
            .ok_or_else(|| DispatchError::not_found("order"))?;

        let payment = sqlx::query("SELECT * FROM payments WHERE order_id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::payment)
            .transpose()?;

        // Dropping `tx` on a rejected command rolls back and releases the lock.
        let outcome = decide(&order, payment.as_ref(), command, at)?;

        sqlx::query("UPDATE orders SET status = $2, rider_id = $3, updated_at = $4 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(outcome.order.status.as_str())
            .bind(outcome.order.rider_id.map(|r| *r.as_uuid()))
            .bind(outcome.order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        insert_event(&mut tx, &outcome.event).await?;

        if let Some((payment, entry)) = &outcome.payment {
            sqlx::query("UPDATE payments SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(payment.id.as_uuid())
                .bind(payment.status.as_str())
                .bind(payment.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            insert_transaction(&mut tx, entry).await?;
        }

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(
            order_id = %id,
            from = %outcome.from,
            to = %outcome.order.status,
            "Order transition committed"
        );
        Ok(outcome)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let Some(row) = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        Ok(hydrate(&mut conn, std::slice::from_ref(&row)).await?.pop())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let query = match filter {
            OrderFilter::Customer(customer) => {
                sqlx::query("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
                    .bind(*customer.as_uuid())
            }
            OrderFilter::Merchant(merchant) => {
                sqlx::query("SELECT * FROM orders WHERE merchant_id = $1 ORDER BY created_at DESC")
                    .bind(*merchant.as_uuid())
            }
            OrderFilter::Unassigned => sqlx::query(
                r"
                SELECT * FROM orders
                WHERE status = 'CONFIRMED' AND rider_id IS NULL
                ORDER BY created_at DESC
                ",
            ),
            OrderFilter::All => sqlx::query("SELECT * FROM orders ORDER BY created_at DESC"),
        };

        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let order_rows = query.fetch_all(&mut *conn).await.map_err(db_err)?;
        hydrate(&mut conn, &order_rows).await
    }

    async fn tracking_events(&self, order: OrderId) -> Result<Vec<TrackingEvent>> {
        sqlx::query("SELECT * FROM tracking_events WHERE order_id = $1 ORDER BY seq ASC")
            .bind(order.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::tracking_event)
            .collect()
    }

    async fn find_tracking_event(&self, id: TrackingEventId) -> Result<Option<TrackingEvent>> {
        sqlx::query("SELECT * FROM tracking_events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::tracking_event)
            .transpose()
    }

    async fn find_payment(&self, order: OrderId) -> Result<Option<Payment>> {
        sqlx::query("SELECT * FROM payments WHERE order_id = $1")
            .bind(order.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::payment)
            .transpose()
    }

    async fn payment_transactions(&self, payment: PaymentId) -> Result<Vec<PaymentTransaction>> {
        sqlx::query("SELECT * FROM payment_transactions WHERE payment_id = $1 ORDER BY seq ASC")
            .bind(payment.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::payment_transaction)
            .collect()
    }

    async fn merchant_analytics(&self, merchant: UserId) -> Result<MerchantAnalytics> {
        let row = sqlx::query(
            r"
            SELECT
                COUNT(*) AS order_count,
                COALESCE(SUM(total_cents), 0)::BIGINT AS revenue_cents,
                (
                    SELECT (AVG(EXTRACT(EPOCH FROM (e.created_at - o2.created_at))) / 60)::DOUBLE PRECISION
                    FROM tracking_events e
                    JOIN orders o2 ON o2.id = e.order_id
                    WHERE o2.merchant_id = $1 AND e.status = 'DELIVERED'
                ) AS avg_minutes
            FROM orders
            WHERE merchant_id = $1
            ",
        )
        .bind(merchant.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let order_count: i64 = row.try_get("order_count").map_err(db_err)?;
        let revenue: i64 = row.try_get("revenue_cents").map_err(db_err)?;

        Ok(MerchantAnalytics {
            order_count: u64::try_from(order_count).unwrap_or_default(),
            revenue: u64::try_from(revenue)
                .map(Money::from_cents)
                .map_err(|_| DispatchError::Storage("negative revenue".into()))?,
            avg_delivery_time_minutes: row.try_get("avg_minutes").map_err(db_err)?,
        })
    }
}

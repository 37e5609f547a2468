//! Rider state, notifications and chat.

use crate::PgStore;
use crate::rows::{self, Result, db_err};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rush_core::UserId;
use rush_core::messaging::{ChatMessage, Notification};
use rush_core::store::{ChatStore, NotificationStore, RiderAvailability, RiderStore};
use rush_core::types::{ChatMessageId, Coordinates, OrderId};

#[async_trait]
impl RiderStore for PgStore {
    async fn availability(&self, rider: UserId) -> Result<RiderAvailability> {
        let row = sqlx::query("SELECT * FROM rider_availability WHERE rider_id = $1")
            .bind(rider.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref()
            .map_or_else(|| Ok(RiderAvailability::offline(rider)), rows::rider)
    }

    async fn find_rider(&self, rider: UserId) -> Result<Option<RiderAvailability>> {
        let row = sqlx::query("SELECT * FROM rider_availability WHERE rider_id = $1")
            .bind(rider.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(rows::rider).transpose()
    }

    async fn set_availability(
        &self,
        rider: UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<RiderAvailability> {
        let row = sqlx::query(
            r"
            INSERT INTO rider_availability (rider_id, is_online, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (rider_id) DO UPDATE
            SET is_online = EXCLUDED.is_online, updated_at = EXCLUDED.updated_at
            RETURNING *
            ",
        )
        .bind(rider.as_uuid())
        .bind(is_online)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        rows::rider(&row)
    }

    async fn record_location(
        &self,
        rider: UserId,
        location: Coordinates,
        at: DateTime<Utc>,
    ) -> Result<RiderAvailability> {
        let row = sqlx::query(
            r"
            INSERT INTO rider_availability (rider_id, latitude, longitude, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (rider_id) DO UPDATE
            SET latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            ",
        )
        .bind(rider.as_uuid())
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        rows::rider(&row)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO notifications (id, user_id, type, payload, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.as_uuid())
        .bind(notification.kind.as_str())
        .bind(&notification.payload)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_notifications(&self, user: UserId) -> Result<Vec<Notification>> {
        sqlx::query("SELECT * FROM notifications WHERE user_id = $1 ORDER BY seq DESC")
            .bind(user.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::notification)
            .collect()
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO chat_messages (id, order_id, sender_id, recipient_id, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(message.id.as_uuid())
        .bind(message.order_id.as_uuid())
        .bind(message.sender_id.as_uuid())
        .bind(message.recipient_id.as_uuid())
        .bind(&message.message)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_message(&self, id: ChatMessageId) -> Result<Option<ChatMessage>> {
        sqlx::query("SELECT * FROM chat_messages WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(rows::chat_message)
            .transpose()
    }

    async fn list_messages(&self, order: OrderId) -> Result<Vec<ChatMessage>> {
        sqlx::query("SELECT * FROM chat_messages WHERE order_id = $1 ORDER BY seq ASC")
            .bind(order.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(rows::chat_message)
            .collect()
    }
}

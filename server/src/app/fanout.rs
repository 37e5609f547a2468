//! Event fan-out worker.
//!
//! Turns one committed status change or chat message into persisted
//! notifications and live publishes:
//!
//! ```text
//! OrderStatus job ──► order:<id>:tracking          (ephemeral)
//!                 └─► for customer, rider?, merchant:
//!                         insert Notification ──► user:<id>:notifications
//!
//! ChatMessage job ──► order:<id>:chat
//!                 └─► insert Notification(recipient) ──► user:<id>:notifications
//! ```
//!
//! Jobs run at least once. A retry after a partial run publishes again and may
//! insert a second notification for a recipient that already got one.

use async_trait::async_trait;
use rush_core::environment::Clock;
use rush_core::messaging::{
    ChatMessage, FanOutJob, Notification, NotificationKind, Topic, tracking_payload,
};
use rush_core::store::DispatchStore;
use rush_core::types::{ChatMessageId, TrackingEventId};
use rush_core::{DispatchError, OrderId};
use rush_runtime::{Broker, BrokerError, JobError, JobHandler};
use serde_json::{Value, json};
use std::sync::Arc;

fn storage_failure(err: DispatchError) -> JobError {
    if err.is_retryable() {
        JobError::Transient(err.to_string())
    } else {
        JobError::Permanent(err.to_string())
    }
}

#[allow(clippy::needless_pass_by_value)]
fn broker_failure(err: BrokerError) -> JobError {
    JobError::Transient(err.to_string())
}

/// Executes [`FanOutJob`]s.
pub struct FanOutWorker {
    store: Arc<dyn DispatchStore>,
    broker: Arc<dyn Broker>,
    clock: Arc<dyn Clock>,
}

impl FanOutWorker {
    /// Creates a worker publishing through `broker`.
    #[must_use]
    pub fn new(store: Arc<dyn DispatchStore>, broker: Arc<dyn Broker>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            broker,
            clock,
        }
    }

    async fn publish(&self, topic: Topic, message: Value) -> Result<(), JobError> {
        self.broker
            .publish(&topic.to_string(), message)
            .await
            .map_err(broker_failure)
    }

    async fn notify(&self, notification: Notification) -> Result<(), JobError> {
        self.store
            .insert_notification(&notification)
            .await
            .map_err(storage_failure)?;
        self.publish(
            Topic::UserNotifications(notification.user_id),
            notification.live_payload(),
        )
        .await
    }

    async fn order_status(
        &self,
        order_id: OrderId,
        tracking_event_id: TrackingEventId,
    ) -> Result<(), JobError> {
        let order = self
            .store
            .find_order(order_id)
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| JobError::Permanent(format!("order {order_id} not found")))?;
        let event = self
            .store
            .find_tracking_event(tracking_event_id)
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| {
                JobError::Permanent(format!("tracking event {tracking_event_id} not found"))
            })?;

        self.publish(Topic::OrderTracking(order.id), tracking_payload(&event))
            .await?;

        let payload = json!({ "order_id": order.id, "status": event.status });
        let now = self.clock.now();
        for recipient in order.interested_parties() {
            let notification =
                Notification::new(recipient, NotificationKind::OrderStatus, payload.clone(), now);
            self.notify(notification).await?;
        }

        tracing::debug!(order_id = %order.id, status = %event.status, "Status fanned out");
        Ok(())
    }

    async fn chat_message(&self, message_id: ChatMessageId) -> Result<(), JobError> {
        let message: ChatMessage = self
            .store
            .find_message(message_id)
            .await
            .map_err(storage_failure)?
            .ok_or_else(|| JobError::Permanent(format!("chat message {message_id} not found")))?;

        self.publish(Topic::OrderChat(message.order_id), message.live_payload())
            .await?;

        let notification = Notification::new(
            message.recipient_id,
            NotificationKind::ChatMessage,
            json!({
                "order_id": message.order_id,
                "message_id": message.id,
                "sender_id": message.sender_id,
                "message": message.message,
            }),
            self.clock.now(),
        );
        self.notify(notification).await
    }
}

#[async_trait]
impl JobHandler<FanOutJob> for FanOutWorker {
    async fn handle(&self, job: &FanOutJob) -> Result<(), JobError> {
        match job {
            FanOutJob::OrderStatus {
                order_id,
                tracking_event_id,
                ..
            } => self.order_status(*order_id, *tracking_event_id).await,
            FanOutJob::ChatMessage { message_id } => self.chat_message(*message_id).await,
        }
    }
}

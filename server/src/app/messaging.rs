//! Chat relay and notification reads.
//!
//! An order has exactly two addressable chat parties: its customer and its
//! currently assigned rider. Merchants and admins may watch the chat topic but
//! are never recipients. Messages are persisted first; the live publish and the
//! recipient's notification happen on the fan-out pool.

use super::ServiceContext;
use rush_core::access::chat_recipient;
use rush_core::messaging::{ChatMessage, FanOutJob, Notification};
use rush_core::types::ChatMessageId;
use rush_core::{DispatchError, Order, OrderId, Principal, Result};

/// Longest accepted chat message, in characters.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 2000;

/// Chat and notification service.
pub struct MessagingService {
    ctx: ServiceContext,
}

impl MessagingService {
    /// Creates the service.
    #[must_use]
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// The order behind a tracking or chat socket, if the caller may watch it.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotFound`] when the order is missing or unrelated to the caller.
    pub async fn watch(&self, principal: &Principal, order_id: OrderId) -> Result<Order> {
        self.ctx.visible_order(principal, order_id).await
    }

    /// Sends `text` from the caller to the other party of the order.
    ///
    /// Returns `None` without writing anything when there is nobody to address:
    /// a customer writing before a rider is assigned, or a merchant or admin.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Validation`] for blank or oversized messages.
    pub async fn send_chat(
        &self,
        principal: &Principal,
        order_id: OrderId,
        text: &str,
    ) -> Result<Option<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DispatchError::validation("message", "must not be blank"));
        }
        if text.chars().count() > MAX_CHAT_MESSAGE_CHARS {
            return Err(DispatchError::validation("message", "message is too long"));
        }

        let order = self.ctx.visible_order(principal, order_id).await?;
        let Some(recipient_id) = chat_recipient(principal, &order) else {
            tracing::debug!(order_id = %order_id, sender_id = %principal.user_id, "Chat message has no recipient");
            return Ok(None);
        };

        let message = ChatMessage {
            id: ChatMessageId::new(),
            order_id,
            sender_id: principal.user_id,
            recipient_id,
            message: text.to_string(),
            created_at: self.ctx.clock.now(),
        };
        self.ctx.store.insert_message(&message).await?;

        if let Err(e) = self
            .ctx
            .jobs
            .enqueue(FanOutJob::ChatMessage {
                message_id: message.id,
            })
            .await
        {
            tracing::warn!(message_id = %message.id, error = %e, "Failed to schedule chat fan-out");
        }
        Ok(Some(message))
    }

    /// Persisted chat of an order, oldest first.
    pub async fn chat_history(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> Result<Vec<ChatMessage>> {
        self.ctx.visible_order(principal, order_id).await?;
        self.ctx.store.list_messages(order_id).await
    }

    /// The caller's notifications, newest first.
    pub async fn notifications(&self, principal: &Principal) -> Result<Vec<Notification>> {
        self.ctx.store.list_notifications(principal.user_id).await
    }
}

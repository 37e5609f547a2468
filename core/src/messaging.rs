//! Notifications, chat messages, fan-out jobs and pub/sub topics.

use crate::order::{OrderStatus, TrackingEvent};
use crate::types::{ChatMessageId, NotificationId, OrderId, TrackingEventId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Kind of a persisted notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// An order changed status
    OrderStatus,
    /// A chat message arrived
    ChatMessage,
}

impl NotificationKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderStatus => "ORDER_STATUS",
            Self::ChatMessage => "CHAT_MESSAGE",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDER_STATUS" => Ok(Self::OrderStatus),
            "CHAT_MESSAGE" => Ok(Self::ChatMessage),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// One recipient's copy of one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id
    pub id: NotificationId,
    /// Recipient
    pub user_id: UserId,
    /// Kind
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Event details
    pub payload: Value,
    /// Read flag; the engine never flips it
    pub is_read: bool,
    /// Insert time
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// New unread notification.
    #[must_use]
    pub fn new(user_id: UserId, kind: NotificationKind, payload: Value, at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            payload,
            is_read: false,
            created_at: at,
        }
    }

    /// Message pushed on the recipient's notification topic.
    #[must_use]
    pub fn live_payload(&self) -> Value {
        json!({
            "id": self.id,
            "type": self.kind.as_str(),
            "payload": self.payload,
            "created_at": self.created_at,
        })
    }
}

/// A message between an order's customer and its rider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id
    pub id: ChatMessageId,
    /// Order the conversation belongs to
    pub order_id: OrderId,
    /// Author
    pub sender_id: UserId,
    /// Addressee, resolved from the order at send time
    pub recipient_id: UserId,
    /// Text
    pub message: String,
    /// Insert time
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Message pushed on the order's chat topic.
    #[must_use]
    pub fn live_payload(&self) -> Value {
        json!({
            "id": self.id,
            "order_id": self.order_id,
            "sender_id": self.sender_id,
            "recipient_id": self.recipient_id,
            "message": self.message,
            "created_at": self.created_at,
        })
    }
}

/// Message pushed on an order's tracking topic.
#[must_use]
pub fn tracking_payload(event: &TrackingEvent) -> Value {
    json!({
        "id": event.id,
        "order_id": event.order_id,
        "status": event.status,
        "latitude": event.location.map(|l| l.latitude),
        "longitude": event.location.map(|l| l.longitude),
        "created_at": event.created_at,
    })
}

/// Work scheduled after a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FanOutJob {
    /// An order entered `status`
    OrderStatus {
        /// Order
        order_id: OrderId,
        /// Status entered
        status: OrderStatus,
        /// Tracking event written by the transition
        tracking_event_id: TrackingEventId,
    },
    /// A chat message was persisted
    ChatMessage {
        /// Message
        message_id: ChatMessageId,
    },
}

impl fmt::Display for FanOutJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderStatus {
                order_id, status, ..
            } => write!(f, "order-status({order_id}, {status})"),
            Self::ChatMessage { message_id } => write!(f, "chat-message({message_id})"),
        }
    }
}

/// Named pub/sub channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `order:<id>:tracking`
    OrderTracking(OrderId),
    /// `order:<id>:chat`
    OrderChat(OrderId),
    /// `user:<id>:notifications`
    UserNotifications(UserId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderTracking(id) => write!(f, "order:{id}:tracking"),
            Self::OrderChat(id) => write!(f, "order:{id}:chat"),
            Self::UserNotifications(id) => write!(f, "user:{id}:notifications"),
        }
    }
}

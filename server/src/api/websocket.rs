//! WebSocket endpoints for live order updates.
//!
//! # Connection
//!
//! Browsers cannot set headers on the handshake, so the token travels in the
//! query string:
//!
//! ```text
//! ws://localhost:8080/ws/notifications?token=<token>
//! ws://localhost:8080/ws/orders/:id/tracking?token=<token>
//! ws://localhost:8080/ws/orders/:id/chat?token=<token>
//! ```
//!
//! The handshake always succeeds; a caller that fails the checks is closed
//! right after it with `4001` (no valid token) or `4003` (not related to the
//! order).
//!
//! # Message Format
//!
//! **Server → Client (tracking):**
//! ```json
//! {"id": "...", "order_id": "...", "status": "IN_TRANSIT", "latitude": 52.52, "longitude": 13.4, "created_at": "..."}
//! ```
//!
//! **Server → Client (notification):**
//! ```json
//! {"id": "...", "type": "ORDER_STATUS", "payload": {"order_id": "...", "status": "ASSIGNED"}, "created_at": "..."}
//! ```
//!
//! **Client → Server (chat):**
//! ```json
//! {"message": "I'm at the door"}
//! ```
//!
//! Chat frames from the customer go to the assigned rider and vice versa.
//! Frames from merchants and admins, who may only watch, are dropped.

use crate::auth::AuthenticatedUser;
use crate::server::state::AppState;
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{WebSocket, close_code},
    },
    response::Response,
};
use rush_core::messaging::Topic;
use rush_core::{DispatchError, OrderId, Principal};
use rush_web::socket::{CLOSE_FORBIDDEN, CLOSE_UNAUTHENTICATED, pump, reject};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Inbound chat frame.
#[derive(Debug, Deserialize)]
struct ChatFrame {
    message: String,
}

async fn subscribe(state: &AppState, topic: Topic) -> Option<broadcast::Receiver<serde_json::Value>> {
    match state.broker.subscribe(&topic.to_string()).await {
        Ok(rx) => Some(rx),
        Err(e) => {
            tracing::error!(topic = %topic, error = %e, "Topic subscription failed");
            None
        }
    }
}

/// Checks the caller against the order and subscribes `topic`.
///
/// Closes the socket and returns `None` when the caller may not watch.
async fn join_order_topic(
    socket: WebSocket,
    state: &AppState,
    user: Option<AuthenticatedUser>,
    order_id: OrderId,
    topic: Topic,
) -> Option<(WebSocket, Principal, broadcast::Receiver<serde_json::Value>)> {
    let Some(AuthenticatedUser(principal)) = user else {
        reject(socket, CLOSE_UNAUTHENTICATED, "authentication required").await;
        return None;
    };

    match state.services.messaging.watch(&principal, order_id).await {
        Ok(_) => {}
        Err(DispatchError::NotFound { .. } | DispatchError::PermissionDenied(_)) => {
            reject(socket, CLOSE_FORBIDDEN, "not allowed to watch this order").await;
            return None;
        }
        Err(e) => {
            tracing::error!(order_id = %order_id, error = %e, "Socket authorization failed");
            reject(socket, close_code::ERROR, "internal error").await;
            return None;
        }
    }

    let Some(rx) = subscribe(state, topic).await else {
        reject(socket, close_code::ERROR, "internal error").await;
        return None;
    };
    Some((socket, principal, rx))
}

/// `GET /ws/notifications` - the caller's personal notification stream.
pub async fn notifications_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let Some(AuthenticatedUser(principal)) = user else {
            reject(socket, CLOSE_UNAUTHENTICATED, "authentication required").await;
            return;
        };
        let Some(rx) = subscribe(&state, Topic::UserNotifications(principal.user_id)).await else {
            reject(socket, close_code::ERROR, "internal error").await;
            return;
        };

        tracing::info!(user_id = %principal.user_id, "Notification socket connected");
        pump(socket, vec![rx], |_text: String| async {}).await;
    })
}

/// `GET /ws/orders/:id/tracking` - live status and position of one order.
pub async fn tracking_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    user: Option<AuthenticatedUser>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let topic = Topic::OrderTracking(order_id);
        let Some((socket, principal, rx)) =
            join_order_topic(socket, &state, user, order_id, topic).await
        else {
            return;
        };

        tracing::info!(order_id = %order_id, user_id = %principal.user_id, "Tracking socket connected");
        pump(socket, vec![rx], |_text: String| async {}).await;
    })
}

/// `GET /ws/orders/:id/chat` - the order's chat, both directions.
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    user: Option<AuthenticatedUser>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let topic = Topic::OrderChat(order_id);
        let Some((socket, principal, rx)) =
            join_order_topic(socket, &state, user, order_id, topic).await
        else {
            return;
        };

        tracing::info!(order_id = %order_id, user_id = %principal.user_id, "Chat socket connected");
        let messaging = Arc::clone(&state.services.messaging);
        pump(socket, vec![rx], move |text: String| {
            let messaging = Arc::clone(&messaging);
            async move {
                let frame: ChatFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(error = %e, "Ignoring malformed chat frame");
                        return;
                    }
                };
                if let Err(e) = messaging.send_chat(&principal, order_id, &frame.message).await {
                    tracing::debug!(order_id = %order_id, error = %e, "Chat message rejected");
                }
            }
        })
        .await;
    })
}

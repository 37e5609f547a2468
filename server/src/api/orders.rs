//! Endpoints shared by every role with a relationship to an order.
//!
//! - POST /api/orders/:id/status - Move an order along the lifecycle
//! - GET /api/orders/:id/chat - Persisted chat history
//! - GET /api/notifications - The caller's notifications

use crate::auth::AuthenticatedUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use rush_core::messaging::{ChatMessage, Notification};
use rush_core::types::Coordinates;
use rush_core::{DispatchError, Order, OrderId, OrderStatus};
use rush_web::WebResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to change an order's status.
#[derive(Debug, Deserialize, Serialize)]
pub struct StatusRequest {
    /// Target status
    pub status: OrderStatus,
    /// Latitude reported with the update
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude reported with the update
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl StatusRequest {
    fn location(&self) -> Result<Option<Coordinates>, DispatchError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Some(Coordinates::new(latitude, longitude))),
            (None, None) => Ok(None),
            _ => Err(DispatchError::validation(
                "location",
                "latitude and longitude must be given together",
            )),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Move an order to `status`.
///
/// Riders may pick up, start transit and deliver their own orders; merchants
/// may confirm or cancel orders of their branches; admins may request any
/// legal target.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/orders/<id>/status \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"status": "IN_TRANSIT", "latitude": 52.52, "longitude": 13.40}'
/// ```
pub async fn update_status(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> WebResult<Json<Order>> {
    let location = body.location()?;
    let order = state
        .services
        .orders
        .update_status(&principal, id, body.status, location)
        .await?;
    Ok(Json(order))
}

/// Chat history of an order, oldest first.
pub async fn chat_history(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
) -> WebResult<Json<Vec<ChatMessage>>> {
    Ok(Json(state.services.messaging.chat_history(&principal, id).await?))
}

/// The caller's notifications, newest first.
pub async fn notifications(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<Notification>>> {
    Ok(Json(state.services.messaging.notifications(&principal).await?))
}

//! Rider API endpoints.
//!
//! - GET /api/rider/availability - Current online flag and position
//! - POST /api/rider/availability - Go online or offline
//! - GET /api/rider/orders/available - Unassigned confirmed orders (online only)
//! - POST /api/rider/orders/accept - Race to accept an order
//! - POST /api/rider/location - Report the current position

use crate::auth::AuthenticatedUser;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use rush_core::store::RiderAvailability;
use rush_core::types::Coordinates;
use rush_core::{Order, OrderId};
use rush_web::WebResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to change the online flag.
#[derive(Debug, Deserialize, Serialize)]
pub struct AvailabilityRequest {
    /// Whether the rider wants to see available orders
    pub is_online: bool,
}

/// Request to accept an order.
#[derive(Debug, Deserialize, Serialize)]
pub struct AcceptRequest {
    /// Order to accept
    pub order_id: OrderId,
}

// ============================================================================
// Handlers
// ============================================================================

/// Current availability of the caller.
pub async fn get_availability(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<RiderAvailability>> {
    Ok(Json(state.services.assignment.availability(&principal).await?))
}

/// Go online or offline.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/rider/availability \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"is_online": true}'
/// ```
pub async fn set_availability(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<AvailabilityRequest>,
) -> WebResult<Json<RiderAvailability>> {
    let availability = state
        .services
        .assignment
        .set_availability(&principal, body.is_online)
        .await?;
    Ok(Json(availability))
}

/// Orders waiting for a rider. Empty while the caller is offline.
pub async fn available_orders(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(state.services.assignment.available_orders(&principal).await?))
}

/// Accept an order. Exactly one concurrent caller wins; the others get 409.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/rider/orders/accept \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"order_id": "550e8400-e29b-41d4-a716-446655440000"}'
/// ```
pub async fn accept_order(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<AcceptRequest>,
) -> WebResult<Json<Order>> {
    Ok(Json(state.services.assignment.accept(&principal, body.order_id).await?))
}

/// Report the caller's position: `{"latitude": 52.52, "longitude": 13.40}`.
pub async fn report_location(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<Coordinates>,
) -> WebResult<Json<RiderAvailability>> {
    Ok(Json(
        state
            .services
            .assignment
            .record_location(&principal, body)
            .await?,
    ))
}

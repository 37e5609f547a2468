//! Admin API endpoints.
//!
//! - GET /api/admin/orders - Every order
//! - POST /api/admin/orders/:id/reassign - Assign a rider, overriding any current one
//! - GET /api/admin/delivery-fee - Current flat delivery fee
//! - POST /api/admin/delivery-fee - Replace the flat delivery fee

use crate::auth::AuthenticatedUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use rush_core::{Money, Order, OrderId, UserId};
use rush_web::WebResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to reassign an order.
#[derive(Debug, Deserialize, Serialize)]
pub struct ReassignRequest {
    /// New rider
    pub rider_id: UserId,
}

/// The flat delivery fee, as read and written.
#[derive(Debug, Deserialize, Serialize)]
pub struct DeliveryFee {
    /// Fee charged on every non-empty order
    pub delivery_fee: Money,
}

// ============================================================================
// Handlers
// ============================================================================

/// Every order, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(state.services.orders.all_orders(&principal).await?))
}

/// Assign `rider_id` to a non-terminal order.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/admin/orders/<id>/reassign \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"rider_id": "..."}'
/// ```
pub async fn reassign_order(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
    Json(body): Json<ReassignRequest>,
) -> WebResult<Json<Order>> {
    let order = state
        .services
        .assignment
        .reassign(&principal, id, body.rider_id)
        .await?;
    Ok(Json(order))
}

/// Current flat delivery fee.
pub async fn get_delivery_fee(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<DeliveryFee>> {
    let delivery_fee = state.services.catalog.delivery_fee(&principal).await?;
    Ok(Json(DeliveryFee { delivery_fee }))
}

/// Replace the flat delivery fee. Affects future quotes only.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/admin/delivery-fee \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"delivery_fee": "7.50"}'
/// ```
pub async fn set_delivery_fee(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<DeliveryFee>,
) -> WebResult<Json<DeliveryFee>> {
    let delivery_fee = state
        .services
        .catalog
        .set_delivery_fee(&principal, body.delivery_fee)
        .await?;
    Ok(Json(DeliveryFee { delivery_fee }))
}

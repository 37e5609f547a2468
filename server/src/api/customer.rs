//! Customer API endpoints.
//!
//! - POST /api/customer/addresses - Save a delivery address
//! - GET /api/customer/addresses - List saved addresses
//! - POST /api/customer/orders/quote - Price a cart
//! - POST /api/customer/orders - Place an order
//! - GET /api/customer/orders - Order history
//! - POST /api/customer/orders/:id/confirm - Confirm payment
//! - GET /api/customer/orders/:id/tracking - Order with its tracking log
//! - POST /api/customer/orders/:id/reorder - Copy an order
//! - POST /api/customer/orders/:id/cancel - Cancel an order

use crate::app::{NewAddress, OrderTracking, PlaceOrder, QuoteView};
use crate::auth::AuthenticatedUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rush_core::catalog::CustomerAddress;
use rush_core::quote::QuoteRequest;
use rush_core::{Order, OrderId};
use rush_web::WebResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Optional body of a payment confirmation.
#[derive(Debug, Deserialize, Serialize)]
pub struct ConfirmRequest {
    /// Reference returned by the payment provider
    #[serde(default)]
    pub provider_reference: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Save a delivery address.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/customer/addresses \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"label": "Home", "line1": "742 Evergreen Ter", "city": "Springfield"}'
/// ```
pub async fn create_address(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<NewAddress>,
) -> WebResult<(StatusCode, Json<CustomerAddress>)> {
    let address = state.services.catalog.create_address(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// List saved addresses.
pub async fn list_addresses(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<CustomerAddress>>> {
    Ok(Json(state.services.catalog.addresses(&principal).await?))
}

/// Price a cart without placing it.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/customer/orders/quote \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"branch_id": "...", "address_id": "...", "items": [{"item_id": "...", "quantity": 2}]}'
/// # {"branch_id":"...","subtotal":"20.00","delivery_fee":"5.00","total":"25.00","items":[...]}
/// ```
pub async fn quote(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<QuoteRequest>,
) -> WebResult<Json<QuoteView>> {
    Ok(Json(state.services.orders.quote(&principal, &body).await?))
}

/// Place an order: the quote body plus an optional `payment_provider`.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/customer/orders \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"branch_id": "...", "address_id": "...", "items": [...], "payment_provider": "PAYPAL"}'
/// ```
pub async fn place_order(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<PlaceOrder>,
) -> WebResult<(StatusCode, Json<Order>)> {
    let order = state.services.orders.place(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Order history, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(state.services.orders.customer_orders(&principal).await?))
}

/// Confirm payment of an own order.
///
/// The body is optional; without a reference the ledger records `CONFIRMED`.
pub async fn confirm_order(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
    body: Option<Json<ConfirmRequest>>,
) -> WebResult<Json<Order>> {
    let reference = body.and_then(|Json(body)| body.provider_reference);
    let order = state.services.orders.confirm(&principal, id, reference).await?;
    Ok(Json(order))
}

/// An order with its tracking log.
pub async fn tracking(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
) -> WebResult<Json<OrderTracking>> {
    Ok(Json(state.services.orders.tracking(&principal, id).await?))
}

/// Copy an own order into a new `CREATED` order.
pub async fn reorder(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
) -> WebResult<(StatusCode, Json<Order>)> {
    let order = state.services.orders.reorder(&principal, id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Cancel a non-terminal order.
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<OrderId>,
) -> WebResult<Json<Order>> {
    Ok(Json(state.services.orders.cancel(&principal, id).await?))
}

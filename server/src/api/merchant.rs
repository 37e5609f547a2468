//! Merchant API endpoints.
//!
//! - POST /api/merchant/branches - Create a branch
//! - GET /api/merchant/branches - List own branches
//! - POST /api/merchant/items - Add an inventory item
//! - PATCH /api/merchant/items/:id - Update price, stock or active flag
//! - GET /api/merchant/orders - Orders of own branches
//! - GET /api/merchant/analytics - Order count, revenue, delivery time

use crate::app::{NewBranch, NewItem};
use crate::auth::AuthenticatedUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rush_core::Order;
use rush_core::catalog::{Branch, InventoryItem, ItemUpdate};
use rush_core::store::MerchantAnalytics;
use rush_core::types::ItemId;
use rush_web::WebResult;

/// Create a branch owned by the caller.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/merchant/branches \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"name": "Downtown", "line1": "1 Market St", "city": "Springfield"}'
/// ```
pub async fn create_branch(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<NewBranch>,
) -> WebResult<(StatusCode, Json<Branch>)> {
    let branch = state.services.catalog.create_branch(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

/// Branches owned by the caller.
pub async fn list_branches(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<Branch>>> {
    Ok(Json(state.services.catalog.branches(&principal).await?))
}

/// Add an item to one of the caller's branches.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/merchant/items \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"branch_id": "...", "name": "Burger", "price": "10.00", "stock": 50}'
/// ```
pub async fn create_item(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Json(body): Json<NewItem>,
) -> WebResult<(StatusCode, Json<InventoryItem>)> {
    let item = state.services.catalog.create_item(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Partially update an item. Placed orders keep their prices.
pub async fn update_item(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(id): Path<ItemId>,
    Json(body): Json<ItemUpdate>,
) -> WebResult<Json<InventoryItem>> {
    Ok(Json(
        state
            .services
            .catalog
            .update_item(&principal, id, body)
            .await?,
    ))
}

/// Orders of the caller's branches, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<Vec<Order>>> {
    Ok(Json(state.services.orders.merchant_orders(&principal).await?))
}

/// Order statistics over the caller's branches.
///
/// ```bash
/// curl http://localhost:8080/api/merchant/analytics -H "Authorization: Bearer <token>"
/// # {"order_count":12,"revenue":"300.00","avg_delivery_time_minutes":31.5}
/// ```
pub async fn analytics(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> WebResult<Json<MerchantAnalytics>> {
    Ok(Json(state.services.catalog.analytics(&principal).await?))
}

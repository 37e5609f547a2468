//! Router configuration for the dispatch server.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use crate::api::{admin, customer, merchant, orders, rider, websocket};
use axum::{
    Router,
    routing::{get, patch, post},
};
use rush_web::correlation_id_layer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete Axum router.
///
/// - `/health`, `/ready`, `/metrics` without authentication
/// - `/api/...` JSON endpoints, bearer-token authenticated
/// - `/ws/...` WebSocket endpoints, token in the query string
pub fn build_router(state: AppState) -> Router {
    let customer_routes = Router::new()
        .route(
            "/addresses",
            post(customer::create_address).get(customer::list_addresses),
        )
        .route("/orders/quote", post(customer::quote))
        .route(
            "/orders",
            post(customer::place_order).get(customer::list_orders),
        )
        .route("/orders/:id/confirm", post(customer::confirm_order))
        .route("/orders/:id/tracking", get(customer::tracking))
        .route("/orders/:id/reorder", post(customer::reorder))
        .route("/orders/:id/cancel", post(customer::cancel_order));

    let rider_routes = Router::new()
        .route(
            "/availability",
            get(rider::get_availability).post(rider::set_availability),
        )
        .route("/orders/available", get(rider::available_orders))
        .route("/orders/accept", post(rider::accept_order))
        .route("/location", post(rider::report_location));

    let merchant_routes = Router::new()
        .route(
            "/branches",
            post(merchant::create_branch).get(merchant::list_branches),
        )
        .route("/items", post(merchant::create_item))
        .route("/items/:id", patch(merchant::update_item))
        .route("/orders", get(merchant::list_orders))
        .route("/analytics", get(merchant::analytics));

    let admin_routes = Router::new()
        .route("/orders", get(admin::list_orders))
        .route("/orders/:id/reassign", post(admin::reassign_order))
        .route(
            "/delivery-fee",
            get(admin::get_delivery_fee).post(admin::set_delivery_fee),
        );

    let api_routes = Router::new()
        .nest("/customer", customer_routes)
        .nest("/rider", rider_routes)
        .nest("/merchant", merchant_routes)
        .nest("/admin", admin_routes)
        .route("/orders/:id/status", post(orders::update_status))
        .route("/orders/:id/chat", get(orders::chat_history))
        .route("/notifications", get(orders::notifications));

    let ws_routes = Router::new()
        .route("/notifications", get(websocket::notifications_socket))
        .route("/orders/:id/tracking", get(websocket::tracking_socket))
        .route("/orders/:id/chat", get(websocket::chat_socket));

    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/api", api_routes)
        .nest("/ws", ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(correlation_id_layer())
        .with_state(state)
}

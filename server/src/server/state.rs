//! Application state for the dispatch HTTP server.

use crate::app::Services;
use crate::auth::IdentityProvider;
use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use rush_core::store::DispatchStore;
use rush_runtime::Broker;
use std::sync::Arc;

/// Application state shared across all HTTP and WebSocket handlers.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application services
    pub services: Services,

    /// Token verification
    pub identity: Arc<dyn IdentityProvider>,

    /// Topic subscriptions for sockets
    pub broker: Arc<dyn Broker>,

    /// Storage, for readiness probes
    pub store: Arc<dyn DispatchStore>,

    /// Prometheus render handle, absent when another recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        services: Services,
        identity: Arc<dyn IdentityProvider>,
        broker: Arc<dyn Broker>,
        store: Arc<dyn DispatchStore>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            services,
            identity,
            broker,
            store,
            metrics,
        }
    }
}

// Lets `AuthenticatedUser` reach the identity provider.
impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}

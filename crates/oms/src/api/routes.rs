//! API routes for OMS

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use observability::RequestMetricsGuard;

use crate::api::handlers::*;
use crate::api::OmsApiState;
use crate::manager::OrderManager;

/// Create the OMS router
pub fn create_router(state: Arc<OmsApiState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Public
        .route("/public/rates", get(list_rates))
        .route("/public/rates/:symbol", get(get_rate))
        .route("/public/pairs", get(list_pairs))
        .route("/currencies", get(list_currencies).post(create_currency))
        .route("/currencies/:currency_id", patch(update_reserve))
        // Orders
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/me", get(my_orders))
        .route("/orders/analytics/summary", get(summary))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/status", patch(update_status))
        .route(
            "/orders/:order_id/transactions",
            post(record_payment).get(list_transactions),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(middleware::from_fn_with_state(state.clone(), track_metrics)),
        )
        .with_state(state)
}

async fn track_metrics(State(state): State<Arc<OmsApiState>>, request: Request, next: Next) -> Response {
    let mut guard = RequestMetricsGuard::new(&state.http_metrics);
    let response = next.run(request).await;
    guard.set_status(response.status().as_u16());
    response
}

/// Get the API state for the router
pub fn create_api_state(manager: OrderManager, service_name: &str) -> Arc<OmsApiState> {
    Arc::new(OmsApiState {
        manager: Arc::new(manager),
        http_metrics: observability::HttpMetrics::new(service_name),
    })
}

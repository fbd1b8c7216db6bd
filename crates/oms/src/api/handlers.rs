//! API handlers for OMS HTTP endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::error;

use common::{CurrencyId, OrderId};
use storage::{Currency, Transaction};

use crate::api::identity::Caller;
use crate::api::models::*;
use crate::api::OmsApiState;
use crate::error::OmsError;
use crate::manager::MAX_PAGE;
use crate::types::{CreateOrder, OrdersSummary, PaymentReceipt};

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map an OMS error to its HTTP status and error body
///
/// Internal errors are logged and answered without detail.
pub fn error_response(err: OmsError) -> ApiError {
    let status = match &err {
        OmsError::Validation(_) => StatusCode::BAD_REQUEST,
        OmsError::NotFound(_) => StatusCode::NOT_FOUND,
        OmsError::Forbidden(_) => StatusCode::FORBIDDEN,
        OmsError::PolicyDenied(_) => StatusCode::BAD_REQUEST,
        OmsError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        OmsError::PaymentIncomplete { .. } => StatusCode::CONFLICT,
        OmsError::InsufficientReserve { .. } => StatusCode::CONFLICT,
        OmsError::RateUnavailable(_) => StatusCode::BAD_GATEWAY,
        OmsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let (message, details) = match &err {
        OmsError::Internal(msg) => {
            error!(error = %msg, "Request failed");
            ("internal error".to_string(), None)
        }
        OmsError::PolicyDenied(breach) => (err.to_string(), serde_json::to_value(breach).ok()),
        _ => (err.to_string(), None),
    };

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: err.code().to_string(),
                message,
                details,
            },
        }),
    )
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse::<T>()
        .map_err(|_| error_response(OmsError::Validation(format!("invalid {} id '{}'", what, raw))))
}

/// Health check handler
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "swapd".to_string(),
    })
}

// ==================== Orders ====================

/// Create order handler
pub async fn create_order(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Json(req): Json<CreateOrder>,
) -> ApiResult<CreateOrderResponse> {
    let created = state
        .manager
        .create_order(&actor, req)
        .await
        .map_err(error_response)?;

    Ok(Json(CreateOrderResponse {
        success: true,
        default_price_used: created.pricing.is_fallback(),
        pricing: created.pricing,
        order: OrderResponse::from(created.order),
    }))
}

/// Get order handler
pub async fn get_order(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Path(order_id): Path<String>,
) -> ApiResult<OrderResponse> {
    let order_id: OrderId = parse_id(&order_id, "order")?;
    let order = state
        .manager
        .get_order(&actor, order_id)
        .await
        .map_err(error_response)?;
    Ok(Json(OrderResponse::from(order)))
}

/// Caller's own orders
pub async fn my_orders(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Query(params): Query<ListOrdersParams>,
) -> ApiResult<ListOrdersResponse> {
    let orders = state
        .manager
        .my_orders(&actor, params.limit.unwrap_or(50))
        .await
        .map_err(error_response)?;
    Ok(Json(ListOrdersResponse::new(orders)))
}

/// List orders handler (staff)
pub async fn list_orders(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Query(params): Query<ListOrdersParams>,
) -> ApiResult<ListOrdersResponse> {
    let orders = state
        .manager
        .list_orders(
            &actor,
            params.status,
            params.account_id,
            params.limit.unwrap_or(MAX_PAGE),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ListOrdersResponse::new(orders)))
}

/// Record payment handler
pub async fn record_payment(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Path(order_id): Path<String>,
    Json(req): Json<RecordPaymentRequest>,
) -> ApiResult<PaymentReceipt> {
    let order_id: OrderId = parse_id(&order_id, "order")?;
    let receipt = state
        .manager
        .record_payment(&actor, order_id, req.amount, req.external_ref)
        .await
        .map_err(error_response)?;
    Ok(Json(receipt))
}

/// Payments of an order
pub async fn list_transactions(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Path(order_id): Path<String>,
) -> ApiResult<Vec<Transaction>> {
    let order_id: OrderId = parse_id(&order_id, "order")?;
    let transactions = state
        .manager
        .list_transactions(&actor, order_id)
        .await
        .map_err(error_response)?;
    Ok(Json(transactions))
}

/// Status change handler (staff)
pub async fn update_status(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<OrderResponse> {
    let order_id: OrderId = parse_id(&order_id, "order")?;
    let order = state
        .manager
        .set_status(&actor, order_id, req.status)
        .await
        .map_err(error_response)?;
    Ok(Json(OrderResponse::from(order)))
}

/// Order analytics (staff)
pub async fn summary(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Query(params): Query<SummaryParams>,
) -> ApiResult<OrdersSummary> {
    let summary = state
        .manager
        .summary(&actor, params.days)
        .await
        .map_err(error_response)?;
    Ok(Json(summary))
}

// ==================== Currencies ====================

pub async fn list_currencies(State(state): State<Arc<OmsApiState>>) -> ApiResult<Vec<Currency>> {
    let currencies = state.manager.list_currencies().await.map_err(error_response)?;
    Ok(Json(currencies))
}

pub async fn create_currency(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Json(req): Json<CreateCurrencyRequest>,
) -> ApiResult<Currency> {
    let currency = state
        .manager
        .create_currency(&actor, &req.code, &req.name, req.reserve)
        .await
        .map_err(error_response)?;
    Ok(Json(currency))
}

pub async fn update_reserve(
    State(state): State<Arc<OmsApiState>>,
    Caller(actor): Caller,
    Path(currency_id): Path<String>,
    Json(req): Json<UpdateReserveRequest>,
) -> ApiResult<Currency> {
    let currency_id: CurrencyId = parse_id(&currency_id, "currency")?;
    let currency = state
        .manager
        .update_reserve(&actor, currency_id, req.reserve)
        .await
        .map_err(error_response)?;
    Ok(Json(currency))
}

// ==================== Public ====================

pub async fn get_rate(
    State(state): State<Arc<OmsApiState>>,
    Path(symbol): Path<String>,
) -> ApiResult<RateResponse> {
    let quote = state.manager.get_rate(&symbol).await.map_err(error_response)?;
    Ok(Json(RateResponse {
        symbol: quote.symbol,
        price: quote.price,
        origin: quote.origin,
    }))
}

pub async fn list_rates(
    State(state): State<Arc<OmsApiState>>,
    Query(params): Query<RatesParams>,
) -> ApiResult<RatesResponse> {
    let rates = state
        .manager
        .rates(params.symbols())
        .await
        .map_err(error_response)?;
    Ok(Json(RatesResponse {
        rates: rates.into_iter().collect(),
    }))
}

pub async fn list_pairs(State(state): State<Arc<OmsApiState>>) -> ApiResult<PairsResponse> {
    let pairs = state.manager.pairs().await.map_err(error_response)?;
    Ok(Json(PairsResponse { pairs }))
}

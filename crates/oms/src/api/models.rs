//! API models for OMS HTTP endpoints

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{AccountId, CurrencyId, OrderId, OrderStatus};
use rates::RateOrigin;
use storage::Order;

use crate::types::PriceOrigin;

/// Single order in API response
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub from_currency: CurrencyId,
    pub to_currency: CurrencyId,
    pub amount_from: Decimal,
    pub amount_to: Decimal,
    pub rate: Decimal,
    pub status: OrderStatus,
    pub wallet_address: String,
    #[serde(default)]
    pub payout_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            account_id: order.account_id,
            from_currency: order.from_currency,
            to_currency: order.to_currency,
            amount_from: order.amount_from,
            amount_to: order.amount_to,
            rate: order.rate,
            status: order.status,
            wallet_address: order.wallet_address,
            payout_details: order.payout_details,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Response after creating an order
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order: OrderResponse,
    pub pricing: PriceOrigin,
    /// True when the configured default price was used
    pub default_price_used: bool,
}

/// Request to record a payment
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub external_ref: Option<String>,
}

/// Request to change an order's status
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// List orders request parameters
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ListOrdersParams {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// List orders response
#[derive(Debug, Serialize, Deserialize)]
pub struct ListOrdersResponse {
    pub success: bool,
    pub returned_count: usize,
    pub orders: Vec<OrderResponse>,
}

impl ListOrdersResponse {
    pub fn new(orders: Vec<Order>) -> Self {
        let orders: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
        Self {
            success: true,
            returned_count: orders.len(),
            orders,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCurrencyRequest {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub reserve: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateReserveRequest {
    pub reserve: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RatesParams {
    /// Comma-separated symbols, e.g. `BTCUSDT,ETHUSDT`
    #[serde(default)]
    pub symbols: Option<String>,
}

impl RatesParams {
    pub fn symbols(&self) -> Option<Vec<String>> {
        self.symbols.as_ref().map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

/// Public rates; failing symbols map to null
#[derive(Debug, Serialize, Deserialize)]
pub struct RatesResponse {
    pub rates: BTreeMap<String, Option<Decimal>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateResponse {
    pub symbol: String,
    pub price: Decimal,
    pub origin: RateOrigin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PairsResponse {
    pub pairs: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryParams {
    #[serde(default = "default_summary_days")]
    pub days: u32,
}

fn default_summary_days() -> u32 {
    7
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Generic error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

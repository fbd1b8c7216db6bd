//! OMS request and result types

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::CurrencyId;
use rates::RateOrigin;
use settlement::SettleOutcome;
use storage::{Order, Transaction};

/// Request to open an exchange order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub from_currency: CurrencyId,
    pub to_currency: CurrencyId,
    pub amount_from: Decimal,
    /// Payout override; computed from the rate when absent
    #[serde(default)]
    pub amount_to: Option<Decimal>,
    #[serde(default)]
    pub payout_details: Option<String>,
}

/// How an order's rate was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrigin {
    Cache,
    Live,
    LastKnownGood,
    /// Rate resolution failed; the configured default price was used
    Default,
}

impl PriceOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceOrigin::Cache => "cache",
            PriceOrigin::Live => "live",
            PriceOrigin::LastKnownGood => "last_good",
            PriceOrigin::Default => "default",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PriceOrigin::Default)
    }
}

impl From<RateOrigin> for PriceOrigin {
    fn from(origin: RateOrigin) -> Self {
        match origin {
            RateOrigin::Cache => PriceOrigin::Cache,
            RateOrigin::Live => PriceOrigin::Live,
            RateOrigin::LastKnownGood => PriceOrigin::LastKnownGood,
        }
    }
}

/// A newly created order and how it was priced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedOrder {
    pub order: Order,
    /// Symbol the rate was resolved for
    pub symbol: String,
    pub pricing: PriceOrigin,
}

/// Result of recording a payment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub transaction: Transaction,
    /// Order after any status change the payment caused
    pub order: Order,
    pub paid_total: Decimal,
    /// Present when the payment triggered a settlement attempt
    pub settlement: Option<SettleOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusStats {
    pub count: u64,
    /// Sum of `amount_to`
    pub volume: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub volume: Decimal,
}

/// Order statistics over a trailing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrdersSummary {
    pub days: u32,
    /// Keyed by status name
    pub statuses: BTreeMap<String, StatusStats>,
    /// One entry per day in the window, oldest first
    pub daily: Vec<DailyVolume>,
}

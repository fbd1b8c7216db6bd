//! Persisted records
//!
//! Relations between records are plain id references; callers resolve them
//! through a [`crate::UnitOfWork`] lookup.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{AccountId, AuditEntryId, CurrencyId, OrderId, OrderStatus, TransactionId};

/// Audit action recording that an order's payout left the reserve.
///
/// Backends reject a second entry with this action and the same details.
pub const SETTLEMENT_ACTION: &str = "order.complete";

/// A currency with its reserve pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    /// Unique, upper-case
    pub code: String,
    pub name: String,
    /// Amount available for payouts, never negative
    pub reserve: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Currency {
    /// Create a new currency, normalizing the code to upper case
    pub fn new(code: &str, name: impl Into<String>, reserve: Decimal) -> Self {
        Self {
            id: CurrencyId::new(),
            code: normalize_code(code),
            name: name.into(),
            reserve,
            created_at: Utc::now(),
        }
    }
}

/// Canonical form of a currency code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// An exchange order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Owning account
    pub account_id: AccountId,
    /// Currency the user pays in
    pub from_currency: CurrencyId,
    /// Currency paid out from the reserve
    pub to_currency: CurrencyId,
    pub amount_from: Decimal,
    pub amount_to: Decimal,
    pub rate: Decimal,
    pub status: OrderStatus,
    /// Custodial deposit address
    pub wallet_address: String,
    pub payout_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order in `pending_payment`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        from_currency: CurrencyId,
        to_currency: CurrencyId,
        amount_from: Decimal,
        amount_to: Decimal,
        rate: Decimal,
        wallet_address: String,
        payout_details: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            account_id,
            from_currency,
            to_currency,
            amount_from,
            amount_to,
            rate,
            status: OrderStatus::PendingPayment,
            wallet_address,
            payout_details,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A payment received against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub order_id: OrderId,
    /// External reference, e.g. a chain transaction hash
    pub external_ref: Option<String>,
    pub amount: Decimal,
    /// Informational only
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(order_id: OrderId, amount: Decimal, external_ref: Option<String>) -> Self {
        Self {
            id: TransactionId::new(),
            order_id,
            external_ref,
            amount,
            status: "received".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One entry of the append-only action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor: Option<AccountId>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: Option<AccountId>, action: impl Into<String>, details: Option<String>) -> Self {
        Self {
            id: AuditEntryId::new(),
            actor,
            action: action.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// Filter for order listings; results are newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub account: Option<AccountId>,
    pub status: Option<OrderStatus>,
    pub limit: usize,
}

impl OrderFilter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether an order passes the account and status filters
    pub fn matches(&self, order: &Order) -> bool {
        self.account.map_or(true, |a| a == order.account_id)
            && self.status.map_or(true, |s| s == order.status)
    }
}

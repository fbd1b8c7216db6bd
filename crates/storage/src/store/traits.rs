//! Store and UnitOfWork trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use common::{AccountId, CurrencyId, OrderId, OrderStatus};

use crate::models::{AuditEntry, Currency, Order, OrderFilter, Transaction};
use crate::Result;

/// Store - hands out transactional units of work
///
/// Implementations (in-memory, PostgreSQL) are swapped without changing the
/// engine crates.
#[async_trait]
pub trait Store: Send + Sync {
    /// Begin a unit of work
    ///
    /// Writes become visible to other units of work only after
    /// [`UnitOfWork::commit`]. Dropping an uncommitted unit of work discards
    /// its writes.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// UnitOfWork - one atomic scope over all records
///
/// `*_for_update` reads lock the row until the unit of work ends, which
/// serializes concurrent writers of the same currency or order.
#[async_trait]
pub trait UnitOfWork: Send {
    // === Currencies ===

    async fn currency(&mut self, id: CurrencyId) -> Result<Option<Currency>>;

    /// Read a currency and lock it for the rest of the unit of work
    async fn currency_for_update(&mut self, id: CurrencyId) -> Result<Option<Currency>>;

    /// All currencies ordered by code
    async fn currencies(&mut self) -> Result<Vec<Currency>>;

    /// Insert a currency; `Duplicate` when the code is taken
    async fn insert_currency(&mut self, currency: &Currency) -> Result<()>;

    /// Overwrite a currency's reserve
    async fn update_reserve(&mut self, id: CurrencyId, reserve: Decimal) -> Result<()>;

    // === Orders ===

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Read an order and lock it for the rest of the unit of work
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Orders matching the filter, newest first, at most `filter.limit`
    async fn orders(&mut self, filter: &OrderFilter) -> Result<Vec<Order>>;

    /// Every order created at or after `since`
    async fn orders_since(&mut self, since: DateTime<Utc>) -> Result<Vec<Order>>;

    /// Insert an order; `ForeignKey` when a currency does not exist
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Serialize with every other unit of work that locks the same account
    ///
    /// Held until the unit of work ends. Read-then-insert checks against an
    /// account's orders (the daily volume) must take this lock first.
    async fn lock_account(&mut self, account: AccountId) -> Result<()>;

    /// Sum of `amount_to` over the account's orders created at or after `since`
    async fn volume_since(&mut self, account: AccountId, since: DateTime<Utc>) -> Result<Decimal>;

    // === Transactions ===

    /// Insert a payment; `ForeignKey` when the order does not exist
    async fn insert_transaction(&mut self, tx: &Transaction) -> Result<()>;

    /// Payments for an order, oldest first
    async fn transactions(&mut self, order_id: OrderId) -> Result<Vec<Transaction>>;

    /// Cumulative payment amount for an order
    async fn paid_total(&mut self, order_id: OrderId) -> Result<Decimal>;

    // === Audit ===

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()>;

    /// First entry with exactly this action and details
    async fn find_audit(&mut self, action: &str, details: &str) -> Result<Option<AuditEntry>>;

    // === Scope ===

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

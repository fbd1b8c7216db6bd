//! PostgreSQL store implementation

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Postgres, Row};
use uuid::Uuid;

use common::{AccountId, AuditEntryId, CurrencyId, OrderId, OrderStatus, TransactionId};

use crate::error::StorageError;
use crate::models::{AuditEntry, Currency, Order, OrderFilter, Transaction};
use crate::store::traits::{Store, UnitOfWork};
use crate::Result;

const ORDER_COLUMNS: &str = "id, account_id, from_currency, to_currency, amount_from, amount_to, \
     rate, status, wallet_address, payout_details, created_at, updated_at";

/// PostgreSQL store
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a store over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool
    pub async fn connect(url: &str, max_connections: u32, connect_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(format!("migration failed: {}", e)))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

struct PgUnitOfWork {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(StorageError::finished)
    }
}

/// Map driver errors, keeping constraint violations distinguishable
fn db_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(ref db) = e {
        match db.code().as_deref() {
            Some("23505") => return StorageError::Duplicate(db.message().to_string()),
            Some("23503") => return StorageError::ForeignKey(db.message().to_string()),
            _ => {}
        }
    }
    StorageError::Query(e.to_string())
}

fn row_to_currency(row: &PgRow) -> Result<Currency> {
    Ok(Currency {
        id: CurrencyId::from_uuid(row.try_get("id").map_err(db_error)?),
        code: row.try_get("code").map_err(db_error)?,
        name: row.try_get("name").map_err(db_error)?,
        reserve: row.try_get("reserve").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status").map_err(db_error)?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id").map_err(db_error)?),
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(db_error)?),
        from_currency: CurrencyId::from_uuid(row.try_get("from_currency").map_err(db_error)?),
        to_currency: CurrencyId::from_uuid(row.try_get("to_currency").map_err(db_error)?),
        amount_from: row.try_get("amount_from").map_err(db_error)?,
        amount_to: row.try_get("amount_to").map_err(db_error)?,
        rate: row.try_get("rate").map_err(db_error)?,
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StorageError::Query(e.to_string()))?,
        wallet_address: row.try_get("wallet_address").map_err(db_error)?,
        payout_details: row.try_get("payout_details").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id").map_err(db_error)?),
        order_id: OrderId::from_uuid(row.try_get("order_id").map_err(db_error)?),
        external_ref: row.try_get("external_ref").map_err(db_error)?,
        amount: row.try_get("amount").map_err(db_error)?,
        status: row.try_get("status").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

fn row_to_audit(row: &PgRow) -> Result<AuditEntry> {
    let actor: Option<Uuid> = row.try_get("actor").map_err(db_error)?;
    Ok(AuditEntry {
        id: AuditEntryId::from_uuid(row.try_get("id").map_err(db_error)?),
        actor: actor.map(AccountId::from_uuid),
        action: row.try_get("action").map_err(db_error)?,
        details: row.try_get("details").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn currency(&mut self, id: CurrencyId) -> Result<Option<Currency>> {
        let row = sqlx::query("SELECT id, code, name, reserve, created_at FROM currencies WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.conn()?)
            .await
            .map_err(db_error)?;
        row.as_ref().map(row_to_currency).transpose()
    }

    async fn currency_for_update(&mut self, id: CurrencyId) -> Result<Option<Currency>> {
        let row = sqlx::query(
            "SELECT id, code, name, reserve, created_at FROM currencies WHERE id = $1 FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error)?;
        row.as_ref().map(row_to_currency).transpose()
    }

    async fn currencies(&mut self) -> Result<Vec<Currency>> {
        let rows = sqlx::query("SELECT id, code, name, reserve, created_at FROM currencies ORDER BY code")
            .fetch_all(self.conn()?)
            .await
            .map_err(db_error)?;
        rows.iter().map(row_to_currency).collect()
    }

    async fn insert_currency(&mut self, currency: &Currency) -> Result<()> {
        sqlx::query(
            "INSERT INTO currencies (id, code, name, reserve, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(currency.id.0)
        .bind(&currency.code)
        .bind(&currency.name)
        .bind(currency.reserve)
        .bind(currency.created_at)
        .execute(self.conn()?)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_reserve(&mut self, id: CurrencyId, reserve: Decimal) -> Result<()> {
        let result = sqlx::query("UPDATE currencies SET reserve = $1 WHERE id = $2")
            .bind(reserve)
            .bind(id.0)
            .execute(self.conn()?)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("currency {}", id)));
        }
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id.0)
            .fetch_optional(self.conn()?)
            .await
            .map_err(db_error)?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error)?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn orders(&mut self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM orders
            WHERE ($1::uuid IS NULL OR account_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            ORDER_COLUMNS
        ))
        .bind(filter.account.map(|a| a.0))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit as i64)
        .fetch_all(self.conn()?)
        .await
        .map_err(db_error)?;
        rows.iter().map(row_to_order).collect()
    }

    async fn orders_since(&mut self, since: DateTime<Utc>) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE created_at >= $1 ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(since)
        .fetch_all(self.conn()?)
        .await
        .map_err(db_error)?;
        rows.iter().map(row_to_order).collect()
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            ORDER_COLUMNS
        ))
        .bind(order.id.0)
        .bind(order.account_id.0)
        .bind(order.from_currency.0)
        .bind(order.to_currency.0)
        .bind(order.amount_from)
        .bind(order.amount_to)
        .bind(order.rate)
        .bind(order.status.as_str())
        .bind(&order.wallet_address)
        .bind(&order.payout_details)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(self.conn()?)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id.0)
            .execute(self.conn()?)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("order {}", id)));
        }
        Ok(())
    }

    async fn lock_account(&mut self, account: AccountId) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(account.0.to_string())
            .execute(self.conn()?)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn volume_since(&mut self, account: AccountId, since: DateTime<Utc>) -> Result<Decimal> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount_to), 0) AS volume FROM orders \
             WHERE account_id = $1 AND created_at >= $2",
        )
        .bind(account.0)
        .bind(since)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error)?;
        row.try_get("volume").map_err(db_error)
    }

    async fn insert_transaction(&mut self, tx: &Transaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO transactions (id, order_id, external_ref, amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(tx.id.0)
        .bind(tx.order_id.0)
        .bind(&tx.external_ref)
        .bind(tx.amount)
        .bind(&tx.status)
        .bind(tx.created_at)
        .execute(self.conn()?)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn transactions(&mut self, order_id: OrderId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            "SELECT id, order_id, external_ref, amount, status, created_at FROM transactions \
             WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order_id.0)
        .fetch_all(self.conn()?)
        .await
        .map_err(db_error)?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn paid_total(&mut self, order_id: OrderId) -> Result<Decimal> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS paid FROM transactions WHERE order_id = $1",
        )
        .bind(order_id.0)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error)?;
        row.try_get("paid").map_err(db_error)
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_entries (id, actor, action, details, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.id.0)
        .bind(entry.actor.map(|a| a.0))
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(self.conn()?)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_audit(&mut self, action: &str, details: &str) -> Result<Option<AuditEntry>> {
        let row = sqlx::query(
            "SELECT id, actor, action, details, created_at FROM audit_entries \
             WHERE action = $1 AND details = $2 ORDER BY created_at LIMIT 1",
        )
        .bind(action)
        .bind(details)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error)?;
        row.as_ref().map(row_to_audit).transpose()
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or_else(StorageError::finished)?;
        tx.commit()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or_else(StorageError::finished)?;
        tx.rollback()
            .await
            .map_err(|e| StorageError::Transaction(e.to_string()))
    }
}

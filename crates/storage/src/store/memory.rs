//! In-memory store implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use common::{AccountId, CurrencyId, OrderId, OrderStatus};

use crate::error::StorageError;
use crate::models::{AuditEntry, Currency, Order, OrderFilter, Transaction, SETTLEMENT_ACTION};
use crate::store::traits::{Store, UnitOfWork};
use crate::Result;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    currencies: HashMap<CurrencyId, Currency>,
    orders: HashMap<OrderId, Order>,
    transactions: Vec<Transaction>,
    audit: Vec<AuditEntry>,
}

/// In-memory store for testing and development
///
/// A unit of work holds the store-wide lock for its whole lifetime and writes
/// to a staged copy of the state, so units of work are fully serialized and
/// an uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with currencies
    pub fn with_currencies(currencies: impl IntoIterator<Item = Currency>) -> Self {
        let state = MemoryState {
            currencies: currencies.into_iter().map(|c| (c.id, c)).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard: Some(guard),
            staged,
        }))
    }
}

struct MemoryUnitOfWork {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    staged: MemoryState,
}

impl MemoryUnitOfWork {
    fn state(&mut self) -> Result<&mut MemoryState> {
        if self.guard.is_none() {
            return Err(StorageError::finished());
        }
        Ok(&mut self.staged)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn currency(&mut self, id: CurrencyId) -> Result<Option<Currency>> {
        Ok(self.state()?.currencies.get(&id).cloned())
    }

    async fn currency_for_update(&mut self, id: CurrencyId) -> Result<Option<Currency>> {
        // The store-wide lock is already held
        self.currency(id).await
    }

    async fn currencies(&mut self) -> Result<Vec<Currency>> {
        let mut result: Vec<Currency> = self.state()?.currencies.values().cloned().collect();
        result.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(result)
    }

    async fn insert_currency(&mut self, currency: &Currency) -> Result<()> {
        let state = self.state()?;
        if state.currencies.values().any(|c| c.code == currency.code) {
            return Err(StorageError::Duplicate(format!("currency code {}", currency.code)));
        }
        if state.currencies.contains_key(&currency.id) {
            return Err(StorageError::Duplicate(format!("currency {}", currency.id)));
        }
        state.currencies.insert(currency.id, currency.clone());
        Ok(())
    }

    async fn update_reserve(&mut self, id: CurrencyId, reserve: Decimal) -> Result<()> {
        let currency = self
            .state()?
            .currencies
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("currency {}", id)))?;
        currency.reserve = reserve;
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state()?.orders.get(&id).cloned())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.order(id).await
    }

    async fn orders(&mut self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut result: Vec<Order> = self
            .state()?
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();

        // Newest first
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(filter.limit);
        Ok(result)
    }

    async fn orders_since(&mut self, since: DateTime<Utc>) -> Result<Vec<Order>> {
        let mut result: Vec<Order> = self
            .state()?
            .orders
            .values()
            .filter(|o| o.created_at >= since)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let state = self.state()?;
        for currency in [order.from_currency, order.to_currency] {
            if !state.currencies.contains_key(&currency) {
                return Err(StorageError::ForeignKey(format!("currency {}", currency)));
            }
        }
        if state.orders.contains_key(&order.id) {
            return Err(StorageError::Duplicate(format!("order {}", order.id)));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let order = self
            .state()?
            .orders
            .get_mut(&id)
            .ok_or_else(|| StorageError::not_found(format!("order {}", id)))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn lock_account(&mut self, _account: AccountId) -> Result<()> {
        // The store-wide lock is already held
        self.state()?;
        Ok(())
    }

    async fn volume_since(&mut self, account: AccountId, since: DateTime<Utc>) -> Result<Decimal> {
        Ok(self
            .state()?
            .orders
            .values()
            .filter(|o| o.account_id == account && o.created_at >= since)
            .map(|o| o.amount_to)
            .sum())
    }

    async fn insert_transaction(&mut self, tx: &Transaction) -> Result<()> {
        let state = self.state()?;
        if !state.orders.contains_key(&tx.order_id) {
            return Err(StorageError::ForeignKey(format!("order {}", tx.order_id)));
        }
        state.transactions.push(tx.clone());
        Ok(())
    }

    async fn transactions(&mut self, order_id: OrderId) -> Result<Vec<Transaction>> {
        Ok(self
            .state()?
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn paid_total(&mut self, order_id: OrderId) -> Result<Decimal> {
        Ok(self
            .state()?
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .map(|t| t.amount)
            .sum())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        let state = self.state()?;
        if entry.action == SETTLEMENT_ACTION
            && state
                .audit
                .iter()
                .any(|e| e.action == entry.action && e.details == entry.details)
        {
            return Err(StorageError::Duplicate(format!(
                "{} {}",
                entry.action,
                entry.details.as_deref().unwrap_or_default()
            )));
        }
        state.audit.push(entry.clone());
        Ok(())
    }

    async fn find_audit(&mut self, action: &str, details: &str) -> Result<Option<AuditEntry>> {
        Ok(self
            .state()?
            .audit
            .iter()
            .find(|e| e.action == action && e.details.as_deref() == Some(details))
            .cloned())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut guard = self.guard.take().ok_or_else(StorageError::finished)?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.guard.take().ok_or_else(StorageError::finished)?;
        self.staged = MemoryState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn seeded() -> (InMemoryStore, Currency, Currency) {
        let btc = Currency::new("btc", "Bitcoin", dec!(10));
        let usdt = Currency::new("USDT", "Tether", dec!(1000));
        let store = InMemoryStore::with_currencies([btc.clone(), usdt.clone()]);
        (store, btc, usdt)
    }

    fn order(account: AccountId, from: &Currency, to: &Currency, amount_to: Decimal) -> Order {
        Order::new(
            account,
            from.id,
            to.id,
            dec!(0.01),
            amount_to,
            dec!(100),
            "demo_0011223344556677".to_string(),
            None,
        )
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let (store, btc, _) = seeded();

        let mut uow = store.begin().await.unwrap();
        uow.update_reserve(btc.id, dec!(4)).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let reloaded = uow.currency(btc.id).await.unwrap().unwrap();
        assert_eq!(reloaded.reserve, dec!(4));
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let (store, btc, _) = seeded();

        {
            let mut uow = store.begin().await.unwrap();
            uow.update_reserve(btc.id, dec!(0)).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        uow.rollback().await.unwrap();
        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.currency(btc.id).await.unwrap().unwrap().reserve, dec!(10));
    }

    #[tokio::test]
    async fn test_finished_unit_rejects_calls() {
        let (store, btc, _) = seeded();
        let mut uow = store.begin().await.unwrap();
        uow.commit().await.unwrap();
        assert_matches!(uow.currency(btc.id).await, Err(StorageError::Transaction(_)));
        assert_matches!(uow.commit().await, Err(StorageError::Transaction(_)));
    }

    #[tokio::test]
    async fn test_currency_code_unique() {
        let (store, _, _) = seeded();
        let mut uow = store.begin().await.unwrap();
        let dup = Currency::new("Btc", "Another bitcoin", dec!(0));
        assert_matches!(uow.insert_currency(&dup).await, Err(StorageError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let (store, btc, _) = seeded();
        let ghost = Currency::new("XRP", "Ripple", dec!(0));
        let mut uow = store.begin().await.unwrap();

        let bad = order(AccountId::new(), &btc, &ghost, dec!(1));
        assert_matches!(uow.insert_order(&bad).await, Err(StorageError::ForeignKey(_)));

        let orphan = Transaction::new(OrderId::new(), dec!(1), None);
        assert_matches!(uow.insert_transaction(&orphan).await, Err(StorageError::ForeignKey(_)));
    }

    #[tokio::test]
    async fn test_aggregates() {
        let (store, btc, usdt) = seeded();
        let account = AccountId::new();
        let first = order(account, &btc, &usdt, dec!(1.5));
        let second = order(account, &btc, &usdt, dec!(2));
        let other = order(AccountId::new(), &btc, &usdt, dec!(7));

        let mut uow = store.begin().await.unwrap();
        for o in [&first, &second, &other] {
            uow.insert_order(o).await.unwrap();
        }
        uow.insert_transaction(&Transaction::new(first.id, dec!(0.25), None)).await.unwrap();
        uow.insert_transaction(&Transaction::new(first.id, dec!(0.5), Some("0xabc".into())))
            .await
            .unwrap();

        let since = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(uow.volume_since(account, since).await.unwrap(), dec!(3.5));
        assert_eq!(uow.paid_total(first.id).await.unwrap(), dec!(0.75));
        assert_eq!(uow.paid_total(second.id).await.unwrap(), Decimal::ZERO);
        assert_eq!(uow.transactions(first.id).await.unwrap().len(), 2);

        let mine = uow.orders(&OrderFilter::new(10).account(account)).await.unwrap();
        assert_eq!(mine.len(), 2);
        let capped = uow.orders(&OrderFilter::new(1)).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_settlement_audit_unique() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let key = Some("order_id=1".to_string());

        uow.append_audit(&AuditEntry::new(None, SETTLEMENT_ACTION, key.clone())).await.unwrap();
        assert_matches!(
            uow.append_audit(&AuditEntry::new(None, SETTLEMENT_ACTION, key.clone())).await,
            Err(StorageError::Duplicate(_))
        );

        // Other actions may repeat
        uow.append_audit(&AuditEntry::new(None, "order.status", key.clone())).await.unwrap();
        uow.append_audit(&AuditEntry::new(None, "order.status", key)).await.unwrap();

        assert!(uow.find_audit(SETTLEMENT_ACTION, "order_id=1").await.unwrap().is_some());
        assert!(uow.find_audit(SETTLEMENT_ACTION, "order_id=2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_units_of_work_are_serialized() {
        let (store, _, _) = seeded();
        let first = store.begin().await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(blocked.is_err());

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_account_lock_held_until_unit_ends() {
        let (store, btc, usdt) = seeded();
        let account = AccountId::new();

        let mut holder: Box<dyn UnitOfWork> = store.begin().await.unwrap();
        holder.lock_account(account).await.unwrap();
        holder.insert_order(&order(account, &btc, &usdt, dec!(1))).await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), store.begin()).await;
        assert!(waiting.is_err());

        holder.commit().await.unwrap();
        assert_matches!(holder.lock_account(account).await, Err(StorageError::Transaction(_)));

        let mut next = store.begin().await.unwrap();
        next.lock_account(account).await.unwrap();
        let since = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(next.volume_since(account, since).await.unwrap(), dec!(1));
    }
}

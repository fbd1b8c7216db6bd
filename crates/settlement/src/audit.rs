//! Audit recorder
//!
//! Entries are appended inside the unit of work that performs the recorded
//! change, so an entry exists if and only if its change committed.

use common::{AccountId, CurrencyId, OrderId, OrderStatus, TransactionId};
use storage::{AuditEntry, UnitOfWork};

use crate::error::Result;

/// Action names
pub mod actions {
    pub const ORDER_CREATE: &str = "order.create";
    pub const ORDER_STATUS: &str = "order.status";
    pub const ORDER_COMPLETE: &str = storage::SETTLEMENT_ACTION;
    pub const TX_CREATE: &str = "tx.create";
    pub const CURRENCY_CREATE: &str = "currency.create";
    pub const RESERVE_UPDATE: &str = "currency.reserve";
}

/// Idempotency key of an order
pub fn order_key(order_id: OrderId) -> String {
    format!("order_id={}", order_id)
}

pub fn status_key(order_id: OrderId, status: OrderStatus) -> String {
    format!("order_id={};status={}", order_id, status)
}

pub fn transaction_key(order_id: OrderId, tx_id: TransactionId) -> String {
    format!("order_id={};tx_id={}", order_id, tx_id)
}

pub fn currency_key(currency_id: CurrencyId) -> String {
    format!("currency_id={}", currency_id)
}

/// Append an entry
pub async fn record(
    uow: &mut dyn UnitOfWork,
    actor: Option<AccountId>,
    action: &str,
    details: impl Into<String>,
) -> Result<AuditEntry> {
    let entry = AuditEntry::new(actor, action, Some(details.into()));
    uow.append_audit(&entry).await?;
    Ok(entry)
}

/// Whether an order already has its completion entry
pub async fn is_settled(uow: &mut dyn UnitOfWork, order_id: OrderId) -> Result<bool> {
    Ok(uow
        .find_audit(actions::ORDER_COMPLETE, &order_key(order_id))
        .await?
        .is_some())
}

/// Append the completion entry of an order
pub async fn record_completion(
    uow: &mut dyn UnitOfWork,
    actor: Option<AccountId>,
    order_id: OrderId,
) -> Result<AuditEntry> {
    record(uow, actor, actions::ORDER_COMPLETE, order_key(order_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{InMemoryStore, Store};

    #[tokio::test]
    async fn test_completion_lookup() {
        let store = InMemoryStore::new();
        let order_id = OrderId::new();
        let mut uow = store.begin().await.unwrap();

        assert!(!is_settled(uow.as_mut(), order_id).await.unwrap());
        record(uow.as_mut(), None, actions::ORDER_STATUS, status_key(order_id, OrderStatus::Completed))
            .await
            .unwrap();
        assert!(!is_settled(uow.as_mut(), order_id).await.unwrap());

        let entry = record_completion(uow.as_mut(), None, order_id).await.unwrap();
        assert_eq!(entry.details, Some(format!("order_id={}", order_id)));
        assert!(is_settled(uow.as_mut(), order_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_roll_back_with_unit_of_work() {
        let store = InMemoryStore::new();
        let order_id = OrderId::new();

        {
            let mut uow = store.begin().await.unwrap();
            record_completion(uow.as_mut(), None, order_id).await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        assert!(!is_settled(uow.as_mut(), order_id).await.unwrap());
    }

    #[test]
    fn test_keys() {
        let order_id = OrderId::new();
        let tx_id = TransactionId::new();
        assert_eq!(
            transaction_key(order_id, tx_id),
            format!("order_id={};tx_id={}", order_id, tx_id)
        );
        assert!(status_key(order_id, OrderStatus::Paid).ends_with(";status=paid"));
    }
}

//! Reserve ledger
//!
//! The reserve of a currency is only written after its row is locked with
//! `currency_for_update`. The completion check, the debit and the completion
//! entry run in that same unit of work, so concurrent settlements of one
//! order debit once and concurrent settlements against one currency can
//! never drive its reserve below zero.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use common::{AccountId, CurrencyId};
use storage::{Currency, Order, UnitOfWork};

use crate::audit;
use crate::error::{Result, SettlementError};

/// Result of an idempotent debit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettleOutcome {
    /// Reserve debited and completion recorded
    Settled { debited: Decimal, remaining: Decimal },
    /// A completion entry already exists; nothing changed
    AlreadySettled,
    /// Reserve cannot cover the payout; nothing changed
    InsufficientReserve { required: Decimal, available: Decimal },
}

impl SettleOutcome {
    /// Label used for the settlement counter
    pub fn label(&self) -> &'static str {
        match self {
            SettleOutcome::Settled { .. } => "settled",
            SettleOutcome::AlreadySettled => "already_settled",
            SettleOutcome::InsufficientReserve { .. } => "insufficient_reserve",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, SettleOutcome::Settled { .. })
    }
}

/// Advisory check that a reserve covers `amount`; takes no hold
pub async fn ensure_sufficient_in(
    uow: &mut dyn UnitOfWork,
    currency_id: CurrencyId,
    amount: Decimal,
) -> Result<Currency> {
    if amount <= Decimal::ZERO {
        return Err(SettlementError::InvalidAmount(format!("{} is not positive", amount)));
    }

    let currency = uow
        .currency(currency_id)
        .await?
        .ok_or(SettlementError::CurrencyNotFound(currency_id))?;

    if currency.reserve < amount {
        return Err(SettlementError::InsufficientReserve {
            currency: currency.code,
            required: amount,
            available: currency.reserve,
        });
    }
    Ok(currency)
}

/// Debit an order's payout from its destination reserve at most once
///
/// Nothing is written unless the outcome is [`SettleOutcome::Settled`]. The
/// caller commits.
pub async fn debit_once_in(
    uow: &mut dyn UnitOfWork,
    order: &Order,
    actor: Option<AccountId>,
) -> Result<SettleOutcome> {
    if order.amount_to <= Decimal::ZERO {
        return Err(SettlementError::InvalidAmount(format!(
            "order {} pays out {}",
            order.id, order.amount_to
        )));
    }

    // Lock first: a concurrent settlement of this order waits here and then
    // sees the committed completion entry.
    let currency = uow
        .currency_for_update(order.to_currency)
        .await?
        .ok_or(SettlementError::CurrencyNotFound(order.to_currency))?;

    if audit::is_settled(uow, order.id).await? {
        info!(order_id = %order.id, "Order already settled");
        return Ok(SettleOutcome::AlreadySettled);
    }

    if currency.reserve < order.amount_to {
        warn!(
            order_id = %order.id,
            currency = %currency.code,
            required = %order.amount_to,
            available = %currency.reserve,
            "Insufficient reserve to settle order"
        );
        return Ok(SettleOutcome::InsufficientReserve {
            required: order.amount_to,
            available: currency.reserve,
        });
    }

    let remaining = currency.reserve - order.amount_to;
    uow.update_reserve(currency.id, remaining).await?;
    audit::record_completion(uow, actor, order.id).await?;

    info!(
        order_id = %order.id,
        currency = %currency.code,
        debited = %order.amount_to,
        %remaining,
        "Reserve debited"
    );

    Ok(SettleOutcome::Settled {
        debited: order.amount_to,
        remaining,
    })
}

/// Administrative overwrite of a reserve
pub async fn set_reserve_in(
    uow: &mut dyn UnitOfWork,
    currency_id: CurrencyId,
    reserve: Decimal,
    actor: Option<AccountId>,
) -> Result<Currency> {
    if reserve < Decimal::ZERO {
        return Err(SettlementError::InvalidAmount(format!("reserve {} is negative", reserve)));
    }

    let mut currency = uow
        .currency_for_update(currency_id)
        .await?
        .ok_or(SettlementError::CurrencyNotFound(currency_id))?;

    uow.update_reserve(currency_id, reserve).await?;
    audit::record(
        uow,
        actor,
        audit::actions::RESERVE_UPDATE,
        format!("{};reserve={}", audit::currency_key(currency_id), reserve),
    )
    .await?;

    info!(currency = %currency.code, from = %currency.reserve, to = %reserve, "Reserve updated");
    currency.reserve = reserve;
    Ok(currency)
}

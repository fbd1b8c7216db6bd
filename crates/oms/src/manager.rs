//! Order Manager - core business logic for exchange orders

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use common::{AccountId, Actor, CurrencyId, OrderId, OrderStatus};
use config::MasterConfig;
use observability::metrics::{
    record_limit_denial, record_order_created, record_settlement, record_status_transition,
};
use rates::{Quote, RateError, RateResolver};
use settlement::audit::{self, actions};
use settlement::ledger::{self, SettleOutcome};
use storage::{normalize_code, Currency, Order, OrderFilter, Store, Transaction, UnitOfWork};

use crate::error::{OmsError, Result};
use crate::policy::{start_of_day_utc, LimitDecision, LimitPolicy};
use crate::state;
use crate::types::{
    CreateOrder, CreatedOrder, DailyVolume, OrdersSummary, PaymentReceipt, PriceOrigin, StatusStats,
};
use crate::wallet;

/// Largest page returned by order listings
pub const MAX_PAGE: usize = 200;

/// Decimal places kept for stored amounts
const AMOUNT_SCALE: u32 = 8;

/// Integer digits available to stored amounts, NUMERIC(18, 8)
const AMOUNT_INTEGER_DIGITS: u32 = 10;

const MAX_SUMMARY_DAYS: u32 = 30;

fn order_not_found(id: OrderId) -> OmsError {
    OmsError::NotFound(format!("order {}", id))
}

fn currency_not_found(id: CurrencyId) -> OmsError {
    OmsError::NotFound(format!("currency {}", id))
}

/// Reject amounts the storage precision cannot hold exactly
fn check_precision(field: &str, amount: Decimal) -> Result<()> {
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(OmsError::Validation(format!(
            "{} has more than {} decimal places",
            field, AMOUNT_SCALE
        )));
    }
    if amount.abs() >= Decimal::from(10u64.pow(AMOUNT_INTEGER_DIGITS)) {
        return Err(OmsError::Validation(format!("{} is too large", field)));
    }
    Ok(())
}

/// Order Manager - handles the exchange order lifecycle
pub struct OrderManager {
    store: Arc<dyn Store>,
    rates: Arc<RateResolver>,
    limits: LimitPolicy,
    default_price: Decimal,
}

impl OrderManager {
    /// Create a new OrderManager
    pub fn new(
        store: Arc<dyn Store>,
        rates: Arc<RateResolver>,
        limits: LimitPolicy,
        default_price: Decimal,
    ) -> Self {
        Self {
            store,
            rates,
            limits,
            default_price,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, rates: Arc<RateResolver>, config: &MasterConfig) -> Self {
        Self::new(
            store,
            rates,
            LimitPolicy::from_config(&config.limits),
            config.rates.default_price,
        )
    }

    // ==================== Orders ====================

    /// Create an order
    ///
    /// Flow:
    /// 1. Validate amounts and look up both currencies
    /// 2. Resolve the pair rate, falling back to the default price
    /// 3. Check the caller's limits against today's volume
    /// 4. Pre-check the destination reserve (no hold is taken)
    /// 5. Store the order in `pending_payment` with a deposit address
    pub async fn create_order(&self, actor: &Actor, request: CreateOrder) -> Result<CreatedOrder> {
        info!(account = %actor.account_id, amount_from = %request.amount_from, "Creating order");

        // Step 1: Validation
        if request.amount_from <= Decimal::ZERO {
            return Err(OmsError::Validation("amount_from must be positive".to_string()));
        }
        if matches!(request.amount_to, Some(amount) if amount <= Decimal::ZERO) {
            return Err(OmsError::Validation("amount_to must be positive".to_string()));
        }
        check_precision("amount_from", request.amount_from)?;
        if let Some(amount) = request.amount_to {
            check_precision("amount_to", amount)?;
        }
        if request.from_currency == request.to_currency {
            return Err(OmsError::Validation(
                "source and destination currency must differ".to_string(),
            ));
        }

        let (from, to) = {
            let mut uow = self.store.begin().await?;
            let from = uow
                .currency(request.from_currency)
                .await?
                .ok_or_else(|| currency_not_found(request.from_currency))?;
            let to = uow
                .currency(request.to_currency)
                .await?
                .ok_or_else(|| currency_not_found(request.to_currency))?;
            uow.rollback().await?;
            (from, to)
        };

        // Step 2: Pricing, outside any unit of work
        let symbol = format!("{}{}", from.code, to.code);
        let (rate, pricing) = match self.rates.quote(&symbol).await {
            Ok(quote) => (quote.price, PriceOrigin::from(quote.origin)),
            Err(RateError::Unavailable(reason)) => {
                warn!(
                    symbol = %symbol,
                    %reason,
                    default_price = %self.default_price,
                    "Rate unavailable, pricing with default"
                );
                (self.default_price, PriceOrigin::Default)
            }
            Err(e) => return Err(e.into()),
        };

        let amount_to = match request.amount_to {
            Some(amount) => amount,
            None => request
                .amount_from
                .checked_mul(rate)
                .map(|amount| amount.round_dp(AMOUNT_SCALE))
                .ok_or_else(|| OmsError::Validation("amount_from is too large".to_string()))?,
        };
        if amount_to <= Decimal::ZERO {
            return Err(OmsError::Validation(format!(
                "payout {} at rate {} is not positive",
                amount_to, rate
            )));
        }
        check_precision("amount_to", amount_to)?;

        let mut uow = self.store.begin().await?;

        // Step 3: Limits, with the account locked until commit
        uow.lock_account(actor.account_id).await?;
        let volume_today = uow
            .volume_since(actor.account_id, start_of_day_utc(Utc::now()))
            .await?;
        if let LimitDecision::Deny(breach) = self.limits.check(actor.tier, amount_to, volume_today) {
            record_limit_denial(breach.label());
            warn!(account = %actor.account_id, %breach, "Order denied by limit policy");
            return Err(OmsError::PolicyDenied(breach));
        }

        // Step 4: Reserve pre-check
        ledger::ensure_sufficient_in(uow.as_mut(), to.id, amount_to).await?;

        // Step 5: Store
        let order = Order::new(
            actor.account_id,
            from.id,
            to.id,
            request.amount_from,
            amount_to,
            rate,
            wallet::deposit_address(),
            request
                .payout_details
                .map(|details| details.trim().to_string())
                .filter(|details| !details.is_empty()),
        );
        uow.insert_order(&order).await?;
        audit::record(
            uow.as_mut(),
            Some(actor.account_id),
            actions::ORDER_CREATE,
            format!(
                "{};amount_to={};rate={};pricing={}",
                audit::order_key(order.id),
                order.amount_to,
                order.rate,
                pricing.as_str()
            ),
        )
        .await?;
        uow.commit().await?;

        record_order_created(pricing.as_str());
        info!(
            order_id = %order.id,
            symbol = %symbol,
            rate = %rate,
            amount_to = %order.amount_to,
            pricing = pricing.as_str(),
            "Order created"
        );

        Ok(CreatedOrder {
            order,
            symbol,
            pricing,
        })
    }

    /// Record a payment against an order
    ///
    /// Once cumulative payments cover `amount_from`, an order awaiting
    /// payment becomes `paid` and an order in `processing` is settled.
    /// Payments on any other status are recorded without a status change.
    pub async fn record_payment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        amount: Decimal,
        external_ref: Option<String>,
    ) -> Result<PaymentReceipt> {
        if amount <= Decimal::ZERO {
            return Err(OmsError::Validation("payment amount must be positive".to_string()));
        }
        check_precision("amount", amount)?;
        let external_ref = external_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        if !actor.can_access(order.account_id) {
            return Err(OmsError::Forbidden(format!("order {}", order_id)));
        }

        let transaction = Transaction::new(order.id, amount, external_ref);
        uow.insert_transaction(&transaction).await?;
        audit::record(
            uow.as_mut(),
            Some(actor.account_id),
            actions::TX_CREATE,
            format!("{};amount={}", audit::transaction_key(order.id, transaction.id), amount),
        )
        .await?;

        let paid_total = uow.paid_total(order.id).await?;
        let previous = order.status;
        let mut settlement = None;

        if paid_total >= order.amount_from {
            match previous {
                OrderStatus::PendingPayment => {
                    transition_in(uow.as_mut(), &mut order, OrderStatus::Paid, actor).await?;
                }
                OrderStatus::Processing => {
                    let outcome = attempt_settle(uow.as_mut(), &order, actor).await?;
                    if let SettleOutcome::InsufficientReserve { .. } = outcome {
                        warn!(order_id = %order.id, "Payment recorded, order stays in processing");
                    } else {
                        transition_in(uow.as_mut(), &mut order, OrderStatus::Completed, actor).await?;
                    }
                    settlement = Some(outcome);
                }
                _ => {}
            }
        }

        uow.commit().await?;

        if let Some(outcome) = &settlement {
            record_settlement(outcome.label());
        }
        if order.status != previous {
            record_status_transition(previous.as_str(), order.status.as_str());
        }
        info!(
            order_id = %order.id,
            tx_id = %transaction.id,
            amount = %amount,
            paid_total = %paid_total,
            status = %order.status,
            "Payment recorded"
        );

        Ok(PaymentReceipt {
            transaction,
            order,
            paid_total,
            settlement,
        })
    }

    /// Move an order to a new status (operator or admin)
    ///
    /// Moving to `completed` settles the order; it fails without changes
    /// when payments fall short or the reserve cannot cover the payout.
    pub async fn set_status(&self, actor: &Actor, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        if !actor.is_staff() {
            return Err(OmsError::staff_only());
        }

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        let previous = order.status;
        state::validate_transition(previous, status)?;

        let mut settlement = None;
        if status == OrderStatus::Completed {
            let outcome = attempt_settle(uow.as_mut(), &order, actor).await?;
            if let SettleOutcome::InsufficientReserve { required, available } = outcome {
                record_settlement(outcome.label());
                let currency = uow
                    .currency(order.to_currency)
                    .await?
                    .map(|c| c.code)
                    .unwrap_or_else(|| order.to_currency.to_string());
                return Err(OmsError::InsufficientReserve {
                    currency,
                    required,
                    available,
                });
            }
            settlement = Some(outcome);
        }

        transition_in(uow.as_mut(), &mut order, status, actor).await?;
        uow.commit().await?;

        if let Some(outcome) = &settlement {
            record_settlement(outcome.label());
        }
        record_status_transition(previous.as_str(), status.as_str());
        info!(order_id = %order.id, from = %previous, to = %status, "Order status changed");

        Ok(order)
    }

    /// Get an order (owner or staff)
    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        let mut uow = self.store.begin().await?;
        let order = uow.order(order_id).await?.ok_or_else(|| order_not_found(order_id))?;
        uow.rollback().await?;

        if !actor.can_access(order.account_id) {
            return Err(OmsError::Forbidden(format!("order {}", order_id)));
        }
        Ok(order)
    }

    /// Payments of an order, oldest first (owner or staff)
    pub async fn list_transactions(&self, actor: &Actor, order_id: OrderId) -> Result<Vec<Transaction>> {
        let mut uow = self.store.begin().await?;
        let order = uow.order(order_id).await?.ok_or_else(|| order_not_found(order_id))?;
        if !actor.can_access(order.account_id) {
            return Err(OmsError::Forbidden(format!("order {}", order_id)));
        }
        let transactions = uow.transactions(order_id).await?;
        uow.rollback().await?;
        Ok(transactions)
    }

    /// The caller's own orders, newest first
    pub async fn my_orders(&self, actor: &Actor, limit: usize) -> Result<Vec<Order>> {
        let filter = OrderFilter::new(limit.clamp(1, MAX_PAGE)).account(actor.account_id);
        self.orders(&filter).await
    }

    /// All orders, optionally filtered (operator or admin)
    pub async fn list_orders(
        &self,
        actor: &Actor,
        status: Option<OrderStatus>,
        account: Option<AccountId>,
        limit: usize,
    ) -> Result<Vec<Order>> {
        if !actor.is_staff() {
            return Err(OmsError::staff_only());
        }
        let mut filter = OrderFilter::new(limit.clamp(1, MAX_PAGE));
        if let Some(status) = status {
            filter = filter.status(status);
        }
        if let Some(account) = account {
            filter = filter.account(account);
        }
        self.orders(&filter).await
    }

    async fn orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut uow = self.store.begin().await?;
        let orders = uow.orders(filter).await?;
        uow.rollback().await?;
        Ok(orders)
    }

    /// Per-status counts and daily volume over the last `days` days
    /// (operator or admin)
    ///
    /// `days` is clamped to 1..=30. Every day of the window is present in
    /// `daily`, with zero volume when no order was created.
    pub async fn summary(&self, actor: &Actor, days: u32) -> Result<OrdersSummary> {
        if !actor.is_staff() {
            return Err(OmsError::staff_only());
        }
        let days = days.clamp(1, MAX_SUMMARY_DAYS);
        let now = Utc::now();
        let since = now - Duration::days(i64::from(days));

        let mut uow = self.store.begin().await?;
        let orders = uow.orders_since(since).await?;
        uow.rollback().await?;

        let mut statuses: BTreeMap<String, StatusStats> = BTreeMap::new();
        let mut buckets: BTreeMap<_, Decimal> = BTreeMap::new();
        let mut day = since.date_naive();
        while day <= now.date_naive() {
            buckets.insert(day, Decimal::ZERO);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        for order in &orders {
            let stats = statuses.entry(order.status.as_str().to_string()).or_default();
            stats.count += 1;
            stats.volume += order.amount_to;
            *buckets.entry(order.created_at.date_naive()).or_default() += order.amount_to;
        }

        Ok(OrdersSummary {
            days,
            statuses,
            daily: buckets
                .into_iter()
                .map(|(date, volume)| DailyVolume { date, volume })
                .collect(),
        })
    }

    // ==================== Currencies ====================

    /// All currencies ordered by code (public)
    pub async fn list_currencies(&self) -> Result<Vec<Currency>> {
        let mut uow = self.store.begin().await?;
        let currencies = uow.currencies().await?;
        uow.rollback().await?;
        Ok(currencies)
    }

    /// Register a currency (operator or admin)
    pub async fn create_currency(
        &self,
        actor: &Actor,
        code: &str,
        name: &str,
        reserve: Decimal,
    ) -> Result<Currency> {
        if !actor.is_staff() {
            return Err(OmsError::staff_only());
        }
        let normalized = normalize_code(code);
        if normalized.len() < 2
            || normalized.len() > 10
            || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(OmsError::Validation(format!(
                "currency code '{}' must be 2-10 letters or digits",
                code
            )));
        }
        if name.trim().is_empty() {
            return Err(OmsError::Validation("currency name is required".to_string()));
        }
        if reserve < Decimal::ZERO {
            return Err(OmsError::Validation("reserve must not be negative".to_string()));
        }
        check_precision("reserve", reserve)?;

        let currency = Currency::new(&normalized, name.trim(), reserve);
        let mut uow = self.store.begin().await?;
        uow.insert_currency(&currency).await?;
        audit::record(
            uow.as_mut(),
            Some(actor.account_id),
            actions::CURRENCY_CREATE,
            format!("{};code={}", audit::currency_key(currency.id), currency.code),
        )
        .await?;
        uow.commit().await?;

        info!(currency = %currency.code, reserve = %currency.reserve, "Currency created");
        Ok(currency)
    }

    /// Overwrite a currency's reserve (operator or admin)
    pub async fn update_reserve(&self, actor: &Actor, currency_id: CurrencyId, reserve: Decimal) -> Result<Currency> {
        if !actor.is_staff() {
            return Err(OmsError::staff_only());
        }
        check_precision("reserve", reserve)?;
        let mut uow = self.store.begin().await?;
        let currency = ledger::set_reserve_in(uow.as_mut(), currency_id, reserve, Some(actor.account_id)).await?;
        uow.commit().await?;
        Ok(currency)
    }

    // ==================== Rates ====================

    /// Resolve one symbol (public)
    pub async fn get_rate(&self, symbol: &str) -> Result<Quote> {
        Ok(self.rates.quote(symbol).await?)
    }

    /// Resolve many symbols; failures map to `None` (public)
    ///
    /// Without symbols, lists every currency against the primary quote,
    /// or nothing when the quote currency is not registered.
    pub async fn rates(&self, symbols: Option<Vec<String>>) -> Result<Vec<(String, Option<Decimal>)>> {
        let symbols = match symbols {
            Some(symbols) => symbols,
            None => {
                let quote = self.rates.policy().primary_quote().to_string();
                let codes: Vec<String> = self
                    .list_currencies()
                    .await?
                    .into_iter()
                    .map(|c| c.code)
                    .collect();
                if !codes.contains(&quote) {
                    return Ok(Vec::new());
                }
                codes
                    .into_iter()
                    .filter(|code| *code != quote)
                    .map(|code| format!("{}{}", code, quote))
                    .collect()
            }
        };
        Ok(self.rates.quotes(&symbols).await)
    }

    /// Every ordered pair of distinct currencies as `FROM-TO` (public)
    pub async fn pairs(&self) -> Result<Vec<String>> {
        let codes: Vec<String> = self
            .list_currencies()
            .await?
            .into_iter()
            .map(|c| c.code)
            .collect();
        Ok(codes
            .iter()
            .flat_map(|a| {
                codes
                    .iter()
                    .filter(move |b| *b != a)
                    .map(move |b| format!("{}-{}", a, b))
            })
            .collect())
    }
}

/// Apply an already-validated status change and audit it
async fn transition_in(
    uow: &mut dyn UnitOfWork,
    order: &mut Order,
    status: OrderStatus,
    actor: &Actor,
) -> Result<()> {
    uow.update_order_status(order.id, status).await?;
    audit::record(
        uow,
        Some(actor.account_id),
        actions::ORDER_STATUS,
        audit::status_key(order.id, status),
    )
    .await?;
    order.status = status;
    order.updated_at = Utc::now();
    Ok(())
}

/// Settle a processing order whose payments cover it
///
/// Both completion triggers go through here: an operator moving the order
/// to `completed`, and a payment arriving while it is in `processing`.
async fn attempt_settle(uow: &mut dyn UnitOfWork, order: &Order, actor: &Actor) -> Result<SettleOutcome> {
    let paid = uow.paid_total(order.id).await?;
    if paid < order.amount_from {
        return Err(OmsError::PaymentIncomplete {
            paid,
            required: order.amount_from,
        });
    }
    Ok(ledger::debit_once_in(uow, order, Some(actor.account_id)).await?)
}

//! End-to-end order lifecycle against the in-memory store

use std::sync::Arc;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{AccountId, Actor, OrderStatus};
use oms::{CreateOrder, LimitBreach, LimitPolicy, OmsError, OrderManager, PriceOrigin};
use rates::{InMemoryPriceCache, PriceCache, RateResolver, StaticPriceSource, SymbolPolicy};
use settlement::SettleOutcome;
use storage::{Currency, InMemoryStore};

struct Exchange {
    manager: Arc<OrderManager>,
    source: Arc<StaticPriceSource>,
    cache: Arc<InMemoryPriceCache>,
    btc: Currency,
    usdt: Currency,
}

fn exchange(usdt_reserve: Decimal) -> Exchange {
    let btc = Currency::new("BTC", "Bitcoin", dec!(5));
    let usdt = Currency::new("USDT", "Tether", usdt_reserve);
    let store = InMemoryStore::with_currencies([btc.clone(), usdt.clone()]);
    let source = Arc::new(StaticPriceSource::new().with_price("BTCUSDT", dec!(100)));
    let cache = Arc::new(InMemoryPriceCache::new());
    let resolver = RateResolver::new(cache.clone(), source.clone(), SymbolPolicy::default());

    Exchange {
        manager: Arc::new(OrderManager::new(
            Arc::new(store),
            Arc::new(resolver),
            LimitPolicy::new(dec!(100), dec!(500)),
            dec!(100),
        )),
        source,
        cache,
        btc,
        usdt,
    }
}

impl Exchange {
    fn order(&self, amount_from: Decimal) -> CreateOrder {
        CreateOrder {
            from_currency: self.btc.id,
            to_currency: self.usdt.id,
            amount_from,
            amount_to: None,
            payout_details: None,
        }
    }

    async fn usdt_reserve(&self) -> Decimal {
        self.manager
            .list_currencies()
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.id == self.usdt.id)
            .unwrap()
            .reserve
    }
}

#[tokio::test]
async fn test_payment_while_processing_settles_once() {
    let ex = exchange(dec!(1000));
    let user = Actor::user(AccountId::new());
    let operator = Actor::operator(AccountId::new());

    let created = ex.manager.create_order(&user, ex.order(dec!(0.01))).await.unwrap();
    let order = created.order;
    assert_eq!(created.pricing, PriceOrigin::Live);
    assert_eq!(order.amount_to, dec!(1.0));
    assert_eq!(order.status, OrderStatus::PendingPayment);

    let receipt = ex
        .manager
        .record_payment(&user, order.id, dec!(1.0), Some("0xfeed".into()))
        .await
        .unwrap();
    assert_eq!(receipt.order.status, OrderStatus::Paid);

    ex.manager
        .set_status(&operator, order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let receipt = ex
        .manager
        .record_payment(&user, order.id, dec!(0.5), None)
        .await
        .unwrap();
    assert_eq!(receipt.order.status, OrderStatus::Completed);
    assert_matches!(
        receipt.settlement,
        Some(SettleOutcome::Settled { debited, .. }) if debited == dec!(1.0)
    );
    assert_eq!(ex.usdt_reserve().await, dec!(999.0));

    assert_matches!(
        ex.manager.set_status(&operator, order.id, OrderStatus::Completed).await,
        Err(OmsError::InvalidTransition {
            from: OrderStatus::Completed,
            to: OrderStatus::Completed
        })
    );
    assert_eq!(ex.usdt_reserve().await, dec!(999.0));

    let transactions = ex.manager.list_transactions(&user, order.id).await.unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].external_ref.as_deref(), Some("0xfeed"));
}

#[tokio::test]
async fn test_concurrent_completions_debit_once() {
    let ex = exchange(dec!(1000));
    let user = Actor::user(AccountId::new());
    let operator = Actor::operator(AccountId::new());

    let order = ex.manager.create_order(&user, ex.order(dec!(0.5))).await.unwrap().order;
    ex.manager.record_payment(&user, order.id, dec!(0.5), None).await.unwrap();
    ex.manager
        .set_status(&operator, order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let manager = ex.manager.clone();
        tasks.spawn(async move {
            if i % 2 == 0 {
                manager
                    .set_status(&operator, order.id, OrderStatus::Completed)
                    .await
                    .is_ok()
            } else {
                manager
                    .record_payment(&user, order.id, dec!(0.01), None)
                    .await
                    .map(|r| matches!(r.settlement, Some(SettleOutcome::Settled { .. })))
                    .unwrap_or(false)
            }
        });
    }

    let mut settled = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            settled += 1;
        }
    }

    assert_eq!(settled, 1);
    assert_eq!(ex.usdt_reserve().await, dec!(950));
    let order = ex.manager.get_order(&user, order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
}

#[tokio::test]
async fn test_daily_limit_for_unverified_account() {
    let ex = exchange(dec!(10000));
    let user = Actor::user(AccountId::new());

    // 480 of the 500 daily allowance
    for amount in [dec!(1), dec!(1), dec!(1), dec!(1), dec!(0.8)] {
        ex.manager.create_order(&user, ex.order(amount)).await.unwrap();
    }

    let denied = ex.manager.create_order(&user, ex.order(dec!(0.3))).await;
    assert_matches!(
        denied,
        Err(OmsError::PolicyDenied(LimitBreach::DailyVolume { volume_today, .. })) if volume_today == dec!(480)
    );

    let allowed = ex.manager.create_order(&user, ex.order(dec!(0.15))).await.unwrap();
    assert_eq!(allowed.order.amount_to, dec!(15));

    // Another account has its own allowance
    let other = Actor::user(AccountId::new());
    ex.manager.create_order(&other, ex.order(dec!(0.3))).await.unwrap();
}

#[tokio::test]
async fn test_pricing_falls_back_through_layers() {
    let ex = exchange(dec!(10000));
    let user = Actor::user(AccountId::new()).with_tier(common::VerificationTier::Verified);

    // Live fetch populates the short-lived and last-known-good keys
    let live = ex.manager.create_order(&user, ex.order(dec!(1))).await.unwrap();
    assert_eq!(live.pricing, PriceOrigin::Live);

    // Short-lived entry expires, source goes down: last-known-good answers
    ex.cache
        .set(
            "price:BTCUSDT",
            "{\"price\":\"100\"}",
            Some(std::time::Duration::ZERO),
        )
        .await
        .unwrap();
    ex.source.set_failing(true);
    ex.source.set_price("BTCUSDT", dec!(1));
    let fallback = ex.manager.create_order(&user, ex.order(dec!(1))).await.unwrap();
    assert_eq!(fallback.pricing, PriceOrigin::LastKnownGood);
    assert_eq!(fallback.order.rate, dec!(100));

    let quote = ex.manager.get_rate("btcusdt").await.unwrap();
    assert_eq!(quote.price, dec!(100));
}

//! Behavior of the in-memory store: atomic creation, serialized transitions,
//! listings and analytics.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

use chrono::Duration;
use rush_core::environment::Clock;
use rush_core::lifecycle::{OrderCommand, OrderDraft};
use rush_core::order::{OrderStatus, PaymentProvider, PaymentStatus, TransactionStatus};
use rush_core::quote::build_quote;
use rush_core::store::{
    FeeSettings, NotificationStore, OrderFilter, OrderStore, RiderStore,
};
use rush_core::types::{Coordinates, Money};
use rush_core::{DispatchError, OrderId, UserId};
use rush_testing::InMemoryStore;
use rush_testing::fixtures::Marketplace;
use rush_testing::mocks::{FixedClock, test_clock};
use std::sync::Arc;

async fn place(store: &InMemoryStore, market: &Marketplace, clock: &FixedClock) -> OrderId {
    let quote = build_quote(store, market.customer.user_id, &market.cart(2))
        .await
        .unwrap();
    let draft = quote.into_draft(market.customer.user_id, PaymentProvider::Stripe, clock.now());
    store.create_order(&draft).await.unwrap();
    draft.order.id
}

fn advance(market: &Marketplace, to: OrderStatus) -> OrderCommand {
    OrderCommand::Advance {
        by: market.admin,
        to,
        location: None,
    }
}

#[tokio::test]
async fn test_create_writes_order_payment_and_first_event() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;

    let id = place(&store, &market, &clock).await;

    let order = store.find_order(id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Created);
    assert_eq!(order.total, Money::from_cents(2500));
    assert_eq!(order.merchant_id, market.merchant.user_id);

    let payment = store.find_payment(id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, order.total);

    let ledger = store.payment_transactions(payment.id).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].provider_reference, "INIT");

    let events = store.tracking_events(id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, OrderStatus::Created);
}

#[tokio::test]
async fn test_duplicate_create_is_rejected() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;
    let quote = build_quote(&store, market.customer.user_id, &market.cart(1))
        .await
        .unwrap();
    let draft: OrderDraft = quote.into_draft(market.customer.user_id, PaymentProvider::Paypal, clock.now());

    store.create_order(&draft).await.unwrap();
    let err = store.create_order(&draft).await.unwrap_err();

    assert!(matches!(err, DispatchError::Conflict(_)));
}

#[tokio::test]
async fn test_full_lifecycle_logs_every_step() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;
    let id = place(&store, &market, &clock).await;

    store
        .transition(id, OrderCommand::Confirm { provider_reference: Some("pi_123".into()) }, clock.now())
        .await
        .unwrap();
    store
        .transition(id, OrderCommand::Accept { rider_id: market.rider.user_id }, clock.now())
        .await
        .unwrap();
    store
        .transition(id, advance(&market, OrderStatus::PickedUp), clock.now())
        .await
        .unwrap();
    store
        .transition(
            id,
            OrderCommand::Advance {
                by: market.rider,
                to: OrderStatus::InTransit,
                location: Some(Coordinates::new(39.8, -89.6)),
            },
            clock.now(),
        )
        .await
        .unwrap();
    let outcome = store
        .transition(id, advance(&market, OrderStatus::Delivered), clock.now())
        .await
        .unwrap();

    assert_eq!(outcome.from, OrderStatus::InTransit);
    assert_eq!(outcome.order.rider_id, Some(market.rider.user_id));

    let statuses: Vec<_> = store
        .tracking_events(id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Created,
            OrderStatus::Confirmed,
            OrderStatus::Assigned,
            OrderStatus::PickedUp,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ]
    );

    let payment = store.find_payment(id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Confirmed);
    let ledger = store.payment_transactions(payment.id).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[1].provider_reference, "pi_123");
    assert_eq!(ledger[1].status, TransactionStatus::Success);
}

#[tokio::test]
async fn test_rejected_transition_writes_nothing() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;
    let id = place(&store, &market, &clock).await;

    let err = store
        .transition(id, advance(&market, OrderStatus::Delivered), clock.now())
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::InvalidTransition { .. }));
    assert_eq!(store.tracking_events(id).await.unwrap().len(), 1);
    assert_eq!(
        store.find_order(id).await.unwrap().unwrap().status,
        OrderStatus::Created
    );
}

#[tokio::test]
async fn test_confirm_without_payment_fails() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;
    let id = place(&store, &market, &clock).await;
    store.remove_payment(id).await;

    let err = store
        .transition(id, OrderCommand::Confirm { provider_reference: None }, clock.now())
        .await
        .unwrap_err();

    assert_eq!(err, DispatchError::PaymentMissing);
}

#[tokio::test]
async fn test_concurrent_accepts_have_one_winner() {
    let clock = test_clock();
    let store = Arc::new(InMemoryStore::new());
    let market = Marketplace::seed(store.as_ref(), clock.now()).await;
    let id = place(&store, &market, &clock).await;
    store
        .transition(id, OrderCommand::Confirm { provider_reference: None }, clock.now())
        .await
        .unwrap();

    let at = clock.now();
    let racers = [market.rider.user_id, market.other_rider.user_id].map(|rider_id| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .transition(id, OrderCommand::Accept { rider_id }, at)
                .await
        })
    });

    let mut winners = 0;
    let mut conflicts = 0;
    for racer in racers {
        match racer.await.unwrap() {
            Ok(_) => winners += 1,
            Err(DispatchError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!((winners, conflicts), (1, 1));
    let assigned = store
        .tracking_events(id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.status == OrderStatus::Assigned)
        .count();
    assert_eq!(assigned, 1);
    assert_eq!(store.order_lock_count().await, 0);
}

#[tokio::test]
async fn test_order_locks_are_released_after_each_transition() {
    let clock = test_clock();
    let store = Arc::new(InMemoryStore::new());
    let market = Marketplace::seed(store.as_ref(), clock.now()).await;

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(place(&store, &market, &clock).await);
    }
    let at = clock.now();
    let confirms: Vec<_> = ids
        .iter()
        .map(|&id| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .transition(id, OrderCommand::Confirm { provider_reference: None }, at)
                    .await
            })
        })
        .collect();
    for confirm in confirms {
        confirm.await.unwrap().unwrap();
    }
    // rejected commands release too
    store
        .transition(ids[0], advance(&market, OrderStatus::Delivered), at)
        .await
        .unwrap_err();

    assert_eq!(store.order_lock_count().await, 0);
}

#[tokio::test]
async fn test_unassigned_listing_only_shows_open_confirmed_orders() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;
    let created = place(&store, &market, &clock).await;
    clock.advance(Duration::minutes(1));
    let open = place(&store, &market, &clock).await;
    clock.advance(Duration::minutes(1));
    let taken = place(&store, &market, &clock).await;

    for id in [open, taken] {
        store
            .transition(id, OrderCommand::Confirm { provider_reference: None }, clock.now())
            .await
            .unwrap();
    }
    store
        .transition(taken, OrderCommand::Accept { rider_id: market.rider.user_id }, clock.now())
        .await
        .unwrap();

    let unassigned: Vec<_> = store
        .list_orders(OrderFilter::Unassigned)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(unassigned, vec![open]);

    let mine: Vec<_> = store
        .list_orders(OrderFilter::Customer(market.customer.user_id))
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(mine, vec![taken, open, created]);
}

#[tokio::test]
async fn test_merchant_analytics() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;

    let empty = store.merchant_analytics(market.merchant.user_id).await.unwrap();
    assert_eq!(empty.order_count, 0);
    assert_eq!(empty.avg_delivery_time_minutes, None);

    let delivered = place(&store, &market, &clock).await;
    place(&store, &market, &clock).await;

    store
        .force_status(delivered, OrderStatus::InTransit, Some(market.rider.user_id))
        .await;
    clock.advance(Duration::minutes(45));
    store
        .transition(delivered, advance(&market, OrderStatus::Delivered), clock.now())
        .await
        .unwrap();

    let stats = store.merchant_analytics(market.merchant.user_id).await.unwrap();
    assert_eq!(stats.order_count, 2);
    assert_eq!(stats.revenue, Money::from_cents(5000));
    assert_eq!(stats.avg_delivery_time_minutes, Some(45.0));

    let other = store
        .merchant_analytics(market.other_merchant.user_id)
        .await
        .unwrap();
    assert_eq!(other.order_count, 0);
}

#[tokio::test]
async fn test_fee_setting_defaults_and_updates() {
    let store = InMemoryStore::new();
    assert_eq!(store.flat_delivery_fee().await.unwrap(), Money::from_cents(500));

    store.set_flat_delivery_fee(Money::from_cents(799)).await.unwrap();
    assert_eq!(store.flat_delivery_fee().await.unwrap(), Money::from_cents(799));
}

#[tokio::test]
async fn test_rider_defaults_to_offline() {
    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;

    let initial = store.availability(market.rider.user_id).await.unwrap();
    assert!(!initial.is_online);
    assert_eq!(initial.location, None);

    let stranger = UserId::new();
    assert!(!store.availability(stranger).await.unwrap().is_online);
    assert_eq!(store.find_rider(stranger).await.unwrap(), None);
    assert!(store.find_rider(market.rider.user_id).await.unwrap().is_some());

    store
        .record_location(market.rider.user_id, Coordinates::new(1.0, 2.0), clock.now())
        .await
        .unwrap();
    let online = store
        .set_availability(market.rider.user_id, true, clock.now())
        .await
        .unwrap();
    assert!(online.is_online);
    assert_eq!(online.location, Some(Coordinates::new(1.0, 2.0)));
}

#[tokio::test]
async fn test_injected_notification_failures_are_consumed() {
    use rush_core::messaging::{Notification, NotificationKind};

    let clock = test_clock();
    let store = InMemoryStore::new();
    let market = Marketplace::seed(&store, clock.now()).await;
    let note = Notification::new(
        market.customer.user_id,
        NotificationKind::OrderStatus,
        serde_json::json!({}),
        clock.now(),
    );

    store.fail_next_notification_inserts(1);
    assert!(store.insert_notification(&note).await.is_err());
    store.insert_notification(&note).await.unwrap();

    assert_eq!(store.list_notifications(market.customer.user_id).await.unwrap().len(), 1);
}

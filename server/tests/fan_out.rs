//! Fan-out of status changes and chat messages to notifications and topics.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

mod common;

use common::Harness;
use rush_core::messaging::{FanOutJob, NotificationKind, Topic};
use rush_core::store::NotificationStore;
use rush_core::types::TrackingEventId;
use rush_core::{DispatchError, OrderId, OrderStatus};
use rush_runtime::{
    Broker, InProcessBroker, JobError, JobHandler, JobRunnerConfig, RetryPolicy,
};
use rush_server::Application;
use rush_server::app::FanOutWorker;
use rush_server::auth::SignedTokenIdentity;
use std::sync::Arc;
use std::time::Duration;

fn worker(h: &Harness, broker: &Arc<InProcessBroker>) -> FanOutWorker {
    FanOutWorker::new(h.store.clone(), broker.clone(), h.clock.clone())
}

async fn last_job(h: &Harness) -> FanOutJob {
    h.jobs.jobs().await.pop().expect("a scheduled job")
}

#[tokio::test]
async fn test_status_change_notifies_customer_rider_and_merchant() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    let order = h.assigned().await;
    let job = last_job(&h).await;

    worker(&h, &broker).handle(&job).await.unwrap();

    let notifications = h.store.all_notifications().await;
    assert_eq!(notifications.len(), 3);
    let mut recipients: Vec<_> = notifications.iter().map(|n| n.user_id).collect();
    recipients.sort();
    let mut expected = vec![
        h.market.customer.user_id,
        h.market.rider.user_id,
        h.market.merchant.user_id,
    ];
    expected.sort();
    assert_eq!(recipients, expected);

    for notification in &notifications {
        assert_eq!(notification.kind, NotificationKind::OrderStatus);
        assert!(!notification.is_read);
        assert_eq!(notification.payload["status"], "ASSIGNED");
        assert_eq!(notification.payload["order_id"], order.id.to_string());
    }
}

#[tokio::test]
async fn test_status_change_without_rider_notifies_two_parties() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    h.confirmed().await;
    let job = last_job(&h).await;

    worker(&h, &broker).handle(&job).await.unwrap();

    let notifications = h.store.all_notifications().await;
    assert_eq!(notifications.len(), 2);
    assert!(notifications
        .iter()
        .all(|n| n.user_id != h.market.rider.user_id));
}

#[tokio::test]
async fn test_status_change_is_published_to_tracking_and_user_topics() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    let order = h.assigned().await;
    let mut tracking = broker
        .subscribe(&Topic::OrderTracking(order.id).to_string())
        .await
        .unwrap();
    let mut customer = broker
        .subscribe(&Topic::UserNotifications(h.market.customer.user_id).to_string())
        .await
        .unwrap();
    let job = last_job(&h).await;

    worker(&h, &broker).handle(&job).await.unwrap();

    let event = tracking.recv().await.unwrap();
    assert_eq!(event["status"], "ASSIGNED");
    assert_eq!(event["order_id"], order.id.to_string());

    let live = customer.recv().await.unwrap();
    assert_eq!(live["type"], "ORDER_STATUS");
    assert_eq!(live["payload"]["status"], "ASSIGNED");

    let stored = h
        .store
        .list_notifications(h.market.customer.user_id)
        .await
        .unwrap();
    assert_eq!(live["id"], stored[0].id.to_string());
}

#[tokio::test]
async fn test_notification_failure_is_transient() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    h.assigned().await;
    let job = last_job(&h).await;
    h.store.fail_next_notification_inserts(1);

    let err = worker(&h, &broker).handle(&job).await.unwrap_err();

    assert!(matches!(err, JobError::Transient(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_missing_order_is_permanent() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    let job = FanOutJob::OrderStatus {
        order_id: OrderId::new(),
        status: OrderStatus::Created,
        tracking_event_id: TrackingEventId::new(),
    };

    let err = worker(&h, &broker).handle(&job).await.unwrap_err();

    assert!(matches!(err, JobError::Permanent(_)));
    assert!(h.store.all_notifications().await.is_empty());
}

#[tokio::test]
async fn test_customer_chat_before_assignment_goes_nowhere() {
    let h = Harness::new().await;
    let order = h.confirmed().await;
    let jobs_before = h.jobs.jobs().await.len();

    let sent = h
        .services
        .messaging
        .send_chat(&h.market.customer, order.id, "hello?")
        .await
        .unwrap();

    assert!(sent.is_none());
    assert_eq!(h.jobs.jobs().await.len(), jobs_before);
    let history = h
        .services
        .messaging
        .chat_history(&h.market.customer, order.id)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_chat_is_routed_to_the_other_party() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    let order = h.assigned().await;
    let mut chat = broker
        .subscribe(&Topic::OrderChat(order.id).to_string())
        .await
        .unwrap();

    let message = h
        .services
        .messaging
        .send_chat(&h.market.customer, order.id, "  ring twice  ")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.recipient_id, h.market.rider.user_id);
    assert_eq!(message.message, "ring twice");

    let job = last_job(&h).await;
    assert_eq!(job, FanOutJob::ChatMessage { message_id: message.id });
    worker(&h, &broker).handle(&job).await.unwrap();

    let live = chat.recv().await.unwrap();
    assert_eq!(live["message"], "ring twice");

    let notifications = h.store.all_notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, h.market.rider.user_id);
    assert_eq!(notifications[0].kind, NotificationKind::ChatMessage);
    assert_eq!(notifications[0].payload["message"], "ring twice");

    let reply = h
        .services
        .messaging
        .send_chat(&h.market.rider, order.id, "on my way")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.recipient_id, h.market.customer.user_id);
}

#[tokio::test]
async fn test_chat_rejects_blank_and_oversized_messages() {
    let h = Harness::new().await;
    let order = h.assigned().await;

    let blank = h
        .services
        .messaging
        .send_chat(&h.market.customer, order.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(blank, DispatchError::Validation { field: "message", .. }));

    let long = "x".repeat(2001);
    let oversized = h
        .services
        .messaging
        .send_chat(&h.market.customer, order.id, &long)
        .await
        .unwrap_err();
    assert!(matches!(oversized, DispatchError::Validation { field: "message", .. }));
}

#[tokio::test]
async fn test_merchant_may_watch_but_not_write() {
    let h = Harness::new().await;
    let order = h.assigned().await;

    h.services
        .messaging
        .watch(&h.market.merchant, order.id)
        .await
        .unwrap();
    let sent = h
        .services
        .messaging
        .send_chat(&h.market.merchant, order.id, "hi")
        .await
        .unwrap();

    assert!(sent.is_none());
    let err = h
        .services
        .messaging
        .watch(&h.market.other_merchant, order.id)
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::not_found("order"));
}

#[tokio::test]
async fn test_runner_retries_through_a_transient_failure() {
    let h = Harness::new().await;
    let broker = Arc::new(InProcessBroker::new());
    let app = Application::assemble(
        h.store.clone(),
        broker.clone(),
        h.clock.clone(),
        Arc::new(SignedTokenIdentity::new("test-secret")),
        JobRunnerConfig {
            workers: 2,
            queue_capacity: 16,
            retry: RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(1))
                .build(),
        },
        None,
    );
    let mut inbox = broker
        .subscribe(&Topic::UserNotifications(h.market.customer.user_id).to_string())
        .await
        .unwrap();
    h.store.fail_next_notification_inserts(1);

    let services = &app.state().services;
    let order = services
        .orders
        .place(
            &h.market.customer,
            rush_server::app::PlaceOrder {
                cart: h.market.cart(1),
                payment_provider: Default::default(),
            },
        )
        .await
        .unwrap();

    let live = tokio::time::timeout(Duration::from_secs(5), inbox.recv())
        .await
        .expect("notification within timeout")
        .unwrap();
    assert_eq!(live["payload"]["order_id"], order.id.to_string());
    assert_eq!(live["payload"]["status"], "CREATED");

    app.shutdown(Duration::from_secs(1)).await;
    let customer_notes = h
        .store
        .list_notifications(h.market.customer.user_id)
        .await
        .unwrap();
    assert!(!customer_notes.is_empty());
}

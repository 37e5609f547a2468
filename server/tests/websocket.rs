//! Live sockets over a real listener: handshake checks, topic pushes and chat.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect
#![allow(clippy::panic)]

use futures::{SinkExt, StreamExt};
use rush_core::environment::Clock;
use rush_core::messaging::Topic;
use rush_core::{Order, OrderStatus, Principal};
use rush_runtime::{Broker, InProcessBroker, JobRunnerConfig, RetryPolicy};
use rush_server::Application;
use rush_server::app::PlaceOrder;
use rush_server::auth::SignedTokenIdentity;
use rush_testing::InMemoryStore;
use rush_testing::fixtures::Marketplace;
use rush_testing::mocks::test_clock;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const SECRET: &str = "socket-test-secret";
const WAIT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Live {
    addr: SocketAddr,
    app: Application,
    broker: Arc<InProcessBroker>,
    tokens: SignedTokenIdentity,
    market: Marketplace,
}

impl Live {
    async fn start() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(test_clock());
        let market = Marketplace::seed(store.as_ref(), clock.now()).await;
        let broker = Arc::new(InProcessBroker::new());
        let app = Application::assemble(
            store,
            broker.clone(),
            clock,
            Arc::new(SignedTokenIdentity::new(SECRET)),
            JobRunnerConfig {
                workers: 2,
                queue_capacity: 64,
                retry: RetryPolicy::builder()
                    .max_retries(1)
                    .initial_delay(Duration::from_millis(1))
                    .build(),
            },
            None,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app.router();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            app,
            broker,
            tokens: SignedTokenIdentity::new(SECRET),
            market,
        }
    }

    async fn connect(&self, path: &str, as_user: Option<&Principal>) -> Socket {
        let mut url = format!("ws://{}{path}", self.addr);
        if let Some(principal) = as_user {
            url.push_str("?token=");
            url.push_str(&self.tokens.issue(principal).unwrap());
        }
        let (socket, _) = connect_async(url).await.expect("handshake");
        socket
    }

    /// Waits until `topic` has `n` live receivers.
    async fn wait_for_subscribers(&self, topic: Topic, n: usize) {
        let topic = topic.to_string();
        tokio::time::timeout(WAIT, async {
            while self.broker.subscriber_count(&topic).await != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriptions settle");
    }

    async fn place(&self) -> Order {
        self.app
            .state()
            .services
            .orders
            .place(
                &self.market.customer,
                PlaceOrder {
                    cart: self.market.cart(1),
                    payment_provider: Default::default(),
                },
            )
            .await
            .unwrap()
    }

    async fn confirm(&self, order: &Order) -> Order {
        self.app
            .state()
            .services
            .orders
            .confirm(&self.market.customer, order.id, None)
            .await
            .unwrap()
    }

    async fn assigned(&self) -> Order {
        let order = self.place().await;
        self.confirm(&order).await;
        self.app
            .state()
            .services
            .assignment
            .accept(&self.market.rider, order.id)
            .await
            .unwrap()
    }
}

async fn close_code(socket: &mut Socket) -> u16 {
    loop {
        match tokio::time::timeout(WAIT, socket.next()).await.expect("frame in time") {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            other => panic!("expected a close frame, got {other:?}"),
        }
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        match tokio::time::timeout(WAIT, socket.next()).await.expect("frame in time") {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

/// Next frame whose status, at `pointer`, is `status`; earlier pushes are skipped.
async fn next_with_status(socket: &mut Socket, pointer: &str, status: OrderStatus) -> Value {
    loop {
        let frame = next_json(socket).await;
        if frame.pointer(pointer) == Some(&json!(status)) {
            return frame;
        }
    }
}

#[tokio::test]
async fn test_missing_or_invalid_token_closes_with_4001() {
    let live = Live::start().await;
    let order = live.place().await;
    let path = format!("/ws/orders/{}/tracking", order.id);

    let mut anonymous = live.connect(&path, None).await;
    assert_eq!(close_code(&mut anonymous).await, 4001);

    let url = format!("ws://{}{path}?token=not.valid", live.addr);
    let (mut forged, _) = connect_async(url).await.unwrap();
    assert_eq!(close_code(&mut forged).await, 4001);

    let mut inbox = live.connect("/ws/notifications", None).await;
    assert_eq!(close_code(&mut inbox).await, 4001);
    assert_eq!(live.broker.topic_count().await, 0);
}

#[tokio::test]
async fn test_unrelated_principal_closes_with_4003() {
    let live = Live::start().await;
    let order = live.assigned().await;

    for (path, stranger) in [
        (format!("/ws/orders/{}/tracking", order.id), &live.market.other_customer),
        (format!("/ws/orders/{}/chat", order.id), &live.market.other_rider),
        (format!("/ws/orders/{}/tracking", order.id), &live.market.other_merchant),
    ] {
        let mut socket = live.connect(&path, Some(stranger)).await;
        assert_eq!(close_code(&mut socket).await, 4003);
    }
    assert_eq!(live.broker.topic_count().await, 0);
}

#[tokio::test]
async fn test_tracking_pushes_status_changes_to_every_watcher() {
    let live = Live::start().await;
    let order = live.place().await;
    let path = format!("/ws/orders/{}/tracking", order.id);

    let mut customer = live.connect(&path, Some(&live.market.customer)).await;
    let mut merchant = live.connect(&path, Some(&live.market.merchant)).await;
    let mut admin = live.connect(&path, Some(&live.market.admin)).await;
    live.wait_for_subscribers(Topic::OrderTracking(order.id), 3).await;

    live.confirm(&order).await;

    for socket in [&mut customer, &mut merchant, &mut admin] {
        let event = next_with_status(socket, "/status", OrderStatus::Confirmed).await;
        assert_eq!(event["order_id"], order.id.to_string());
    }
}

#[tokio::test]
async fn test_notification_socket_receives_personal_notifications() {
    let live = Live::start().await;
    let order = live.place().await;

    let mut inbox = live
        .connect("/ws/notifications", Some(&live.market.merchant))
        .await;
    live.wait_for_subscribers(Topic::UserNotifications(live.market.merchant.user_id), 1)
        .await;

    live.confirm(&order).await;

    let notification = next_with_status(&mut inbox, "/payload/status", OrderStatus::Confirmed).await;
    assert_eq!(notification["type"], "ORDER_STATUS");
    assert_eq!(notification["payload"]["order_id"], order.id.to_string());
}

#[tokio::test]
async fn test_chat_frames_reach_the_other_party() {
    let live = Live::start().await;
    let order = live.assigned().await;
    let path = format!("/ws/orders/{}/chat", order.id);

    let mut customer = live.connect(&path, Some(&live.market.customer)).await;
    let mut rider = live.connect(&path, Some(&live.market.rider)).await;
    let mut merchant = live.connect(&path, Some(&live.market.merchant)).await;
    live.wait_for_subscribers(Topic::OrderChat(order.id), 3).await;

    // watchers may not write; the frame is dropped
    merchant
        .send(Message::Text(json!({ "message": "hello from the kitchen" }).to_string()))
        .await
        .unwrap();
    customer
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    customer
        .send(Message::Text(json!({ "message": "gate code 1234" }).to_string()))
        .await
        .unwrap();

    let received = next_json(&mut rider).await;
    assert_eq!(received["message"], "gate code 1234");
    assert_eq!(received["sender_id"], live.market.customer.user_id.to_string());
    assert_eq!(received["recipient_id"], live.market.rider.user_id.to_string());
    let watched = next_json(&mut merchant).await;
    assert_eq!(watched["message"], "gate code 1234");

    let history = live
        .app
        .state()
        .services
        .messaging
        .chat_history(&live.market.admin, order.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_closing_the_socket_unsubscribes() {
    let live = Live::start().await;
    let order = live.place().await;
    let topic = Topic::OrderTracking(order.id).to_string();

    let mut socket = live
        .connect(&format!("/ws/orders/{}/tracking", order.id), Some(&live.market.customer))
        .await;
    live.wait_for_subscribers(Topic::OrderTracking(order.id), 1).await;

    socket.close(None).await.unwrap();

    tokio::time::timeout(WAIT, async {
        loop {
            // publishing to a topic with no receivers drops it
            live.broker.publish(&topic, json!("ping")).await.unwrap();
            if live.broker.topic_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("topic released after close");
}

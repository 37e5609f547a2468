//! Named-topic publish/subscribe.
//!
//! Live pushes are ephemeral: a subscriber receives what is published while it
//! is subscribed, in publish order per topic, and nothing from before. Clients
//! that need history read the persisted logs instead.
//!
//! Two implementations:
//!
//! - [`InProcessBroker`]: one `tokio::sync::broadcast` channel per topic, for a
//!   single process and for tests.
//! - [`RedisBroker`]: publishes through Redis `PUBLISH` and relays a pattern
//!   subscription back into a local [`InProcessBroker`], so every process sees
//!   every publish.

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

use crate::retry::RetryPolicy;

/// Slots per topic before slow subscribers start lagging.
pub const TOPIC_CAPACITY: usize = 1000;

/// Broker failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// A message could not be encoded.
    #[error("invalid message: {0}")]
    Encoding(String),
}

/// Topic-based pub/sub.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publishes `message` to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, message: Value) -> Result<(), BrokerError>;

    /// Subscribes to `topic`. Dropping the receiver unsubscribes.
    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Value>, BrokerError>;
}

/// In-memory broker with one broadcast channel per topic.
///
/// A topic's channel is dropped once it has no receivers, on the next publish
/// to it or the next subscribe to any topic.
#[derive(Clone, Default)]
pub struct InProcessBroker {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<Value>>>>,
}

impl InProcessBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of topics with a live channel.
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Live receivers of `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .read()
            .await
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn deliver(
        channels: &mut HashMap<String, broadcast::Sender<Value>>,
        topic: &str,
        message: Value,
    ) {
        let Some(sender) = channels.get(topic) else {
            return;
        };
        if sender.send(message).is_err() {
            // every receiver is gone
            channels.remove(topic);
        }
    }
}

#[async_trait]
impl Broker for InProcessBroker {
    async fn publish(&self, topic: &str, message: Value) -> Result<(), BrokerError> {
        let mut channels = self.channels.write().await;
        Self::deliver(&mut channels, topic, message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Value>, BrokerError> {
        let mut channels = self.channels.write().await;
        // topics whose last receiver was dropped without a publish since
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let sender = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        Ok(sender.subscribe())
    }
}

/// Redis-backed broker for multi-process deployments.
#[derive(Clone)]
pub struct RedisBroker {
    conn_manager: ConnectionManager,
    local: InProcessBroker,
    relay: Arc<JoinHandle<()>>,
}

impl RedisBroker {
    /// Connects to Redis and starts relaying `patterns` into local subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Unavailable`] if the initial connection fails.
    pub async fn connect(redis_url: &str, patterns: &[&str]) -> Result<Self, BrokerError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| BrokerError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            BrokerError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        let local = InProcessBroker::new();
        let patterns: Vec<String> = patterns.iter().map(ToString::to_string).collect();
        let relay = tokio::spawn(relay_loop(client, patterns, local.clone()));

        tracing::info!("Connected Redis broker");
        Ok(Self {
            conn_manager,
            local,
            relay: Arc::new(relay),
        })
    }

    /// Stops the relay task.
    pub fn close(&self) {
        self.relay.abort();
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, topic: &str, message: Value) -> Result<(), BrokerError> {
        let payload =
            serde_json::to_string(&message).map_err(|e| BrokerError::Encoding(e.to_string()))?;
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| BrokerError::Unavailable(format!("Failed to publish to {topic}: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<Value>, BrokerError> {
        self.local.subscribe(topic).await
    }
}

async fn relay_loop(client: redis::Client, patterns: Vec<String>, local: InProcessBroker) {
    let backoff = RetryPolicy::default();
    let mut attempt = 0;

    loop {
        match relay_once(&client, &patterns, &local).await {
            Ok(()) => {
                attempt = 0;
                tracing::warn!("Redis subscription stream ended, reconnecting");
                tokio::time::sleep(backoff.initial_delay).await;
            }
            Err(e) => {
                let delay = backoff.delay_for_attempt(attempt);
                tracing::warn!(error = %e, attempt, "Redis relay failed, reconnecting");
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}

async fn relay_once(
    client: &redis::Client,
    patterns: &[String],
    local: &InProcessBroker,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    for pattern in patterns {
        pubsub.psubscribe(pattern).await?;
    }
    tracing::debug!(?patterns, "Relaying Redis patterns");

    let mut messages = Box::pin(pubsub.on_message());
    while let Some(msg) = messages.next().await {
        let topic = msg.get_channel_name().to_string();
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Unreadable Redis payload");
                continue;
            }
        };
        match serde_json::from_str::<Value>(&payload) {
            Ok(message) => {
                let _ = local.publish(&topic, message).await;
            }
            Err(e) => tracing::warn!(topic = %topic, error = %e, "Non-JSON Redis payload"),
        }
    }
    Ok(())
}

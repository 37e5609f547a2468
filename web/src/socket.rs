//! WebSocket topic pump.
//!
//! One task per connection multiplexes the broker receivers it was given onto
//! the socket and hands inbound text frames to a callback. The task ends when
//! the client closes, the socket errors, or every topic channel closes; the
//! receivers are dropped with it, which unsubscribes them.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{self, BoxStream, SelectAll};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};

/// Close code sent when no valid principal was presented.
pub const CLOSE_UNAUTHENTICATED: u16 = 4001;

/// Close code sent when the principal may not watch the requested topic.
pub const CLOSE_FORBIDDEN: u16 = 4003;

fn topic_stream(rx: broadcast::Receiver<Value>) -> BoxStream<'static, Value> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(message) => return Some((message, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Socket lagging, skipped messages");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

/// Streams every message of `receivers` to `socket` until either side goes away.
///
/// Inbound text frames are passed to `on_text`; other frames are ignored.
pub async fn pump<F, Fut>(
    socket: WebSocket,
    receivers: Vec<broadcast::Receiver<Value>>,
    mut on_text: F,
) where
    F: FnMut(String) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let (mut sink, mut inbound) = socket.split();
    let mut live: SelectAll<_> = stream::select_all(receivers.into_iter().map(topic_stream));

    loop {
        tokio::select! {
            outbound = live.next() => {
                let Some(message) = outbound else { break };
                if sink.send(Message::Text(message.to_string())).await.is_err() {
                    tracing::debug!("Client went away during send");
                    break;
                }
            }
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(text))) => on_text(text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Socket read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Socket closed, topics released");
}

/// Closes a freshly upgraded socket with an application close code.
pub async fn reject(mut socket: WebSocket, code: u16, reason: &'static str) {
    tracing::info!(code, reason, "Rejecting socket");
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

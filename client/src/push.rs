use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Notification frames pushed by the service over the WebSocket. Every
/// event means the same thing to this client: something changed,
/// re-fetch. Payload fields beyond the tag are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum PushEvent {
    #[serde(rename = "orders.created")]
    OrderCreated,
    #[serde(rename = "orders.updated")]
    OrderUpdated,
    #[serde(rename = "bids.created")]
    BidCreated,
    #[serde(rename = "bids.updated")]
    BidUpdated,
    #[serde(rename = "wallets.updated")]
    WalletUpdated,
    #[serde(rename = "messages.created")]
    MessageCreated,
    #[serde(rename = "reviews.created")]
    ReviewCreated,
}

/// Queues a reconciliation request. The channel holds one pending
/// request at most; a full channel already has a pass queued, so the
/// drop coalesces bursts into a single refresh.
fn nudge(trigger: &mpsc::Sender<()>) {
    let _ = trigger.try_send(());
}

/// Maintains the push connection for the lifetime of the engine.
///
/// Connects, forwards every recognized event as a reconciliation
/// trigger, and reconnects with exponential backoff on any failure.
/// Events missed while disconnected are covered by requesting a full
/// pass right after each (re)connect.
pub async fn run_push_listener(
    ws_url: String,
    trigger: mpsc::Sender<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut backoff = Duration::from_secs(1);
    let max_backoff = Duration::from_secs(30);

    loop {
        tracing::debug!("push: connecting to {ws_url}");
        let conn = tokio::select! {
            _ = shutdown.recv() => return,
            conn = tokio_tungstenite::connect_async(&ws_url) => conn,
        };
        let mut stream = match conn {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!("push: connect failed: {e} (retrying in {backoff:?})");
                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(max_backoff);
                continue;
            }
        };

        backoff = Duration::from_secs(1);
        tracing::info!("push: connected");
        nudge(&trigger);

        loop {
            let frame = tokio::select! {
                _ = shutdown.recv() => return,
                frame = stream.next() => frame,
            };
            match frame {
                Some(Ok(WsMessage::Text(raw))) => {
                    match serde_json::from_str::<PushEvent>(raw.as_str()) {
                        Ok(event) => {
                            tracing::debug!("push: {event:?}");
                            nudge(&trigger);
                        }
                        Err(_) => tracing::debug!("push: ignoring unrecognized frame: {raw}"),
                    }
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                Some(Ok(WsMessage::Close(_))) | None => {
                    tracing::warn!("push: connection closed, reconnecting");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("push: connection error: {e}, reconnecting");
                    break;
                }
            }
        }

        tokio::select! {
            _ = shutdown.recv() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(max_backoff);
    }
}

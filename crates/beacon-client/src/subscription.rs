//! Realtime change subscriptions over WebSocket.
//!
//! The handshake is one JSON frame naming the topic; after that the server
//! pushes inserted rows as they happen. Dropping a [`Subscription`] tears
//! the connection down.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use beacon_shared::protocol::{ChangeEvent, SubscribeRequest, Topic};

use crate::error::{ClientError, Result};

/// A live feed of inserted rows for one topic.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Connect, subscribe to `topic`, and start pumping events.
    pub async fn open(ws_url: &str, topic: Topic) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| ClientError::Subscription(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let request = serde_json::to_string(&SubscribeRequest { topic })
            .map_err(|e| ClientError::Subscription(e.to_string()))?;
        write
            .send(WsMessage::Text(request))
            .await
            .map_err(|e| ClientError::Subscription(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            // Keep the write half alive for the connection's lifetime.
            let _write = write;
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match ChangeEvent::from_json(&text) {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Dropping unparseable change event"),
                    },
                    Ok(WsMessage::Close(_)) => {
                        debug!("Subscription closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Subscription stream error");
                        break;
                    }
                }
            }
        });

        Ok(Self { events: rx, task })
    }

    /// Take the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the next event. `None` means the feed has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

//! Realtime change hub.
//!
//! Every table insert is published to a topic-keyed broadcast channel; each
//! WebSocket client subscribes to exactly one topic with its first frame and
//! then receives inserted-row events until the socket closes. Cancellation
//! is driven entirely by the client side dropping the connection.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use beacon_shared::protocol::{ChangeEvent, SubscribeRequest, Topic};

use crate::api::AppState;

/// Per-topic broadcast capacity. Slow consumers past this lag are dropped
/// rather than stalling the hub.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ChangeHub {
    messages_tx: broadcast::Sender<ChangeEvent>,
    locations_tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (messages_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (locations_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            messages_tx,
            locations_tx,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<ChangeEvent> {
        match topic {
            Topic::Messages => &self.messages_tx,
            Topic::Locations => &self.locations_tx,
        }
    }

    /// Publish an inserted-row event to its topic. A send error only means
    /// nobody is subscribed right now.
    pub fn publish(&self, event: ChangeEvent) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            debug!(?topic, "no live subscribers for change event");
        }
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<ChangeEvent> {
        self.sender(topic).subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /ws` upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| client_loop(socket, state.hub.clone()))
}

async fn client_loop(mut socket: WebSocket, hub: ChangeHub) {
    // The first frame selects the topic; anything else ends the session.
    let request = loop {
        match socket.recv().await {
            Some(Ok(WsMessage::Text(text))) => {
                match serde_json::from_str::<SubscribeRequest>(&text) {
                    Ok(req) => break req,
                    Err(e) => {
                        warn!(error = %e, "Malformed subscribe request, closing socket");
                        return;
                    }
                }
            }
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            _ => return,
        }
    };

    debug!(topic = ?request.topic, "realtime subscription opened");
    let mut rx = hub.subscribe(request.topic);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let frame = match event.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode change event");
                            continue;
                        }
                    };
                    if socket.send(WsMessage::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(topic = ?request.topic, "realtime subscription closed");
}

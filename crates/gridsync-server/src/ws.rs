//! `WebSocket` handler for the streaming channel.
//!
//! Clients connect to `GET /ws` and exchange JSON text frames (see
//! [`gridsync_types::protocol`]). Every operation is available on this
//! channel; `liveSubscribe` additionally attaches a bus subscription to the
//! connection, after which committed mutations are forwarded as `event`
//! frames until the client sends `unsubscribe` or disconnects.
//!
//! A connection holds at most one live feed. Closing the socket releases
//! it; nothing is shared between connections except the bus.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use gridsync_types::{ClientFrame, ConnectionId, ErrorCode, MutationEvent, ServerFrame, WireError};
use tracing::{Instrument, debug, info_span, warn};

use crate::bus::Subscription;
use crate::state::AppState;
use crate::sync::SyncError;

/// Upgrade an HTTP request to a streaming connection.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let id = ConnectionId::new();
    let span = info_span!("ws", connection = %id);
    ws.on_upgrade(move |socket| handle_ws(socket, Connection::new(id, state)).instrument(span))
}

/// Lifecycle of one streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionPhase {
    Connected,
    Subscribed,
    Unsubscribed,
    Closed,
}

struct Connection {
    id: ConnectionId,
    state: Arc<AppState>,
    phase: ConnectionPhase,
    /// Request id of the `liveSubscribe` that opened the feed, and the feed.
    feed: Option<(u64, Subscription)>,
}

impl Connection {
    const fn new(id: ConnectionId, state: Arc<AppState>) -> Self {
        Self {
            id,
            state,
            phase: ConnectionPhase::Connected,
            feed: None,
        }
    }

    /// Wait for the next live event. Never resolves without a feed.
    async fn next_event(&mut self) -> Option<(u64, Arc<MutationEvent>)> {
        match self.feed.as_mut() {
            Some((id, subscription)) => {
                let id = *id;
                subscription.recv().await.map(|event| (id, event))
            }
            None => std::future::pending().await,
        }
    }

    async fn handle_frame(&mut self, frame: ClientFrame) -> ServerFrame {
        let sync = &self.state.sync;
        match frame {
            ClientFrame::SetCell { id, params } => match sync.set_cell(&params).await {
                Ok(_) => ServerFrame::Ack { id },
                Err(e) => failure(id, &e),
            },
            ClientFrame::RemoveCell { id, params } => match sync.remove_cell(&params).await {
                Ok(_) => ServerFrame::Ack { id },
                Err(e) => failure(id, &e),
            },
            ClientFrame::GetChunk { id, params } => {
                match sync.get_chunk(&params, sync.republish_reads()).await {
                    Ok(cells) => ServerFrame::Cells { id, cells },
                    Err(e) => failure(id, &e),
                }
            }
            ClientFrame::GetChunkByRadius { id, params } => {
                match sync
                    .get_chunk_by_radius(&params, sync.republish_reads())
                    .await
                {
                    Ok(cells) => ServerFrame::Cells { id, cells },
                    Err(e) => failure(id, &e),
                }
            }
            ClientFrame::LiveSubscribe { id } => {
                if self.feed.is_some() {
                    return bad_request(Some(id), "connection already has a live subscription");
                }
                self.feed = Some((id, sync.live_subscribe()));
                self.phase = ConnectionPhase::Subscribed;
                debug!(request = id, "Live feed opened");
                ServerFrame::Subscribed { id }
            }
            ClientFrame::Unsubscribe { id } => {
                if let Some((_, mut subscription)) = self.feed.take() {
                    subscription.unsubscribe();
                    self.phase = ConnectionPhase::Unsubscribed;
                    debug!(
                        request = id,
                        skipped = subscription.skipped(),
                        "Live feed closed"
                    );
                }
                ServerFrame::Unsubscribed { id }
            }
        }
    }

    fn close(&mut self) {
        if let Some((_, mut subscription)) = self.feed.take() {
            subscription.unsubscribe();
        }
        self.phase = ConnectionPhase::Closed;
        debug!(connection = %self.id, phase = ?self.phase, "WebSocket client disconnected");
    }
}

fn failure(id: u64, error: &SyncError) -> ServerFrame {
    ServerFrame::Error {
        id: Some(id),
        error: error.to_wire(),
    }
}

fn bad_request(id: Option<u64>, message: impl Into<String>) -> ServerFrame {
    ServerFrame::Error {
        id,
        error: WireError {
            code: ErrorCode::BadRequest,
            message: message.into(),
        },
    }
}

/// Serialize and send one frame. Returns `false` once the peer is gone.
async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize server frame: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Drive one connection until the client leaves.
async fn handle_ws(mut socket: WebSocket, mut conn: Connection) {
    debug!(phase = ?conn.phase, "WebSocket client connected");

    loop {
        tokio::select! {
            // Forward a committed mutation to a subscribed client.
            next = conn.next_event() => {
                let Some((id, event)) = next else {
                    debug!("Mutation bus closed, ending live feed");
                    conn.feed = None;
                    continue;
                };
                let frame = ServerFrame::Event {
                    id,
                    event: Arc::unwrap_or_clone(event),
                };
                if !send_frame(&mut socket, &frame).await {
                    break;
                }
            }
            // Handle a client request or control frame.
            msg = socket.recv() => {
                let decoded = match msg {
                    Some(Ok(Message::Text(text))) => {
                        serde_json::from_str::<ClientFrame>(text.as_str())
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        serde_json::from_slice::<ClientFrame>(&bytes)
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        break;
                    }
                };

                let reply = match decoded {
                    Ok(frame) => conn.handle_frame(frame).await,
                    Err(e) => {
                        debug!("Undecodable client frame: {e}");
                        bad_request(None, format!("malformed frame: {e}"))
                    }
                };
                if !send_frame(&mut socket, &reply).await {
                    break;
                }
            }
        }
    }

    conn.close();
}

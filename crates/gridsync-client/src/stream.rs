//! Streaming channel over a `WebSocket`.
//!
//! One [`StreamChannel`] owns one socket. A writer task drains an outgoing
//! queue into the socket; a reader task matches replies to pending requests
//! by id and fans `event` frames out to every open [`LiveFeed`].
//!
//! The server allows one live subscription per connection, so feeds are
//! multiplexed locally: the first feed opens the server-side subscription
//! and cancelling (or dropping) the last one closes it.
//!
//! Each feed buffers [`FEED_BUFFER`] events. A feed that falls further
//! behind loses its oldest events, never the newest, and counts them in
//! [`LiveFeed::skipped`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use gridsync_types::{
    Cell, ChunkParams, ClientFrame, MutationEvent, PositionParams, RadiusParams, ServerFrame,
    SetCellParams,
};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Outgoing frames queued before senders wait.
const OUTGOING_BUFFER: usize = 256;

/// Events buffered per [`LiveFeed`] before the oldest are dropped.
pub const FEED_BUFFER: usize = 256;

/// State shared with the reader task.
#[derive(Debug, Default)]
struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<ServerFrame>>>,
    feeds: Mutex<HashMap<u64, broadcast::Sender<MutationEvent>>>,
    closed: AtomicBool,
}

impl Shared {
    async fn dispatch(&self, text: &str) {
        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Undecodable server frame: {e}");
                return;
            }
        };

        match frame {
            ServerFrame::Event { event, .. } => self.fan_out(&event).await,
            ServerFrame::Error { id: None, error } => {
                warn!(code = ?error.code, message = %error.message, "Server reported an error");
            }
            frame => {
                let Some(id) = frame.id() else { return };
                match self.pending.lock().await.remove(&id) {
                    Some(reply) => {
                        // The caller may have timed out and gone away.
                        let _ = reply.send(frame);
                    }
                    None => debug!(id, "Reply for unknown request"),
                }
            }
        }
    }

    async fn fan_out(&self, event: &MutationEvent) {
        let mut feeds = self.feeds.lock().await;
        // A full buffer evicts its oldest event; only a feed whose receiver
        // is gone fails the send.
        feeds.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Fail every pending request and end every feed.
    async fn shut_down(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending.lock().await.clear();
        self.feeds.lock().await.clear();
        debug!("Streaming channel closed");
    }
}

/// A connected streaming channel.
#[derive(Debug)]
pub struct StreamChannel {
    outgoing: mpsc::Sender<Message>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    request_timeout: Duration,
    /// Request id of the server-side subscription, while one is open.
    server_feed: Mutex<Option<u64>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl StreamChannel {
    /// Open a socket to `url` and start the reader and writer tasks.
    ///
    /// The handshake gets the same `request_timeout` as any request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ChannelDown`] if the connection fails or
    /// the handshake does not finish in time.
    pub async fn connect(url: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let (socket, _) = match tokio::time::timeout(request_timeout, connect_async(url)).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(TransportError::ChannelDown(format!("connect to {url}: {e}")));
            }
            Err(_) => {
                return Err(TransportError::ChannelDown(format!(
                    "no handshake from {url} within {request_timeout:?}"
                )));
            }
        };
        debug!(url, "Streaming channel connected");

        let (mut sink, mut source) = socket.split();
        let (outgoing, mut queue) = mpsc::channel::<Message>(OUTGOING_BUFFER);
        let shared = Arc::new(Shared::default());

        let writer = tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                if let Err(e) = sink.send(msg).await {
                    debug!("Streaming channel send failed: {e}");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => reader_shared.dispatch(text.as_str()).await,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Streaming channel receive failed: {e}");
                        break;
                    }
                }
            }
            reader_shared.shut_down().await;
        });

        Ok(Self {
            outgoing,
            shared,
            next_id: AtomicU64::new(1),
            request_timeout,
            server_feed: Mutex::new(None),
            reader,
            writer,
        })
    }

    /// Whether the socket is still usable.
    pub fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire) && !self.outgoing.is_closed()
    }

    /// Send `setCell` and wait for the ack.
    pub async fn set_cell(&self, params: &SetCellParams) -> Result<(), TransportError> {
        let params = *params;
        match self
            .request(|id| ClientFrame::SetCell { id, params })
            .await?
        {
            ServerFrame::Ack { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Send `removeCell` and wait for the ack.
    pub async fn remove_cell(&self, params: &PositionParams) -> Result<(), TransportError> {
        let params = *params;
        match self
            .request(|id| ClientFrame::RemoveCell { id, params })
            .await?
        {
            ServerFrame::Ack { .. } => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Send `getChunk` and wait for the cells.
    pub async fn get_chunk(&self, params: &ChunkParams) -> Result<Vec<Cell>, TransportError> {
        let params = *params;
        match self
            .request(|id| ClientFrame::GetChunk { id, params })
            .await?
        {
            ServerFrame::Cells { cells, .. } => Ok(cells),
            other => Err(unexpected(&other)),
        }
    }

    /// Send `getChunkByRadius` and wait for the cells.
    pub async fn get_chunk_by_radius(
        &self,
        params: &RadiusParams,
    ) -> Result<Vec<Cell>, TransportError> {
        let params = *params;
        match self
            .request(|id| ClientFrame::GetChunkByRadius { id, params })
            .await?
        {
            ServerFrame::Cells { cells, .. } => Ok(cells),
            other => Err(unexpected(&other)),
        }
    }

    /// Open a live feed of committed mutations.
    ///
    /// # Errors
    ///
    /// Fails if the channel is down or the server refuses the subscription.
    pub async fn subscribe(self: &Arc<Self>) -> Result<LiveFeed, TransportError> {
        let mut server_feed = self.server_feed.lock().await;
        let feed_id = self.next_id();
        let (tx, rx) = broadcast::channel(FEED_BUFFER);
        self.shared.feeds.lock().await.insert(feed_id, tx);

        if server_feed.is_none() {
            let reply = self
                .request(|id| ClientFrame::LiveSubscribe { id })
                .await
                .and_then(|frame| match frame {
                    ServerFrame::Subscribed { id } => Ok(id),
                    other => Err(unexpected(&other)),
                });
            match reply {
                Ok(id) => *server_feed = Some(id),
                Err(e) => {
                    self.shared.feeds.lock().await.remove(&feed_id);
                    return Err(e);
                }
            }
        }

        debug!(feed = feed_id, "Live feed opened");
        Ok(LiveFeed {
            id: feed_id,
            events: FeedReceiver::new(rx),
            channel: Arc::clone(self),
            released: false,
        })
    }

    /// Detach one feed; closes the server-side subscription with the last.
    async fn release(&self, feed_id: u64) -> Result<(), TransportError> {
        let mut server_feed = self.server_feed.lock().await;
        let remaining = {
            let mut feeds = self.shared.feeds.lock().await;
            feeds.remove(&feed_id);
            feeds.len()
        };
        if remaining > 0 || server_feed.is_none() || !self.is_open() {
            return Ok(());
        }

        match self.request(|id| ClientFrame::Unsubscribe { id }).await? {
            ServerFrame::Unsubscribed { .. } => {
                *server_feed = None;
                Ok(())
            }
            other => Err(unexpected(&other)),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send the frame built for a fresh id and wait for its reply.
    async fn request(
        &self,
        build: impl FnOnce(u64) -> ClientFrame,
    ) -> Result<ServerFrame, TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelDown(String::from(
                "streaming channel closed",
            )));
        }

        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id, tx);

        let json = serde_json::to_string(&build(id))
            .map_err(|e| TransportError::Protocol(format!("encode request: {e}")))?;
        if let Err(e) = self.outgoing.send(Message::Text(json.into())).await {
            self.shared.pending.lock().await.remove(&id);
            return Err(TransportError::ChannelDown(e.to_string()));
        }

        let frame = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => {
                return Err(TransportError::ChannelDown(String::from(
                    "streaming channel closed before reply",
                )));
            }
            Err(_) => {
                // The socket may be fine; only this request is abandoned.
                self.shared.pending.lock().await.remove(&id);
                return Err(TransportError::Timeout(self.request_timeout));
            }
        };

        match frame {
            ServerFrame::Error { error, .. } => Err(TransportError::Rejected {
                code: error.code,
                message: error.message,
            }),
            frame => Ok(frame),
        }
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn unexpected(frame: &ServerFrame) -> TransportError {
    TransportError::Protocol(format!("unexpected reply: {frame:?}"))
}

/// Receiving half of one feed's buffer, counting evicted events.
#[derive(Debug)]
struct FeedReceiver {
    rx: broadcast::Receiver<MutationEvent>,
    skipped: u64,
}

impl FeedReceiver {
    const fn new(rx: broadcast::Receiver<MutationEvent>) -> Self {
        Self { rx, skipped: 0 }
    }

    async fn recv(&mut self) -> Option<MutationEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.skipped = self.skipped.saturating_add(n);
                    warn!(skipped = n, "Live feed lagged, oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// A live stream of committed mutations.
///
/// Yields every mutation committed after [`StreamChannel::subscribe`]
/// returned, except those evicted while the feed was more than
/// [`FEED_BUFFER`] events behind. Ends when the channel closes.
///
/// Dropping a feed releases it in the background; [`LiveFeed::cancel`]
/// does the same and reports the outcome.
#[derive(Debug)]
pub struct LiveFeed {
    id: u64,
    events: FeedReceiver,
    channel: Arc<StreamChannel>,
    released: bool,
}

impl LiveFeed {
    /// Wait for the next mutation. `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<MutationEvent> {
        self.events.recv().await
    }

    /// Events this feed lost to buffer overflow so far.
    pub const fn skipped(&self) -> u64 {
        self.events.skipped
    }

    /// Stop this feed. Other feeds on the same channel are unaffected.
    ///
    /// # Errors
    ///
    /// Fails if closing the server-side subscription was refused or timed
    /// out; the local feed is stopped either way.
    pub async fn cancel(mut self) -> Result<(), TransportError> {
        self.released = true;
        self.channel.release(self.id).await
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let channel = Arc::clone(&self.channel);
        let feed = self.id;
        runtime.spawn(async move {
            if let Err(e) = channel.release(feed).await {
                debug!(feed, "Releasing dropped live feed failed: {e}");
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn painted(x: i32) -> MutationEvent {
        MutationEvent::SetCells {
            cells: vec![Cell::new(x, 0, 1)],
        }
    }

    fn painted_x(event: &MutationEvent) -> i32 {
        match event {
            MutationEvent::SetCells { cells } => cells.first().unwrap().x,
            MutationEvent::RemoveCells { .. } => panic!("expected setCells, got {event:?}"),
        }
    }

    #[tokio::test]
    async fn overflowing_feed_keeps_newest_events() {
        let shared = Shared::default();
        let (tx, rx) = broadcast::channel(FEED_BUFFER);
        shared.feeds.lock().await.insert(1, tx);
        let mut events = FeedReceiver::new(rx);

        for x in 0..300 {
            shared.fan_out(&painted(x)).await;
        }
        shared.shut_down().await;

        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            seen.push(painted_x(&event));
        }
        assert_eq!(seen.len(), FEED_BUFFER);
        assert_eq!(seen.first(), Some(&44));
        assert_eq!(seen.last(), Some(&299));
        assert_eq!(events.skipped, 44);
    }

    #[tokio::test]
    async fn fan_out_forgets_dropped_receivers() {
        let shared = Shared::default();
        let (kept, kept_rx) = broadcast::channel(FEED_BUFFER);
        let (gone, gone_rx) = broadcast::channel(FEED_BUFFER);
        shared.feeds.lock().await.insert(1, kept);
        shared.feeds.lock().await.insert(2, gone);
        drop(gone_rx);

        shared.fan_out(&painted(0)).await;
        let feeds = shared.feeds.lock().await;
        assert!(feeds.contains_key(&1));
        assert!(!feeds.contains_key(&2));
        drop(kept_rx);
    }
}

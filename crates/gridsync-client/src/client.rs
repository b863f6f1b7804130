//! The routed client facade.
//!
//! [`GridClient`] exposes the operation catalogue and sends each call over
//! the channel its [`RoutingTable`](crate::RoutingTable) names. The
//! streaming channel is opened on first use and shared by every later call
//! on the same client; if it cannot be opened within the request timeout,
//! streaming-routed calls fail with [`TransportError::ChannelDown`] and are
//! never retried over HTTP.

use std::sync::Arc;

use gridsync_types::{
    Cell, Channel, ChunkParams, OperationKind, PositionParams, RadiusParams, SetCellParams,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::HttpChannel;
use crate::stream::{LiveFeed, StreamChannel};

/// A grid client bound to one server.
#[derive(Debug)]
pub struct GridClient {
    config: ClientConfig,
    http: HttpChannel,
    stream: Mutex<Option<Arc<StreamChannel>>>,
}

impl GridClient {
    /// Create a client. No connection is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] if `config` is invalid.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let http = HttpChannel::new(&config.http_url, config.request_timeout)?;
        Ok(Self {
            config,
            http,
            stream: Mutex::new(None),
        })
    }

    /// The configuration this client was built with.
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upsert one cell.
    pub async fn set_cell(&self, x: i32, y: i32, color: u32) -> Result<(), TransportError> {
        let params = SetCellParams::new(x, y, color);
        match self.config.routes.route(OperationKind::SetCell) {
            Channel::Streaming => self.stream().await?.set_cell(&params).await,
            Channel::RequestResponse => self.http.set_cell(&params).await,
        }
    }

    /// Delete one cell.
    pub async fn remove_cell(&self, x: i32, y: i32) -> Result<(), TransportError> {
        let params = PositionParams::new(x, y);
        match self.config.routes.route(OperationKind::RemoveCell) {
            Channel::Streaming => self.stream().await?.remove_cell(&params).await,
            Channel::RequestResponse => self.http.remove_cell(&params).await,
        }
    }

    /// Read `x..=x+width` by `y..=y+height`.
    pub async fn get_chunk(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<Vec<Cell>, TransportError> {
        let params = ChunkParams::new(x, y, width, height);
        match self.config.routes.route(OperationKind::GetChunk) {
            Channel::Streaming => self.stream().await?.get_chunk(&params).await,
            Channel::RequestResponse => self.http.get_chunk(&params).await,
        }
    }

    /// Read the square of side `2 * radius + 1` centered on `(x, y)`.
    pub async fn get_chunk_by_radius(
        &self,
        x: i32,
        y: i32,
        radius: u32,
    ) -> Result<Vec<Cell>, TransportError> {
        let params = RadiusParams::new(x, y, radius);
        match self.config.routes.route(OperationKind::GetChunkByRadius) {
            Channel::Streaming => self.stream().await?.get_chunk_by_radius(&params).await,
            Channel::RequestResponse => self.http.get_chunk_by_radius(&params).await,
        }
    }

    /// Open a live feed of every mutation committed from now on.
    ///
    /// Always uses the streaming channel.
    pub async fn live_subscribe(&self) -> Result<LiveFeed, TransportError> {
        self.stream().await?.subscribe().await
    }

    /// The shared streaming channel, connecting if there is none or the
    /// previous one has closed. Callers racing a connect wait on the slot,
    /// at most one `request_timeout` per attempt.
    async fn stream(&self) -> Result<Arc<StreamChannel>, TransportError> {
        let mut slot = self.stream.lock().await;
        if let Some(channel) = slot.as_ref().filter(|channel| channel.is_open()) {
            return Ok(Arc::clone(channel));
        }

        debug!(url = %self.config.stream_url, "Opening streaming channel");
        let channel = Arc::new(
            StreamChannel::connect(&self.config.stream_url, self.config.request_timeout).await?,
        );
        *slot = Some(Arc::clone(&channel));
        Ok(channel)
    }
}

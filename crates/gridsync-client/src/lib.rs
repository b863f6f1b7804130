//! Client for the GridSync service.
//!
//! ```text
//! GridClient --route(kind)--> RoutingTable
//!     |                          |
//!     |-- Streaming ----------> StreamChannel (ws, lazy, shared)
//!     +-- RequestResponse ----> HttpChannel   (reqwest)
//! ```
//!
//! # Modules
//!
//! - [`routing`] -- Static operation-to-channel table
//! - [`client`] -- The routed [`GridClient`] facade
//! - [`stream`] -- `WebSocket` channel and [`LiveFeed`]
//! - [`http`] -- HTTP channel
//! - [`local`] -- [`LocalGrid`], a viewer's copy of the grid
//! - [`config`] -- [`ClientConfig`]
//! - [`error`] -- [`TransportError`]

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod routing;
pub mod stream;

// Re-export primary types for convenience.
pub use client::GridClient;
pub use config::ClientConfig;
pub use error::TransportError;
pub use local::LocalGrid;
pub use routing::{RoutingError, RoutingTable};
pub use stream::{LiveFeed, StreamChannel};

//! GridSync server: keeps many viewers of one shared grid in sync.
//!
//! This crate provides:
//!
//! - **Mutation bus** ([`bus`]): in-process fan-out of committed mutations
//!   to every live subscriber, with a bounded drop-oldest buffer each
//! - **Sync service** ([`sync`]): validated grid operations that commit to
//!   the store before they publish
//! - **Request/response channel** (`/api/*`): stateless HTTP for reads and
//!   writes
//! - **Streaming channel** (`/ws`): `WebSocket` carrying every operation
//!   plus the live mutation feed
//!
//! # Architecture
//!
//! ```text
//! HTTP client ----+                         +--> subscriber (ws)
//!                 |                         |
//!                 v                         |
//!           SyncService --commit--> GridStore
//!                 ^        \                |
//!                 |         +--publish--> MutationBus --> subscriber (ws)
//! ws client ------+
//! ```
//!
//! Both channels share one [`AppState`] and therefore one bus, so a write
//! on either channel reaches subscribers on the streaming channel.

pub mod bus;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod sync;
pub mod validate;
pub mod ws;

// Re-export primary types for convenience.
pub use bus::{MutationBus, Subscription};
pub use config::{ConfigError, ServiceConfig};
pub use router::{build_http_router, build_stream_router};
pub use server::{BoundServer, ServerError, start_server};
pub use state::AppState;
pub use sync::{SyncError, SyncOptions, SyncService};

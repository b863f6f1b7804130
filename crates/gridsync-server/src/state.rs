//! Shared application state for both channels.
//!
//! [`AppState`] owns the [`SyncService`]; the HTTP router and the
//! `WebSocket` router each hold an `Arc` to the same instance so a write on
//! either channel reaches subscribers on the streaming channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gridsync_db::{GridStore, MemoryGridStore};

use crate::sync::{SyncOptions, SyncService};

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    /// The sync service all operations go through.
    pub sync: SyncService,
    /// When this state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state over the given store.
    pub fn new(store: Arc<dyn GridStore>, options: &SyncOptions) -> Self {
        Self {
            sync: SyncService::new(store, options),
            started_at: Utc::now(),
        }
    }

    /// State over a fresh in-memory store with default options.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryGridStore::new()), &SyncOptions::default())
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

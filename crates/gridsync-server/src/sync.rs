//! The sync service: store writes and reads coupled to the mutation bus.
//!
//! The one rule everything here exists to keep: a subscriber never sees an
//! event for a write the store has not committed. Every mutation is
//! "validate, commit, then publish", and a failed commit publishes nothing.
//!
//! Writes touching the same coordinate are serialized by a striped lock
//! held from the store call through the publish, so for any coordinate the
//! publish order equals the commit order. Writes landing in different
//! stripes run concurrently; there is no lock over the whole grid.

use std::collections::BTreeSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use gridsync_db::{GridStore, StoreError};
use gridsync_types::{
    Cell, ChunkParams, ErrorCode, MutationEvent, Position, PositionParams, RadiusParams,
    SetCellParams, WireError,
};
use serde::Deserialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::bus::{DEFAULT_SUBSCRIBER_BUFFER, MutationBus, Subscription};
use crate::validate::{self, ChunkRegion, DEFAULT_MAX_CHUNK_SPAN, Limits, ValidationError};

/// Number of per-coordinate lock stripes.
const LOCK_STRIPES: u64 = 64;

/// Errors returned by sync service operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request was rejected before touching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The grid store failed; nothing was published.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Wire error category for this failure.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::Store(StoreError::Unavailable(_)) => ErrorCode::StoreUnavailable,
            Self::Store(StoreError::Invalid(_)) => ErrorCode::StoreInvalid,
        }
    }

    /// The error as sent to the originating client.
    pub fn to_wire(&self) -> WireError {
        WireError {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Tunables for the sync service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Whether chunk reads re-broadcast their result to live subscribers
    /// by default.
    pub republish_reads: bool,
    /// Per-subscriber event buffer before the oldest events are dropped.
    pub subscriber_buffer: usize,
    /// Largest width, height, or radius a chunk read may request.
    pub max_chunk_span: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            republish_reads: true,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            max_chunk_span: DEFAULT_MAX_CHUNK_SPAN,
        }
    }
}

/// Client-facing grid operations.
pub struct SyncService {
    store: Arc<dyn GridStore>,
    bus: MutationBus,
    stripes: Vec<Mutex<()>>,
    limits: Limits,
    republish_reads: bool,
}

impl SyncService {
    /// Create a service over `store` with a fresh mutation bus.
    pub fn new(store: Arc<dyn GridStore>, options: &SyncOptions) -> Self {
        Self {
            store,
            bus: MutationBus::new(options.subscriber_buffer),
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            limits: Limits {
                max_chunk_span: options.max_chunk_span,
            },
            republish_reads: options.republish_reads,
        }
    }

    /// The bus this service publishes to.
    pub const fn bus(&self) -> &MutationBus {
        &self.bus
    }

    /// Configured default for the `republish` argument of chunk reads.
    pub const fn republish_reads(&self) -> bool {
        self.republish_reads
    }

    /// Upsert one cell, then announce it.
    ///
    /// # Errors
    ///
    /// [`SyncError::Validation`] for bad input, [`SyncError::Store`] if the
    /// write did not commit. Nothing is published on error.
    pub async fn set_cell(&self, params: &SetCellParams) -> Result<Cell, SyncError> {
        let cell = validate::cell(params)?;
        self.commit(MutationEvent::SetCells { cells: vec![cell] })
            .await?;
        Ok(cell)
    }

    /// Delete one cell, then announce it.
    ///
    /// Removing an absent cell succeeds and is still announced.
    ///
    /// # Errors
    ///
    /// As for [`SyncService::set_cell`].
    pub async fn remove_cell(&self, params: &PositionParams) -> Result<Position, SyncError> {
        let position = validate::position(params)?;
        self.commit(MutationEvent::RemoveCells {
            positions: vec![position],
        })
        .await?;
        Ok(position)
    }

    /// Read a rectangular chunk.
    ///
    /// When `republish` is true a non-empty result is also broadcast to all
    /// live subscribers as `SetCells`, resynchronizing every open view of
    /// the region.
    ///
    /// # Errors
    ///
    /// [`SyncError::Validation`] for bad input, [`SyncError::Store`] if the
    /// read failed.
    pub async fn get_chunk(
        &self,
        params: &ChunkParams,
        republish: bool,
    ) -> Result<Vec<Cell>, SyncError> {
        let region = validate::chunk(params, &self.limits)?;
        self.read(region, republish).await
    }

    /// Read a square chunk around a center. See [`SyncService::get_chunk`].
    ///
    /// # Errors
    ///
    /// As for [`SyncService::get_chunk`].
    pub async fn get_chunk_by_radius(
        &self,
        params: &RadiusParams,
        republish: bool,
    ) -> Result<Vec<Cell>, SyncError> {
        let region = validate::radius(params, &self.limits)?;
        self.read(region, republish).await
    }

    /// Open a live feed of every mutation committed from now on.
    pub fn live_subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Apply `event` to the store and publish it once committed.
    async fn commit(&self, event: MutationEvent) -> Result<usize, StoreError> {
        let _guards = self.lock_positions(&event.positions()).await;

        match &event {
            MutationEvent::SetCells { cells } => self.store.upsert(cells).await?,
            MutationEvent::RemoveCells { positions } => self.store.remove(positions).await?,
        }

        Ok(self.bus.publish(event))
    }

    async fn read(&self, region: ChunkRegion, republish: bool) -> Result<Vec<Cell>, SyncError> {
        // A re-broadcast snapshot must not overtake a newer write to any cell
        // it contains, so republishing reads exclude all writers.
        let _guards = if republish {
            self.lock_all().await
        } else {
            Vec::new()
        };

        let cells = match region {
            ChunkRegion::Rect {
                x,
                y,
                width,
                height,
            } => self.store.query_rect(x, y, width, height).await?,
            ChunkRegion::Radius { x, y, radius } => {
                self.store.query_radius(x, y, radius).await?
            }
        };

        if republish && !cells.is_empty() {
            let receivers = self.bus.publish(MutationEvent::SetCells {
                cells: cells.clone(),
            });
            debug!(cells = cells.len(), receivers, "Chunk read republished");
        }

        Ok(cells)
    }

    async fn lock_positions(&self, positions: &[Position]) -> Vec<MutexGuard<'_, ()>> {
        let indices: BTreeSet<usize> = positions.iter().map(stripe_index).collect();
        let mut guards = Vec::with_capacity(indices.len());
        // Ascending order keeps multi-stripe writers deadlock free.
        for index in indices {
            if let Some(stripe) = self.stripes.get(index) {
                guards.push(stripe.lock().await);
            }
        }
        guards
    }

    async fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(self.stripes.len());
        for stripe in &self.stripes {
            guards.push(stripe.lock().await);
        }
        guards
    }
}

impl core::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncService")
            .field("bus", &self.bus)
            .field("limits", &self.limits)
            .field("republish_reads", &self.republish_reads)
            .finish_non_exhaustive()
    }
}

fn stripe_index(position: &Position) -> usize {
    let mut hasher = DefaultHasher::new();
    position.hash(&mut hasher);
    usize::try_from(hasher.finish().wrapping_rem(LOCK_STRIPES)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gridsync_db::MemoryGridStore;

    use super::*;

    fn service() -> (Arc<MemoryGridStore>, SyncService) {
        let store = Arc::new(MemoryGridStore::new());
        let service = SyncService::new(store.clone(), &SyncOptions::default());
        (store, service)
    }

    fn sorted(result: Result<Vec<Cell>, SyncError>) -> Vec<Cell> {
        let mut cells = result.unwrap_or_default();
        cells.sort_by_key(Cell::position);
        cells
    }

    #[tokio::test]
    async fn set_then_read_single_cell() {
        let (_, sync) = service();
        assert!(
            sync.set_cell(&SetCellParams::new(0, 0, 0x0083_6953))
                .await
                .is_ok()
        );

        let cells = sorted(sync.get_chunk(&ChunkParams::new(0, 0, 0, 0), false).await);
        assert_eq!(cells, vec![Cell::new(0, 0, 0x0083_6953)]);
    }

    #[tokio::test]
    async fn set_then_remove_leaves_region_empty() {
        let (_, sync) = service();
        assert!(sync.set_cell(&SetCellParams::new(1, 1, 1)).await.is_ok());
        assert!(sync.remove_cell(&PositionParams::new(1, 1)).await.is_ok());

        let cells = sorted(sync.get_chunk(&ChunkParams::new(0, 0, 5, 5), false).await);
        assert!(cells.is_empty());
    }

    #[tokio::test]
    async fn reads_match_replayed_writes() {
        let (_, sync) = service();
        let writes: [(i32, i32, Option<u32>); 6] = [
            (0, 0, Some(1)),
            (1, 0, Some(2)),
            (0, 0, Some(3)),
            (1, 0, None),
            (2, 2, Some(4)),
            (1, 0, Some(5)),
        ];

        let mut expected = std::collections::BTreeMap::new();
        for (x, y, color) in writes {
            match color {
                Some(color) => {
                    assert!(sync.set_cell(&SetCellParams::new(x, y, color)).await.is_ok());
                    expected.insert(Position::new(x, y), color);
                }
                None => {
                    assert!(sync.remove_cell(&PositionParams::new(x, y)).await.is_ok());
                    expected.remove(&Position::new(x, y));
                }
            }
        }

        let cells = sorted(sync.get_chunk(&ChunkParams::new(0, 0, 3, 3), false).await);
        let expected: Vec<Cell> = expected
            .into_iter()
            .map(|(p, color)| Cell::new(p.x, p.y, color))
            .collect();
        assert_eq!(cells, expected);
    }

    #[tokio::test]
    async fn repeated_set_is_idempotent() {
        let (store, sync) = service();
        let params = SetCellParams::new(5, 5, 0x00FF_0000);
        assert!(sync.set_cell(&params).await.is_ok());
        assert!(sync.set_cell(&params).await.is_ok());

        assert_eq!(store.len().await, 1);
        let cells = sorted(sync.get_chunk(&ChunkParams::new(5, 5, 0, 0), false).await);
        assert_eq!(cells, vec![Cell::new(5, 5, 0x00FF_0000)]);
    }

    #[tokio::test]
    async fn subscriber_sees_set_and_late_joiner_does_not() {
        let (_, sync) = service();
        let mut early = sync.live_subscribe();
        assert!(sync.set_cell(&SetCellParams::new(2, 2, 7)).await.is_ok());
        let mut late = sync.live_subscribe();

        assert_eq!(
            early.try_recv().as_deref(),
            Some(&MutationEvent::SetCells {
                cells: vec![Cell::new(2, 2, 7)]
            })
        );
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn failed_write_publishes_nothing() {
        let (store, sync) = service();
        let mut sub = sync.live_subscribe();

        store.set_unavailable(true);
        let result = sync.set_cell(&SetCellParams::new(3, 3, 3)).await;
        assert!(matches!(
            result,
            Err(SyncError::Store(StoreError::Unavailable(_)))
        ));
        let result = sync.remove_cell(&PositionParams::new(3, 3)).await;
        assert!(result.is_err());
        assert!(sub.try_recv().is_none());

        store.set_unavailable(false);
        assert!(sync.set_cell(&SetCellParams::new(4, 4, 4)).await.is_ok());
        assert_eq!(
            sub.try_recv().as_deref(),
            Some(&MutationEvent::SetCells {
                cells: vec![Cell::new(4, 4, 4)]
            })
        );
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_store_or_bus() {
        let (store, sync) = service();
        let mut sub = sync.live_subscribe();

        let bad = SetCellParams {
            x: 0.5,
            y: 0.0,
            color: 1.0,
        };
        let result = sync.set_cell(&bad).await;
        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(
            result.map_err(|e| e.code()).err(),
            Some(ErrorCode::Validation)
        );

        let huge = ChunkParams::new(0, 0, DEFAULT_MAX_CHUNK_SPAN + 1, 0);
        assert!(matches!(
            sync.get_chunk(&huge, true).await,
            Err(SyncError::Validation(_))
        ));

        assert!(store.is_empty().await);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn chunk_read_republishes_when_asked() {
        let (_, sync) = service();
        assert!(sync.set_cell(&SetCellParams::new(1, 1, 1)).await.is_ok());
        assert!(sync.set_cell(&SetCellParams::new(9, 9, 2)).await.is_ok());

        let mut sub = sync.live_subscribe();
        let cells = sorted(sync.get_chunk(&ChunkParams::new(0, 0, 10, 10), true).await);
        assert_eq!(cells.len(), 2);

        let Some(event) = sub.try_recv() else {
            panic!("republished read should reach subscribers");
        };
        let MutationEvent::SetCells { cells: mut sent } = (*event).clone() else {
            panic!("republished read must be a SetCells event");
        };
        sent.sort_by_key(Cell::position);
        assert_eq!(sent, cells);
    }

    #[tokio::test]
    async fn chunk_read_without_republish_is_silent() {
        let (_, sync) = service();
        assert!(sync.set_cell(&SetCellParams::new(1, 1, 1)).await.is_ok());
        let mut sub = sync.live_subscribe();

        assert!(sync.get_chunk(&ChunkParams::new(0, 0, 2, 2), false).await.is_ok());
        assert!(
            sync.get_chunk_by_radius(&RadiusParams::new(0, 0, 2), false)
                .await
                .is_ok()
        );
        // Empty results are never broadcast.
        assert!(
            sync.get_chunk(&ChunkParams::new(100, 100, 1, 1), true)
                .await
                .is_ok()
        );
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn radius_read_is_a_square() {
        let (_, sync) = service();
        assert!(sync.set_cell(&SetCellParams::new(2, -2, 1)).await.is_ok());
        assert!(sync.set_cell(&SetCellParams::new(3, 0, 2)).await.is_ok());

        let cells = sorted(
            sync.get_chunk_by_radius(&RadiusParams::new(0, 0, 2), false)
                .await,
        );
        assert_eq!(cells, vec![Cell::new(2, -2, 1)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_cell_publish_in_commit_order() {
        let store = Arc::new(MemoryGridStore::new());
        let sync = Arc::new(SyncService::new(store, &SyncOptions::default()));
        let mut sub = sync.live_subscribe();

        let mut tasks = Vec::new();
        for color in 1..=50_u32 {
            let sync = Arc::clone(&sync);
            tasks.push(tokio::spawn(async move {
                sync.set_cell(&SetCellParams::new(7, 7, color)).await.is_ok()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap_or(false));
        }

        // The last event delivered must carry the color the store kept.
        let mut last = None;
        while let Some(event) = sub.try_recv() {
            last = Some(event);
        }
        let stored = sorted(sync.get_chunk(&ChunkParams::new(7, 7, 0, 0), false).await);
        let Some(last) = last else {
            panic!("fifty writes should publish fifty events");
        };
        assert_eq!(
            *last,
            MutationEvent::SetCells { cells: stored }
        );
    }
}

//! In-process grid store.
//!
//! Backs the service when no database is configured and stands in for
//! `PostgreSQL` in tests. Outages can be simulated with
//! [`MemoryGridStore::set_unavailable`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use gridsync_types::{Bounds, Cell, MAX_COLOR, Position};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::GridStore;

/// A [`GridStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGridStore {
    cells: RwLock<BTreeMap<Position, u32>>,
    unavailable: AtomicBool,
}

impl MemoryGridStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with
    /// [`StoreError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored cells.
    pub async fn len(&self) -> usize {
        self.cells.read().await.len()
    }

    /// Whether no cells are stored.
    pub async fn is_empty(&self) -> bool {
        self.cells.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(String::from(
                "in-memory store marked unavailable",
            )));
        }
        Ok(())
    }
}

/// Clamp an `i64` bound into the `i32` coordinate space.
fn clamp_coord(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

#[async_trait]
impl GridStore for MemoryGridStore {
    async fn upsert(&self, cells: &[Cell]) -> Result<(), StoreError> {
        self.check_available()?;

        // Mirror the table's CHECK constraint so both stores reject the same
        // values, and validate everything before touching the map.
        if let Some(bad) = cells.iter().find(|cell| cell.color > MAX_COLOR) {
            return Err(StoreError::Invalid(format!(
                "color {:#x} at {} exceeds {MAX_COLOR:#x}",
                bad.color,
                bad.position()
            )));
        }

        let mut map = self.cells.write().await;
        for cell in cells {
            map.insert(cell.position(), cell.color);
        }
        Ok(())
    }

    async fn remove(&self, positions: &[Position]) -> Result<(), StoreError> {
        self.check_available()?;

        let mut map = self.cells.write().await;
        for position in positions {
            map.remove(position);
        }
        Ok(())
    }

    async fn query_bounds(&self, bounds: Bounds) -> Result<Vec<Cell>, StoreError> {
        self.check_available()?;

        if bounds.min_x > bounds.max_x || bounds.min_y > bounds.max_y {
            return Ok(Vec::new());
        }

        let start = Position::new(clamp_coord(bounds.min_x), i32::MIN);
        let end = Position::new(clamp_coord(bounds.max_x), i32::MAX);

        let map = self.cells.read().await;
        Ok(map
            .range(start..=end)
            .filter(|(position, _)| bounds.contains(**position))
            .map(|(position, color)| Cell::new(position.x, position.y, *color))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut cells: Vec<Cell>) -> Vec<Cell> {
        cells.sort_by_key(Cell::position);
        cells
    }

    #[tokio::test]
    async fn upsert_last_write_wins_within_a_call() {
        let store = MemoryGridStore::new();
        store
            .upsert(&[Cell::new(0, 0, 1), Cell::new(0, 0, 2)])
            .await
            .unwrap_or_default();

        let cells = store.query_rect(0, 0, 0, 0).await.unwrap_or_default();
        assert_eq!(cells, vec![Cell::new(0, 0, 2)]);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryGridStore::new();
        let batch = [Cell::new(5, 5, 0x00FF_0000)];
        assert!(store.upsert(&batch).await.is_ok());
        assert!(store.upsert(&batch).await.is_ok());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_ignores_absent_rows() {
        let store = MemoryGridStore::new();
        assert!(store.upsert(&[Cell::new(1, 1, 1)]).await.is_ok());
        assert!(
            store
                .remove(&[Position::new(1, 1), Position::new(9, 9)])
                .await
                .is_ok()
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn rect_query_is_inclusive() {
        let store = MemoryGridStore::new();
        let cells = [
            Cell::new(0, 0, 1),
            Cell::new(2, 3, 2),
            Cell::new(3, 3, 3),
            Cell::new(2, 4, 4),
        ];
        assert!(store.upsert(&cells).await.is_ok());

        let found = sorted(store.query_rect(0, 0, 2, 3).await.unwrap_or_default());
        assert_eq!(found, vec![Cell::new(0, 0, 1), Cell::new(2, 3, 2)]);
    }

    #[tokio::test]
    async fn radius_query_is_a_square() {
        let store = MemoryGridStore::new();
        let cells = [
            Cell::new(2, 2, 1),
            Cell::new(-2, 2, 2),
            Cell::new(3, 0, 3),
        ];
        assert!(store.upsert(&cells).await.is_ok());

        let found = sorted(store.query_radius(0, 0, 2).await.unwrap_or_default());
        assert_eq!(found, vec![Cell::new(-2, 2, 2), Cell::new(2, 2, 1)]);
    }

    #[tokio::test]
    async fn out_of_range_color_is_invalid_and_not_applied() {
        let store = MemoryGridStore::new();
        let result = store
            .upsert(&[Cell::new(0, 0, 1), Cell::new(1, 0, 0x0100_0000)])
            .await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryGridStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.upsert(&[Cell::new(0, 0, 1)]).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.query_rect(0, 0, 1, 1).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.upsert(&[Cell::new(0, 0, 1)]).await.is_ok());
    }
}

//! The grid store contract.
//!
//! A durable map from `(x, y)` to color. Implementations apply each call
//! atomically and surface failures unmodified; retry policy belongs to the
//! caller.

use async_trait::async_trait;
use gridsync_types::{Bounds, Cell, Position};

use crate::error::StoreError;

/// Durable key-value storage for grid cells.
#[async_trait]
pub trait GridStore: Send + Sync {
    /// Atomically upsert every cell.
    ///
    /// When a position appears more than once, the last entry wins.
    /// Re-applying the same list is a no-op beyond rewriting identical values.
    async fn upsert(&self, cells: &[Cell]) -> Result<(), StoreError>;

    /// Delete every listed position. Absent positions are ignored.
    async fn remove(&self, positions: &[Position]) -> Result<(), StoreError>;

    /// All stored cells inside `bounds`, in no particular order.
    async fn query_bounds(&self, bounds: Bounds) -> Result<Vec<Cell>, StoreError>;

    /// All cells with `x..=x+width` and `y..=y+height`.
    async fn query_rect(
        &self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<Vec<Cell>, StoreError> {
        self.query_bounds(Bounds::rect(x, y, width, height)).await
    }

    /// All cells with `|dx| <= radius` and `|dy| <= radius`.
    ///
    /// The region is a square, not a disk.
    async fn query_radius(&self, x: i32, y: i32, radius: u32) -> Result<Vec<Cell>, StoreError> {
        self.query_bounds(Bounds::radius(x, y, radius)).await
    }
}

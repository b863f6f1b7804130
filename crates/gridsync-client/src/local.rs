//! A viewer's local copy of part of the grid.
//!
//! Seed it from a chunk read, then apply every [`MutationEvent`] from a
//! live feed. Replaying events in delivery order converges on the stored
//! state for every coordinate they touch.

use std::collections::BTreeMap;

use gridsync_types::{Bounds, Cell, MutationEvent, Position};

/// Cells known to one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalGrid {
    cells: BTreeMap<Position, u32>,
}

impl LocalGrid {
    /// An empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one mutation.
    pub fn apply(&mut self, event: &MutationEvent) {
        match event {
            MutationEvent::SetCells { cells } => self.seed(cells),
            MutationEvent::RemoveCells { positions } => {
                for position in positions {
                    self.cells.remove(position);
                }
            }
        }
    }

    /// Upsert cells, for example from a chunk read.
    pub fn seed(&mut self, cells: &[Cell]) {
        for cell in cells {
            self.cells.insert(cell.position(), cell.color);
        }
    }

    /// Replace everything inside `bounds` with `cells`.
    ///
    /// Used to resynchronize a region after missed events.
    pub fn replace_region(&mut self, bounds: Bounds, cells: &[Cell]) {
        self.cells.retain(|position, _| !bounds.contains(*position));
        self.seed(cells);
    }

    /// Color at `position`, if the cell is known.
    pub fn get(&self, position: Position) -> Option<u32> {
        self.cells.get(&position).copied()
    }

    /// Number of known cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cells are known.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Known cells ordered by `x`, then `y`.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells
            .iter()
            .map(|(position, color)| Cell::new(position.x, position.y, *color))
    }
}

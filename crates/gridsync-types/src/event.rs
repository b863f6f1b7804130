//! Mutation events fanned out to live subscribers.
//!
//! The event stream is a notification channel, not a log: replaying every
//! event affecting a coordinate, in publish order, reproduces the stored
//! state for that coordinate.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cell::{Cell, Position};

/// A committed change to the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MutationEvent {
    /// One or more cells were upserted.
    SetCells {
        /// The new cell values, in write order.
        cells: Vec<Cell>,
    },
    /// One or more cells were deleted.
    RemoveCells {
        /// The removed positions, in write order.
        positions: Vec<Position>,
    },
}

impl MutationEvent {
    /// Number of cells the event touches.
    pub fn len(&self) -> usize {
        match self {
            Self::SetCells { cells } => cells.len(),
            Self::RemoveCells { positions } => positions.len(),
        }
    }

    /// Whether the event touches no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every position the event touches, in write order.
    pub fn positions(&self) -> Vec<Position> {
        match self {
            Self::SetCells { cells } => cells.iter().map(Cell::position).collect(),
            Self::RemoveCells { positions } => positions.clone(),
        }
    }

    /// Short name used in log fields.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::SetCells { .. } => "set_cells",
            Self::RemoveCells { .. } => "remove_cells",
        }
    }
}

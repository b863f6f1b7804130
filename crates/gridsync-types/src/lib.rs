//! Shared type definitions for GridSync.
//!
//! This crate is the single source of truth for the data model and the wire
//! protocol spoken by the server and its clients. Wire types flow downstream
//! to `TypeScript` via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`cell`] -- Cells, positions, and inclusive query regions
//! - [`event`] -- The `SetCells` / `RemoveCells` mutation event
//! - [`operation`] -- Operation catalogue and transport channels
//! - [`params`] -- Raw operation parameters as received on the wire
//! - [`protocol`] -- Streaming frames and HTTP bodies
//! - [`ids`] -- Connection identifiers

pub mod cell;
pub mod event;
pub mod ids;
pub mod operation;
pub mod params;
pub mod protocol;

// Re-export all public types at crate root for convenience.
pub use cell::{Bounds, Cell, MAX_COLOR, Position};
pub use event::MutationEvent;
pub use ids::ConnectionId;
pub use operation::{Channel, OperationKind};
pub use params::{ChunkParams, PositionParams, RadiusParams, SetCellParams};
pub use protocol::{
    AckBody, CellsBody, ClientFrame, ErrorBody, ErrorCode, ServerFrame, WireError,
};

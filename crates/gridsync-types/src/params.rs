//! Operation parameters as they arrive on the wire.
//!
//! Numbers are carried as raw JSON numbers (`f64`) so the server can reject
//! fractional, non-finite, or out-of-range values with a validation error
//! instead of a decode failure. The same structs serve as HTTP bodies,
//! HTTP query strings, and `WebSocket` frame parameters.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Parameters for `setCell`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SetCellParams {
    /// Column.
    pub x: f64,
    /// Row.
    pub y: f64,
    /// 24-bit RGB color.
    pub color: f64,
}

impl SetCellParams {
    /// Build parameters from already-typed values.
    pub fn new(x: i32, y: i32, color: u32) -> Self {
        Self {
            x: f64::from(x),
            y: f64::from(y),
            color: f64::from(color),
        }
    }
}

/// Parameters for `removeCell`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PositionParams {
    /// Column.
    pub x: f64,
    /// Row.
    pub y: f64,
}

impl PositionParams {
    /// Build parameters from already-typed values.
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x: f64::from(x),
            y: f64::from(y),
        }
    }
}

/// Parameters for `getChunk`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChunkParams {
    /// Left column.
    pub x: f64,
    /// Top row.
    pub y: f64,
    /// Extra columns to the right of `x` (inclusive).
    pub width: f64,
    /// Extra rows below `y` (inclusive).
    pub height: f64,
}

impl ChunkParams {
    /// Build parameters from already-typed values.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x: f64::from(x),
            y: f64::from(y),
            width: f64::from(width),
            height: f64::from(height),
        }
    }
}

/// Parameters for `getChunkByRadius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RadiusParams {
    /// Center column.
    pub x: f64,
    /// Center row.
    pub y: f64,
    /// Chebyshev radius.
    pub radius: f64,
}

impl RadiusParams {
    /// Build parameters from already-typed values.
    pub fn new(x: i32, y: i32, radius: u32) -> Self {
        Self {
            x: f64::from(x),
            y: f64::from(y),
            radius: f64::from(radius),
        }
    }
}

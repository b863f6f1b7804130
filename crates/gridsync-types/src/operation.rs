//! The client-facing operation catalogue and the two transport channels.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Every operation a client can issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum OperationKind {
    /// Upsert a single cell.
    SetCell,
    /// Delete a single cell.
    RemoveCell,
    /// Read a rectangular region.
    GetChunk,
    /// Read a square region around a center.
    GetChunkByRadius,
    /// Open the live mutation feed.
    LiveSubscribe,
}

impl OperationKind {
    /// All operations, in catalogue order.
    pub const ALL: [Self; 5] = [
        Self::SetCell,
        Self::RemoveCell,
        Self::GetChunk,
        Self::GetChunkByRadius,
        Self::LiveSubscribe,
    ];

    /// Procedure path used on the wire (`setCell`, `getChunk`, ...).
    pub const fn path(self) -> &'static str {
        match self {
            Self::SetCell => "setCell",
            Self::RemoveCell => "removeCell",
            Self::GetChunk => "getChunk",
            Self::GetChunkByRadius => "getChunkByRadius",
            Self::LiveSubscribe => "liveSubscribe",
        }
    }
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

/// The transport an operation travels over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Channel {
    /// Persistent bidirectional `WebSocket`.
    Streaming,
    /// Stateless HTTP call-and-reply.
    RequestResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_procedure_path() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.to_string(), kind.path());
        }
        assert_eq!(OperationKind::GetChunkByRadius.to_string(), "getChunkByRadius");
    }
}

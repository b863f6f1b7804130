//! Wire frames for both transport channels.
//!
//! # Streaming channel
//!
//! `WebSocket` text frames carrying JSON. Client frames are tagged by
//! `method` and carry a client-chosen `id`; server frames are tagged by
//! `kind` and echo that `id`. Live mutations arrive as `event` frames whose
//! `id` is the id of the `liveSubscribe` request that opened the feed.
//!
//! ```text
//! -> {"method":"setCell","id":1,"params":{"x":0,"y":0,"color":8612179}}
//! <- {"kind":"ack","id":1}
//! -> {"method":"liveSubscribe","id":2}
//! <- {"kind":"subscribed","id":2}
//! <- {"kind":"event","id":2,"event":{"type":"set_cells","cells":[...]}}
//! ```
//!
//! # Request/response channel
//!
//! Plain JSON bodies: [`CellsBody`], [`AckBody`], and [`ErrorBody`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cell::Cell;
use crate::event::MutationEvent;
use crate::params::{ChunkParams, PositionParams, RadiusParams, SetCellParams};

/// A request sent by a client over the streaming channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "method", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ClientFrame {
    /// Upsert one cell.
    SetCell {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
        /// Cell to write.
        params: SetCellParams,
    },
    /// Delete one cell.
    RemoveCell {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
        /// Position to delete.
        params: PositionParams,
    },
    /// Read a rectangular region.
    GetChunk {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
        /// Region to read.
        params: ChunkParams,
    },
    /// Read a square region around a center.
    GetChunkByRadius {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
        /// Region to read.
        params: RadiusParams,
    },
    /// Open the live mutation feed for this connection.
    LiveSubscribe {
        /// Request id; echoed on every event frame.
        #[ts(type = "number")]
        id: u64,
    },
    /// Close the live mutation feed.
    Unsubscribe {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
    },
}

/// A message sent by the server over the streaming channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerFrame {
    /// A mutation committed.
    Ack {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
    },
    /// Result of a chunk read.
    Cells {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
        /// Cells in the region, unordered.
        cells: Vec<Cell>,
    },
    /// The live feed is open.
    Subscribed {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
    },
    /// The live feed is closed.
    Unsubscribed {
        /// Request id.
        #[ts(type = "number")]
        id: u64,
    },
    /// A live mutation.
    Event {
        /// Id of the `liveSubscribe` request that opened the feed.
        #[ts(type = "number")]
        id: u64,
        /// The mutation.
        event: MutationEvent,
    },
    /// A request failed, or a frame could not be decoded (`id` absent).
    Error {
        /// Request id, when the frame could be decoded.
        #[ts(type = "number | null")]
        id: Option<u64>,
        /// What went wrong.
        error: WireError,
    },
}

impl ServerFrame {
    /// The request id this frame answers, if any.
    pub const fn id(&self) -> Option<u64> {
        match self {
            Self::Ack { id }
            | Self::Cells { id, .. }
            | Self::Subscribed { id }
            | Self::Unsubscribed { id }
            | Self::Event { id, .. } => Some(*id),
            Self::Error { id, .. } => *id,
        }
    }
}

/// Machine-readable error category shared by both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ErrorCode {
    /// Input was malformed or out of range; nothing was applied.
    Validation,
    /// The grid store could not be reached.
    StoreUnavailable,
    /// The grid store rejected the request.
    StoreInvalid,
    /// The frame could not be decoded or is not allowed in this state.
    BadRequest,
}

/// Error payload carried by [`ServerFrame::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WireError {
    /// Error category.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Response body for chunk reads over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CellsBody {
    /// Cells in the region, unordered.
    pub cells: Vec<Cell>,
}

/// Response body for mutations over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AckBody {
    /// Always `true`; failures use [`ErrorBody`].
    pub ok: bool,
}

/// Error body returned by the HTTP channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorBody {
    /// Human-readable detail.
    pub error: String,
    /// Error category.
    pub code: ErrorCode,
    /// HTTP status code.
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;

    #[test]
    fn client_frames_use_procedure_paths() {
        let frame = ClientFrame::GetChunkByRadius {
            id: 4,
            params: RadiusParams::new(1, 2, 3),
        };
        let json = serde_json::to_value(&frame).unwrap_or_default();
        assert_eq!(json["method"], OperationKind::GetChunkByRadius.path());
        assert_eq!(json["id"], 4);
    }

    #[test]
    fn integer_json_decodes_into_params() {
        let frame: Result<ClientFrame, _> = serde_json::from_str(
            r#"{"method":"setCell","id":9,"params":{"x":0,"y":-3,"color":8612179}}"#,
        );
        assert!(matches!(
            frame,
            Ok(ClientFrame::SetCell { id: 9, params }) if params == SetCellParams::new(0, -3, 0x0083_6953)
        ));
    }

    #[test]
    fn error_frame_without_id() {
        let frame = ServerFrame::Error {
            id: None,
            error: WireError {
                code: ErrorCode::BadRequest,
                message: String::from("bad frame"),
            },
        };
        let json = serde_json::to_value(&frame).unwrap_or_default();
        assert_eq!(json["kind"], "error");
        assert!(json["id"].is_null());
        assert_eq!(json["error"]["code"], "bad_request");
        assert_eq!(frame.id(), None);
    }
}

//! Client error types.

use std::time::Duration;

use gridsync_types::ErrorCode;

use crate::routing::RoutingError;

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The streaming channel could not be opened or has closed. Calls
    /// routed to it fail; they are not retried over HTTP.
    #[error("streaming channel unavailable: {0}")]
    ChannelDown(String),

    /// A request on an open streaming channel got no reply in time. The
    /// channel stays open and later calls reuse it.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The HTTP request could not be completed.
    #[error("http request failed: {0}")]
    Http(String),

    /// The server sent something the client could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server processed the request and refused it.
    #[error("rejected ({code:?}): {message}")]
    Rejected {
        /// Error category reported by the server.
        code: ErrorCode,
        /// Server-provided detail.
        message: String,
    },

    /// The client configuration is unusable.
    #[error("invalid client config: {0}")]
    Config(String),

    /// The routing table is incomplete or inconsistent.
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

impl TransportError {
    /// Server-side error category, if the server rejected the request.
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

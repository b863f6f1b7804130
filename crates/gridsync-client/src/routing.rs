//! Static operation-to-channel routing.
//!
//! A [`RoutingTable`] names a channel for every routable operation, so a
//! table that exists is complete. Tables assembled at runtime go through
//! [`RoutingTable::from_entries`], which rejects gaps, duplicates, and a
//! `liveSubscribe` that is not on the streaming channel.

use std::collections::BTreeSet;

use gridsync_types::{Channel, OperationKind};

/// Why a routing table could not be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// An operation has no channel.
    #[error("no channel configured for {0}")]
    Missing(OperationKind),

    /// An operation was given more than one channel.
    #[error("{0} is routed more than once")]
    Duplicate(OperationKind),

    /// The operation only exists on the streaming channel.
    #[error("{0} can only travel over the streaming channel")]
    StreamingOnly(OperationKind),
}

/// Channel assignment for every client operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingTable {
    set_cell: Channel,
    remove_cell: Channel,
    get_chunk: Channel,
    get_chunk_by_radius: Channel,
}

impl RoutingTable {
    /// Mutations stream, reads use request/response, subscriptions stream.
    pub const DEFAULT: Self = Self {
        set_cell: Channel::Streaming,
        remove_cell: Channel::Streaming,
        get_chunk: Channel::RequestResponse,
        get_chunk_by_radius: Channel::RequestResponse,
    };

    /// Everything except `liveSubscribe` over request/response.
    pub const SUBSCRIPTIONS_ONLY: Self = Self {
        set_cell: Channel::RequestResponse,
        remove_cell: Channel::RequestResponse,
        get_chunk: Channel::RequestResponse,
        get_chunk_by_radius: Channel::RequestResponse,
    };

    /// Build a table from explicit `(operation, channel)` pairs.
    ///
    /// Every operation in [`OperationKind::ALL`] must appear exactly once.
    ///
    /// # Errors
    ///
    /// Returns the first [`RoutingError`] found.
    pub fn from_entries(entries: &[(OperationKind, Channel)]) -> Result<Self, RoutingError> {
        let mut seen = BTreeSet::new();
        for (kind, _) in entries {
            if !seen.insert(*kind) {
                return Err(RoutingError::Duplicate(*kind));
            }
        }

        let lookup = |kind: OperationKind| {
            entries
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, channel)| *channel)
                .ok_or(RoutingError::Missing(kind))
        };

        if lookup(OperationKind::LiveSubscribe)? != Channel::Streaming {
            return Err(RoutingError::StreamingOnly(OperationKind::LiveSubscribe));
        }

        Ok(Self {
            set_cell: lookup(OperationKind::SetCell)?,
            remove_cell: lookup(OperationKind::RemoveCell)?,
            get_chunk: lookup(OperationKind::GetChunk)?,
            get_chunk_by_radius: lookup(OperationKind::GetChunkByRadius)?,
        })
    }

    /// The channel `kind` travels over.
    pub const fn route(&self, kind: OperationKind) -> Channel {
        match kind {
            OperationKind::SetCell => self.set_cell,
            OperationKind::RemoveCell => self.remove_cell,
            OperationKind::GetChunk => self.get_chunk,
            OperationKind::GetChunkByRadius => self.get_chunk_by_radius,
            OperationKind::LiveSubscribe => Channel::Streaming,
        }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_catalogue() {
        let table = RoutingTable::default();
        assert_eq!(table.route(OperationKind::SetCell), Channel::Streaming);
        assert_eq!(table.route(OperationKind::RemoveCell), Channel::Streaming);
        assert_eq!(table.route(OperationKind::GetChunk), Channel::RequestResponse);
        assert_eq!(
            table.route(OperationKind::GetChunkByRadius),
            Channel::RequestResponse
        );
        assert_eq!(table.route(OperationKind::LiveSubscribe), Channel::Streaming);
    }

    #[test]
    fn subscriptions_only_keeps_subscribe_streaming() {
        let table = RoutingTable::SUBSCRIPTIONS_ONLY;
        assert_eq!(table.route(OperationKind::SetCell), Channel::RequestResponse);
        assert_eq!(table.route(OperationKind::LiveSubscribe), Channel::Streaming);
        assert_eq!(table.route(OperationKind::GetChunk), Channel::RequestResponse);
    }

    #[test]
    fn entries_round_trip_default() {
        let entries: Vec<_> = OperationKind::ALL
            .into_iter()
            .map(|kind| (kind, RoutingTable::DEFAULT.route(kind)))
            .collect();
        assert_eq!(
            RoutingTable::from_entries(&entries),
            Ok(RoutingTable::DEFAULT)
        );
    }

    #[test]
    fn incomplete_table_is_rejected() {
        let entries = [
            (OperationKind::SetCell, Channel::Streaming),
            (OperationKind::RemoveCell, Channel::Streaming),
            (OperationKind::GetChunk, Channel::RequestResponse),
            (OperationKind::LiveSubscribe, Channel::Streaming),
        ];
        assert_eq!(
            RoutingTable::from_entries(&entries),
            Err(RoutingError::Missing(OperationKind::GetChunkByRadius))
        );
    }

    #[test]
    fn duplicate_and_non_streaming_subscribe_are_rejected() {
        let duplicate = [
            (OperationKind::SetCell, Channel::Streaming),
            (OperationKind::SetCell, Channel::RequestResponse),
        ];
        assert_eq!(
            RoutingTable::from_entries(&duplicate),
            Err(RoutingError::Duplicate(OperationKind::SetCell))
        );

        let entries: Vec<_> = OperationKind::ALL
            .into_iter()
            .map(|kind| (kind, Channel::RequestResponse))
            .collect();
        assert_eq!(
            RoutingTable::from_entries(&entries),
            Err(RoutingError::StreamingOnly(OperationKind::LiveSubscribe))
        );
    }
}

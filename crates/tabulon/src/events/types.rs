use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::TableEntity;

/// A domain event serialized by the host framework, ready to be committed.
///
/// Payload and metadata are opaque strings; the adapter never looks inside
/// them.
#[derive(Debug, Clone)]
pub struct SerializedEvent {
    pub event_name: String,
    pub aggregate_name: String,
    pub aggregate_sequence_number: u32,
    pub data: String,
    pub metadata: String,
    /// Identifies the commit this event was part of.
    pub batch_id: Uuid,
}

/// An event as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvent {
    pub aggregate_id: String,
    pub aggregate_sequence_number: u32,
    pub global_sequence_number: u64,
    pub data: String,
    pub metadata: String,
}

/// A position in the global event order, for paging through all committed
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlobalPosition(Option<u64>);

impl GlobalPosition {
    /// The position before the first event.
    pub const fn start() -> Self {
        Self(None)
    }

    /// The position of the event holding `sequence_number`.
    pub const fn from_sequence_number(sequence_number: u64) -> Self {
        Self(Some(sequence_number))
    }

    pub const fn is_start(&self) -> bool {
        self.0.is_none()
    }

    pub const fn sequence_number(&self) -> Option<u64> {
        self.0
    }
}

/// One page of the global event stream.
///
/// `next_position` resumes paging after the last event of this page; when the
/// page is empty it equals the requested position, so polling readers simply
/// ask again.
#[derive(Debug)]
pub struct CommittedEventsPage {
    pub next_position: GlobalPosition,
    pub events: Vec<CommittedEvent>,
}

/// Row layout of the event store table.
///
/// The partition key is the aggregate id, isolating each aggregate into its
/// own partition; the row key is the zero-padded aggregate sequence number so
/// rows sort and range-query in event order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventRow {
    pub partition_key: String,
    pub row_key: String,
    pub event_name: String,
    pub aggregate_name: String,
    pub aggregate_id: String,
    pub aggregate_sequence_number: u32,
    pub global_sequence_number: u64,
    pub data: String,
    pub metadata: String,
    pub batch_id: Uuid,
}

impl EventRow {
    pub(crate) fn into_committed(self) -> CommittedEvent {
        CommittedEvent {
            aggregate_id: self.aggregate_id,
            aggregate_sequence_number: self.aggregate_sequence_number,
            global_sequence_number: self.global_sequence_number,
            data: self.data,
            metadata: self.metadata,
        }
    }
}

impl TableEntity for EventRow {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }

    fn row_key(&self) -> &str {
        &self.row_key
    }
}

/// Property name of [`EventRow::global_sequence_number`] as serialized, for
/// building query filters.
pub(crate) const GLOBAL_SEQUENCE_NUMBER: &str = "GlobalSequenceNumber";

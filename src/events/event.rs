//! # Lifecycle events emitted by the conveyor.
//!
//! [`EventKind`] classifies the four points of a ticket's life the conveyor
//! reports on; [`Event`] carries the metadata (sequence number, wall-clock
//! timestamp, affected ticket).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of conveyor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The ticket arrived while another held the slot and joined the queue.
    ///
    /// Not emitted for tickets admitted immediately on arrival.
    TicketEnqueued,

    /// The ticket was granted the running slot, either immediately on
    /// arrival or by promotion after the previous holder left.
    TicketAdmitted,

    /// The ticket's body completed (successfully or not) and the slot was
    /// released.
    TicketFinished,

    /// The ticket was withdrawn before finishing: its submission was
    /// dropped or its cancellation token fired, while queued or running.
    TicketCanceled,
}

/// One conveyor lifecycle event.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - `ticket`: the submission this event concerns
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Ticket id of the affected submission.
    pub ticket: u64,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind, ticket: u64) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            ticket,
        }
    }
}

//! Host-facing event vocabulary.
//!
//! The planner reports every admission and lifecycle change through an
//! [`EventSink`]. Sinks run while the planner is locked, so they must not
//! block. [`EventBuffer`] holds events in a fixed-size batch that the
//! background context takes and publishes after releasing the lock; tests
//! record them in an [`EventLog`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consts::EVENT_BUFFER_SIZE;

/// Host-assigned, opaque action identifier (the `N` word of a command).
pub type ActionId = i32;

/// One event reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostEvent {
    /// Action admitted into the queue.
    Queued(ActionId),
    /// Action began executing.
    Started(ActionId),
    /// Action completed normally.
    Completed(ActionId),
    /// Action aborted (endstop fault or lock).
    Failed(ActionId),
    /// Degenerate action rejected at admission; never entered the queue.
    Dropped(ActionId),
}

impl HostEvent {
    /// Identifier of the action the event refers to.
    #[inline]
    pub const fn id(&self) -> ActionId {
        match *self {
            HostEvent::Queued(id)
            | HostEvent::Started(id)
            | HostEvent::Completed(id)
            | HostEvent::Failed(id)
            | HostEvent::Dropped(id) => id,
        }
    }

    /// Whether the event closes the action's lifecycle.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, HostEvent::Completed(_) | HostEvent::Failed(_))
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Queued(id) => write!(f, "queued N{id}"),
            HostEvent::Started(id) => write!(f, "started N{id}"),
            HostEvent::Completed(id) => write!(f, "completed N{id}"),
            HostEvent::Failed(id) => write!(f, "failed N{id}"),
            HostEvent::Dropped(id) => write!(f, "dropped N{id}"),
        }
    }
}

/// Events handed from the planner lock to the publishing context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: heapless::Vec<HostEvent, EVENT_BUFFER_SIZE>,
    /// Events discarded because the batch was full.
    pub lost: u32,
}

impl EventBatch {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.lost == 0
    }
}

/// Receiver of host events.
pub trait EventSink {
    fn emit(&mut self, event: HostEvent);

    /// Hand over events held back for publishing outside the planner lock.
    /// Sinks that deliver in `emit` have nothing to hand over.
    fn take_batch(&mut self) -> EventBatch {
        EventBatch::default()
    }
}

/// Sink that records every event in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<HostEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far.
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Ids of terminal events (`Completed`/`Failed`) in emission order.
    pub fn terminal_ids(&self) -> Vec<ActionId> {
        self.events
            .iter()
            .filter(|e| e.is_terminal())
            .map(HostEvent::id)
            .collect()
    }

    /// Number of recorded events equal to `event`.
    pub fn count(&self, event: HostEvent) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }

    /// Drain recorded events.
    pub fn take(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: HostEvent) {
        self.events.push(event);
    }
}

/// Bounded sink that never allocates. Events wait in the batch until the
/// background context takes them.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    batch: EventBatch,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events waiting to be taken.
    pub fn len(&self) -> usize {
        self.batch.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

impl EventSink for EventBuffer {
    fn emit(&mut self, event: HostEvent) {
        if self.batch.events.push(event).is_err() {
            self.batch.lost = self.batch.lost.saturating_add(1);
        }
    }

    fn take_batch(&mut self) -> EventBatch {
        std::mem::take(&mut self.batch)
    }
}

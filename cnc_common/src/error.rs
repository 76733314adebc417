//! Admission results and the planner error taxonomy.
//!
//! - `NoMem`: transient, queue full. The producer retries later.
//! - `Locked`: system deliberately halted. The producer waits for unlock.
//!
//! Endstop faults are not errors returned to the caller: they surface as a
//! `Failed` event and leave the planner locked.

use thiserror::Error;

/// Reason an enqueue request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// Every usable slot is taken.
    #[error("no space in buffer")]
    NoMem,

    /// The planner is locked until an explicit unlock.
    #[error("system is locked")]
    Locked,
}

/// Outcome of an accepted enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Action stored in the queue.
    Queued,
    /// Action had no effect and was discarded; a `Dropped` event was sent.
    Dropped,
}

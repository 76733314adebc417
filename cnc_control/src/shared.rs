//! Shared planner handle for the three execution contexts.
//!
//! | Context | Entry point | Locking |
//! |---------|-------------|---------|
//! | command producer | [`SharedPlanner::with`] | blocking, short |
//! | background pass | [`SharedPlanner::background`] | blocking, short |
//! | tick source | [`SharedPlanner::try_tick`] | `try_lock` only |
//!
//! The tick context never waits: a contended tick returns `None` and the
//! caller retries after a short pause. Host events leave the critical
//! section as an [`EventBatch`]; publishing them happens after unlock.

use std::sync::Arc;

use parking_lot::Mutex;

use cnc_common::consts::QUEUE_SIZE;
use cnc_common::events::{EventBatch, EventSink};
use cnc_common::hal::StepperHal;

use crate::moves::Tick;
use crate::planner::Planner;

/// Cloneable handle to one planner.
pub struct SharedPlanner<H, E, const N: usize = QUEUE_SIZE> {
    inner: Arc<Mutex<Planner<H, E, N>>>,
}

impl<H, E, const N: usize> Clone for SharedPlanner<H, E, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: StepperHal, E: EventSink, const N: usize> SharedPlanner<H, E, N> {
    pub fn new(planner: Planner<H, E, N>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(planner)),
        }
    }

    /// Run `f` with exclusive access. Keep `f` short and free of I/O.
    pub fn with<R>(&self, f: impl FnOnce(&mut Planner<H, E, N>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// One tick if the planner is free, `None` if another context holds it.
    #[inline]
    pub fn try_tick(&self) -> Option<Tick> {
        self.inner.try_lock().map(|mut p| p.tick())
    }

    /// Report pending states, then pre-calculate queued actions. Returns
    /// the events the sink held back, for publishing without the lock.
    pub fn background(&self) -> EventBatch {
        let mut p = self.inner.lock();
        p.report_states();
        p.pre_calculate();
        p.events_mut().take_batch()
    }
}

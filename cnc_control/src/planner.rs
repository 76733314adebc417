//! Bounded action queue and lifecycle state machine.
//!
//! The planner owns a fixed ring of `N` slots addressed by three cursors:
//!
//! ```text
//!   first ──► cursor ──► last
//!   │ terminal, │ queued/prepared, │ free
//!   │ unreported│ or executing     │
//! ```
//!
//! - `used = last - first (mod N)` counts actions awaiting report.
//! - `active = last - cursor (mod N)` counts actions awaiting or undergoing
//!   execution.
//! - One slot is always kept free so a full ring is distinguishable from an
//!   empty one; at most `N - 1` actions are in flight.
//!
//! ## Lifecycle
//!
//! `Queued → Prepared → Started → Finished | Failed`. An empty slot is
//! `None`. Every transition after admission sets `state_changed`;
//! [`Planner::report_states`] emits the pending event once and recycles
//! terminal slots from `first`.
//!
//! Actions started from the tick path must be `Prepared`. An action still
//! `Queued` when its predecessor finishes stays at `cursor` and
//! [`Planner::tick`] returns [`Tick::Pending`] until the background pass
//! has pre-calculated it.
//!
//! ## Lock
//!
//! [`Planner::lock`] is unconditional. The in-flight action (if any) is
//! marked `Failed` and only the steps already issued are committed to the
//! position. Actions that never started are discarded and the ring
//! collapses to `first == cursor == last`. Terminal actions whose event is
//! still pending are left in their slots outside the window:
//! `report_states` emits them first, and `push` flushes one before reusing
//! its slot, so a lock never swallows a `completed`/`failed` event.

use tracing::{debug, info, trace, warn};

use cnc_common::axis::Endstops;
use cnc_common::config::MachineConfig;
use cnc_common::consts::{AXES, QUEUE_SIZE};
use cnc_common::error::{Admission, PlannerError};
use cnc_common::events::{ActionId, EventSink, HostEvent};
use cnc_common::hal::StepperHal;

use crate::moves::arc::{ArcGeometry, ArcMover, ArcPlan};
use crate::moves::line::{LineMover, LinePlan};
use crate::moves::tool::{ToolPlan, tool_action};
use crate::moves::{BreakPredicate, Dispatch, FeedProfile, Position, Tick, break_on_endstops};

// ─── Action ─────────────────────────────────────────────────────────

/// Lifecycle state of an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Admitted, not yet pre-calculated.
    Queued,
    /// Geometry pre-calculated; eligible to execute.
    Prepared,
    /// Currently driving the step generator.
    Started,
    /// Completed normally.
    Finished,
    /// Aborted by an endstop fault or a lock.
    Failed,
}

impl ActionState {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ActionState::Finished | ActionState::Failed)
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone)]
pub enum ActionKind {
    Line(LinePlan),
    Arc(ArcPlan),
    Tool(ToolPlan),
}

/// One queued unit of work.
#[derive(Debug, Clone)]
pub struct Action {
    pub id: ActionId,
    pub state: ActionState,
    /// A state change has not been reported yet.
    pub state_changed: bool,
    pub kind: ActionKind,
}

/// RT state of the executing step-generating action.
#[derive(Debug, Clone)]
enum Motion {
    Line(LineMover),
    Arc(ArcMover),
}

impl Motion {
    fn planned(&self) -> [i32; AXES] {
        match self {
            Motion::Line(m) => *m.planned(),
            Motion::Arc(m) => *m.planned(),
        }
    }

    fn issued(&self) -> [i32; AXES] {
        match self {
            Motion::Line(m) => *m.issued(),
            Motion::Arc(m) => m.issued(),
        }
    }
}

// ─── Planner ────────────────────────────────────────────────────────

/// Action queue generic over the stepper backend and the host event sink.
pub struct Planner<H, E, const N: usize = QUEUE_SIZE> {
    hal: H,
    events: E,
    slots: [Option<Action>; N],
    first: usize,
    cursor: usize,
    last: usize,
    locked: bool,
    fail_on_endstops: bool,
    break_on_probe: bool,
    break_predicate: BreakPredicate,
    position: Position,
    motion: Option<Motion>,
    steps_per_unit: [f64; AXES],
    feed_base: f64,
    feed_max: Option<f64>,
}

impl<H: StepperHal, E: EventSink, const N: usize> Planner<H, E, N> {
    /// Create an empty planner. It starts locked; call [`Planner::unlock`]
    /// once the hardware reports itself configured.
    pub fn new(hal: H, events: E, machine: &MachineConfig) -> Self {
        const { assert!(N >= 2, "queue needs a reserved slot plus one usable slot") };
        info!(
            backend = hal.name(),
            capacity = N - 1,
            fail_on_endstops = machine.fail_on_endstops,
            break_on_probe = machine.break_on_probe,
            "planner created"
        );
        Self {
            hal,
            events,
            slots: std::array::from_fn(|_| None),
            first: 0,
            cursor: 0,
            last: 0,
            locked: true,
            fail_on_endstops: machine.fail_on_endstops,
            break_on_probe: machine.break_on_probe,
            break_predicate: break_on_endstops,
            position: Position::default(),
            motion: None,
            steps_per_unit: machine.steps_per_unit,
            feed_base: machine.feed_base,
            feed_max: machine.feed_max,
        }
    }

    #[inline]
    const fn next(i: usize) -> usize {
        (i + 1) % N
    }

    // ── Counts ──

    /// Actions awaiting report (includes active ones).
    #[inline]
    pub const fn used_count(&self) -> usize {
        (self.last + N - self.first) % N
    }

    /// Actions awaiting or undergoing execution.
    #[inline]
    pub const fn active_count(&self) -> usize {
        (self.last + N - self.cursor) % N
    }

    /// Slots available for admission.
    #[inline]
    pub const fn free_slots(&self) -> usize {
        N - 1 - self.used_count()
    }

    /// Maximum number of actions in flight.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// No action is executing or waiting to execute.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.motion.is_none() && self.active_count() == 0
    }

    /// Slot states from `first` to `last` in execution order.
    pub fn states(&self) -> impl Iterator<Item = (ActionId, ActionState)> + '_ {
        let mut i = self.first;
        std::iter::from_fn(move || {
            while i != self.last {
                let slot = &self.slots[i];
                i = Self::next(i);
                if let Some(a) = slot {
                    return Some((a.id, a.state));
                }
            }
            None
        })
    }

    // ── Admission ──

    fn admit(&self, id: ActionId) -> Result<(), PlannerError> {
        if self.locked {
            debug!(id, "admission refused: locked");
            return Err(PlannerError::Locked);
        }
        if self.free_slots() == 0 {
            debug!(id, "admission refused: queue full");
            return Err(PlannerError::NoMem);
        }
        Ok(())
    }

    fn drop_action(&mut self, id: ActionId) -> Admission {
        debug!(id, "degenerate action dropped");
        self.events.emit(HostEvent::Dropped(id));
        Admission::Dropped
    }

    fn push(&mut self, id: ActionId, kind: ActionKind) -> Admission {
        if let Some(mut stale) = self.slots[self.last].take() {
            Self::emit_pending(&mut self.events, &mut stale);
        }
        self.slots[self.last] = Some(Action {
            id,
            state: ActionState::Queued,
            state_changed: false,
            kind,
        });
        self.last = Self::next(self.last);
        debug!(id, active = self.active_count(), "action queued");
        self.events.emit(HostEvent::Queued(id));
        self.try_start(true);
        Admission::Queued
    }

    /// Queue a straight line of `delta` units per axis.
    ///
    /// A zero delta is dropped without entering the queue. Feeds are
    /// clamped to `[feed_base, feed_max]`.
    pub fn enqueue_line(
        &mut self,
        delta: [f64; AXES],
        profile: FeedProfile,
        id: ActionId,
    ) -> Result<Admission, PlannerError> {
        self.admit(id)?;
        let plan = LinePlan::new(
            delta,
            profile.clamped(self.feed_base, self.feed_max),
            self.break_predicate,
        );
        if plan.is_zero() {
            return Ok(self.drop_action(id));
        }
        Ok(self.push(id, ActionKind::Line(plan)))
    }

    /// Queue a planar arc. An arc with identical endpoints is dropped.
    pub fn enqueue_arc(
        &mut self,
        geometry: ArcGeometry,
        profile: FeedProfile,
        id: ActionId,
    ) -> Result<Admission, PlannerError> {
        self.admit(id)?;
        if geometry.is_degenerate() {
            return Ok(self.drop_action(id));
        }
        let plan = ArcPlan::new(
            geometry,
            profile.clamped(self.feed_base, self.feed_max),
            self.break_predicate,
        );
        Ok(self.push(id, ActionKind::Arc(plan)))
    }

    /// Queue a tool switch.
    pub fn enqueue_tool(
        &mut self,
        tool: u8,
        on: bool,
        id: ActionId,
    ) -> Result<Admission, PlannerError> {
        self.admit(id)?;
        Ok(self.push(id, ActionKind::Tool(ToolPlan { id: tool, on })))
    }

    // ── Lock ──

    /// Halt the system. Idempotent.
    pub fn lock(&mut self) {
        if let Some(motion) = self.motion.take() {
            self.position.commit(&motion.issued());
            if let Some(action) = self.slots[self.cursor].as_mut() {
                action.state = ActionState::Failed;
                action.state_changed = true;
                warn!(id = action.id, "in-flight action aborted by lock");
            }
            self.cursor = Self::next(self.cursor);
        }
        let mut i = self.cursor;
        while i != self.last {
            if let Some(action) = self.slots[i].take() {
                debug!(id = action.id, "pending action discarded");
            }
            i = Self::next(i);
        }
        self.last = self.cursor;
        self.first = self.cursor;
        if !self.locked {
            warn!("planner locked");
        }
        self.locked = true;
        self.hal.halt();
    }

    /// Leave the locked state. Refused (returns `false`) until the
    /// hardware reports itself configured.
    pub fn unlock(&mut self) -> bool {
        if !self.hal.is_configured() {
            warn!("unlock refused: hardware not configured");
            return false;
        }
        if self.locked {
            info!("planner unlocked");
        }
        self.locked = false;
        true
    }

    #[inline]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    // ── Policies ──

    pub fn set_fail_on_endstops(&mut self, enabled: bool) {
        debug!(enabled, "fail on endstops");
        self.fail_on_endstops = enabled;
    }

    pub fn set_break_on_probe(&mut self, enabled: bool) {
        debug!(enabled, "break on probe");
        self.break_on_probe = enabled;
    }

    #[inline]
    pub const fn fail_on_endstops(&self) -> bool {
        self.fail_on_endstops
    }

    #[inline]
    pub const fn break_on_probe(&self) -> bool {
        self.break_on_probe
    }

    /// Predicate attached to step-generating actions admitted from now on.
    pub fn set_break_predicate(&mut self, predicate: BreakPredicate) {
        self.break_predicate = predicate;
    }

    // ── Background pass ──

    /// Pre-calculate every `Queued` action in the active window.
    pub fn pre_calculate(&mut self) {
        let mut i = self.cursor;
        while i != self.last {
            if let Some(action) = self.slots[i].as_mut() {
                if action.state == ActionState::Queued {
                    match &mut action.kind {
                        ActionKind::Line(plan) => plan.pre_calculate(&self.steps_per_unit),
                        ActionKind::Arc(plan) => plan.pre_calculate(&self.steps_per_unit),
                        ActionKind::Tool(_) => {}
                    }
                    action.state = ActionState::Prepared;
                    action.state_changed = true;
                    trace!(id = action.id, "action prepared");
                }
            }
            i = Self::next(i);
        }
    }

    /// Emit pending lifecycle events and recycle reported terminal slots.
    ///
    /// Slots outside the window (left behind by a lock) are visited first,
    /// oldest first, then the window from `first`.
    pub fn report_states(&mut self) {
        let mut i = self.last;
        for _ in 0..N - self.used_count() {
            if let Some(mut stale) = self.slots[i].take() {
                Self::emit_pending(&mut self.events, &mut stale);
            }
            i = Self::next(i);
        }

        let mut i = self.first;
        while i != self.last {
            let Some(action) = self.slots[i].as_mut() else {
                if i == self.first {
                    self.first = Self::next(self.first);
                }
                i = Self::next(i);
                continue;
            };
            Self::emit_pending(&mut self.events, action);
            if action.state.is_terminal() && i == self.first {
                self.slots[i] = None;
                self.first = Self::next(self.first);
            }
            i = Self::next(i);
        }
    }

    fn emit_pending(events: &mut E, action: &mut Action) {
        if !action.state_changed {
            return;
        }
        action.state_changed = false;
        match action.state {
            ActionState::Started => events.emit(HostEvent::Started(action.id)),
            ActionState::Finished => events.emit(HostEvent::Completed(action.id)),
            ActionState::Failed => events.emit(HostEvent::Failed(action.id)),
            ActionState::Queued | ActionState::Prepared => {}
        }
    }

    // ── Execution ──

    /// Start the action at `cursor` if nothing is executing. Actions that
    /// complete synchronously are finished in place and the next one is
    /// tried, so the queue never stalls on a zero-work action.
    ///
    /// With `prepare_inline` off (tick context) a `Queued` action is left
    /// for the background pass.
    fn try_start(&mut self, prepare_inline: bool) {
        while self.motion.is_none() && !self.locked && self.active_count() > 0 {
            let Some(action) = self.slots[self.cursor].as_mut() else {
                warn!(slot = self.cursor, "empty slot in active window skipped");
                self.cursor = Self::next(self.cursor);
                continue;
            };
            if !prepare_inline && action.state == ActionState::Queued {
                trace!(id = action.id, "next action awaits pre-calculation");
                return;
            }
            action.state = ActionState::Started;
            action.state_changed = true;
            let id = action.id;

            let dispatch = match &mut action.kind {
                ActionKind::Line(plan) => {
                    match LineMover::start(
                        plan,
                        &self.steps_per_unit,
                        &mut self.hal,
                        &mut self.position,
                    ) {
                        Some(mover) => {
                            self.motion = Some(Motion::Line(mover));
                            Dispatch::Running
                        }
                        None => Dispatch::Advance,
                    }
                }
                ActionKind::Arc(plan) => {
                    match ArcMover::start(
                        plan,
                        &self.steps_per_unit,
                        &mut self.hal,
                        &mut self.position,
                    ) {
                        Some(mover) => {
                            self.motion = Some(Motion::Arc(mover));
                            Dispatch::Running
                        }
                        None => Dispatch::Advance,
                    }
                }
                ActionKind::Tool(plan) => tool_action(plan, &mut self.hal),
            };

            match dispatch {
                Dispatch::Running => {
                    debug!(id, "action started");
                    self.hal.line_started();
                    return;
                }
                Dispatch::Advance => {
                    action.state = ActionState::Finished;
                    debug!(id, "action finished without steps");
                    self.cursor = Self::next(self.cursor);
                }
            }
        }
    }

    /// Normal completion: commit the planned displacement and start the
    /// next action.
    fn on_step_finished(&mut self) {
        let Some(motion) = self.motion.take() else {
            return;
        };
        self.position.commit(&motion.planned());
        if let Some(action) = self.slots[self.cursor].as_mut() {
            action.state = ActionState::Finished;
            action.state_changed = true;
            debug!(id = action.id, "action finished");
        }
        self.hal.line_finished();
        self.cursor = Self::next(self.cursor);
        if !self.locked {
            self.try_start(false);
        }
    }

    /// An endstop or the probe tripped during motion.
    ///
    /// With the fail policy off this is a normal completion (homing runs
    /// into a switch on purpose). Otherwise the action fails with only the
    /// issued steps committed and the planner locks.
    pub fn on_endstop_touched(&mut self) {
        if self.motion.is_none() {
            return;
        }
        if !self.fail_on_endstops {
            debug!("endstop touched, completing action");
            self.on_step_finished();
            return;
        }
        let Some(motion) = self.motion.take() else {
            return;
        };
        self.position.commit(&motion.issued());
        let endstops = self.hal.read_endstops();
        if let Some(action) = self.slots[self.cursor].as_mut() {
            action.state = ActionState::Failed;
            action.state_changed = true;
            warn!(id = action.id, %endstops, "endstop touched, action failed");
        }
        self.hal.line_error();
        self.cursor = Self::next(self.cursor);
        self.lock();
    }

    /// Advance the executing action by one step.
    ///
    /// Returns the delay until the next tick, `Finished`/`Break` when the
    /// action ended this tick (the next one is started if it was prepared),
    /// `Pending` while the next action awaits pre-calculation, or `Idle`.
    pub fn tick(&mut self) -> Tick {
        if self.motion.is_none() {
            self.try_start(false);
            if self.motion.is_none() {
                return if self.locked || self.active_count() == 0 {
                    Tick::Idle
                } else {
                    Tick::Pending
                };
            }
        }
        let probe_armed = self.break_on_probe;
        let outcome = match self.motion.as_mut() {
            None => return Tick::Idle,
            Some(Motion::Line(mover)) => mover.tick(&mut self.hal, probe_armed),
            Some(Motion::Arc(mover)) => mover.tick(&mut self.hal, &mut self.position, probe_armed),
        };
        match outcome {
            Tick::Finished => self.on_step_finished(),
            Tick::Break => self.on_endstop_touched(),
            Tick::Delay(_) | Tick::Pending | Tick::Idle => {}
        }
        outcome
    }

    // ── Position & status ──

    #[inline]
    pub const fn position(&self) -> &Position {
        &self.position
    }

    /// Overwrite the absolute position. Refused while motion is pending.
    pub fn set_position(&mut self, pos: [i32; AXES]) -> bool {
        if !self.is_idle() {
            warn!("set position refused: motion pending");
            return false;
        }
        self.position.set(pos);
        info!(x = pos[0], y = pos[1], z = pos[2], "position set");
        true
    }

    /// Clear per-axis enable/direction flags.
    pub fn reset_flags(&mut self) {
        self.position.reset_flags();
    }

    /// Live endstop and probe snapshot.
    pub fn read_endstops(&self) -> Endstops {
        self.hal.read_endstops()
    }

    // ── Accessors ──

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }
}

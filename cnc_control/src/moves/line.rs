//! Straight-line segments.
//!
//! `LinePlan` is the queued payload. `pre_calculate` turns unit deltas into
//! step counts and ramp lengths off the RT path; `LineMover` is the RT
//! state that `tick` advances one step at a time.

use tracing::trace;

use cnc_common::consts::AXES;
use cnc_common::hal::StepperHal;

use super::dda::{Dda, dominant_axis};
use super::ramp::{Ramp, ramp_steps};
use super::{BreakPredicate, FeedProfile, Position, Tick, drive_directions};

/// Queued line payload.
#[derive(Debug, Clone, Copy)]
pub struct LinePlan {
    /// Signed displacement per axis [units].
    pub delta: [f64; AXES],
    pub profile: FeedProfile,
    pub check_break: BreakPredicate,

    // ── Pre-calculated ──
    /// Euclidean length [units].
    pub len: f64,
    /// Signed step count per axis.
    pub steps_by_axis: [i32; AXES],
    /// Axis with the largest step count.
    pub dominant: usize,
    /// Step count of the dominant axis.
    pub steps: u32,
    pub acc_steps: u32,
    pub dec_steps: u32,
    prepared: bool,
}

impl LinePlan {
    pub fn new(delta: [f64; AXES], profile: FeedProfile, check_break: BreakPredicate) -> Self {
        Self {
            delta,
            profile,
            check_break,
            len: 0.0,
            steps_by_axis: [0; AXES],
            dominant: 0,
            steps: 0,
            acc_steps: 0,
            dec_steps: 0,
            prepared: false,
        }
    }

    /// Whether the requested displacement is zero on every axis.
    pub fn is_zero(&self) -> bool {
        self.delta.iter().all(|d| *d == 0.0)
    }

    #[inline]
    pub const fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Average distance covered per dominant-axis step.
    pub fn step_len(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.len / f64::from(self.steps)
        }
    }

    /// Compute length, step counts and ramp lengths. Idempotent.
    pub fn pre_calculate(&mut self, steps_per_unit: &[f64; AXES]) {
        if self.prepared {
            return;
        }
        self.len = self.delta.iter().map(|d| d * d).sum::<f64>().sqrt();
        for i in 0..AXES {
            self.steps_by_axis[i] = (self.delta[i] * steps_per_unit[i]).round() as i32;
        }
        self.dominant = dominant_axis(&self.steps_by_axis);
        self.steps = self.steps_by_axis[self.dominant].unsigned_abs();
        let (acc, dec) = ramp_steps(&self.profile, self.steps, self.step_len());
        self.acc_steps = acc;
        self.dec_steps = dec;
        self.prepared = true;
        trace!(
            len = self.len,
            steps = self.steps,
            acc = acc,
            dec = dec,
            "line pre-calculated"
        );
    }
}

/// RT state of the line currently being executed.
#[derive(Debug, Clone, Copy)]
pub struct LineMover {
    dda: Dda,
    ramp: Ramp,
    check_break: BreakPredicate,
}

impl LineMover {
    /// Begin executing `plan`: sets all direction outputs once.
    ///
    /// Returns `None` when the line rounds to zero steps, meaning the caller
    /// should treat it as completed immediately.
    pub fn start<H: StepperHal>(
        plan: &mut LinePlan,
        steps_per_unit: &[f64; AXES],
        hal: &mut H,
        position: &mut Position,
    ) -> Option<Self> {
        plan.pre_calculate(steps_per_unit);
        if plan.steps == 0 {
            return None;
        }
        drive_directions(hal, position, &plan.steps_by_axis);
        Some(Self {
            dda: Dda::new(plan.steps_by_axis),
            ramp: Ramp::new(
                &plan.profile,
                plan.step_len(),
                plan.steps,
                plan.acc_steps,
                plan.dec_steps,
            ),
            check_break: plan.check_break,
        })
    }

    /// Requested per-axis step displacement.
    #[inline]
    pub const fn planned(&self) -> &[i32; AXES] {
        self.dda.delta()
    }

    /// Steps physically issued so far.
    #[inline]
    pub const fn issued(&self) -> &[i32; AXES] {
        self.dda.issued()
    }

    /// One RT tick.
    pub fn tick<H: StepperHal>(&mut self, hal: &mut H, probe_armed: bool) -> Tick {
        if self.dda.is_done() {
            return Tick::Finished;
        }
        let endstops = hal.read_endstops();
        if (self.check_break)(self.dda.delta(), &endstops, probe_armed) {
            return Tick::Break;
        }
        let step = self.dda.step_index();
        self.dda.advance(hal);
        Tick::Delay(self.ramp.delay(step))
    }
}

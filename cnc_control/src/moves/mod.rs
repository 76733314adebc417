//! Step generation: feed/delay math, machine position, and the per-kind
//! movers (line, arc, tool).
//!
//! ## Delay Units
//!
//! Every delay produced here is in hundredths of a second per step
//! (`step_len * 60 * 100 / feed` with feed in units/min). The tick source
//! converts delays to wall time with the configured `tick_base_us`.
//!
//! ## Two-Phase Contract
//!
//! Each step-generating kind has an off-RT `pre_calculate` and an RT
//! `tick`. `pre_calculate` is idempotent. Only the command context may
//! start an action that was not yet pre-calculated; the tick path waits
//! for the background pass instead.

pub mod arc;
pub mod dda;
pub mod line;
pub mod ramp;
pub mod tool;

use bitflags::bitflags;

use cnc_common::axis::{Axis, Endstops};
use cnc_common::consts::AXES;
use cnc_common::hal::StepperHal;

// ─── Feed / Delay Math ──────────────────────────────────────────────

/// Per-step delay for a feed [units/min] and a step length [units].
///
/// Feed is clamped to a minimum of 1 so the result is always finite.
#[inline]
pub fn feed_to_delay(feed: f64, step_len: f64) -> f64 {
    step_len * 60.0 * 100.0 / feed.max(1.0)
}

/// Feed after one step that took `delay` under acceleration `acc`
/// [units/s²]. Negative `acc` decelerates.
#[inline]
pub fn accelerate(feed: f64, acc: f64, delay: f64) -> f64 {
    feed + acc * 60.0 * delay / 100.0
}

/// Number of steps needed to change feed from `feed0` to `feed1` under
/// acceleration `acc`, for an average step length `step_len`.
///
/// Returns 0 when no ramp is possible (zero acceleration or step length).
pub fn acceleration_steps(feed0: f64, feed1: f64, acc: f64, step_len: f64) -> u32 {
    if acc <= 0.0 || step_len <= 0.0 {
        return 0;
    }
    let v0 = feed0 / 60.0;
    let v1 = feed1 / 60.0;
    let dist = (v1 * v1 - v0 * v0).abs() / (2.0 * acc);
    (dist / step_len).ceil() as u32
}

// ─── Feed Profile ───────────────────────────────────────────────────

/// Requested velocity shape of one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedProfile {
    /// Cruise feed [units/min].
    pub feed: f64,
    /// Entry feed [units/min].
    pub feed_in: f64,
    /// Exit feed [units/min].
    pub feed_out: f64,
    /// Acceleration limit [units/s²].
    pub acceleration: f64,
}

impl FeedProfile {
    /// Constant-feed profile without ramps.
    pub const fn constant(feed: f64) -> Self {
        Self {
            feed,
            feed_in: feed,
            feed_out: feed,
            acceleration: 0.0,
        }
    }

    /// Clamp all three feeds into `[min, max]`.
    pub fn clamped(self, min: f64, max: Option<f64>) -> Self {
        let clamp = |f: f64| {
            let f = if f.is_finite() { f.max(min) } else { min };
            match max {
                Some(m) => f.min(m),
                None => f,
            }
        };
        Self {
            feed: clamp(self.feed),
            feed_in: clamp(self.feed_in),
            feed_out: clamp(self.feed_out),
            acceleration: self.acceleration.max(0.0),
        }
    }
}

// ─── Position ───────────────────────────────────────────────────────

bitflags! {
    /// Per-axis output state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StepFlags: u8 {
        /// Driver enabled.
        const ENABLED = 0x01;
        /// Direction output set to forward.
        const FORWARD = 0x02;
    }
}

/// Absolute machine location in steps.
///
/// Single source of truth for where the machine is. Only the movers update
/// it, once per step-generating action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub pos: [i32; AXES],
    pub flags: [StepFlags; AXES],
}

impl Position {
    /// Add a per-axis step displacement.
    #[inline]
    pub fn commit(&mut self, steps: &[i32; AXES]) {
        for (p, s) in self.pos.iter_mut().zip(steps) {
            *p = p.wrapping_add(*s);
        }
    }

    /// Overwrite the absolute position.
    pub fn set(&mut self, pos: [i32; AXES]) {
        self.pos = pos;
    }

    /// Clear enable/direction flags.
    pub fn reset_flags(&mut self) {
        self.flags = [StepFlags::empty(); AXES];
    }

    /// Record the direction output driven for an axis.
    #[inline]
    pub fn set_direction(&mut self, axis: Axis, forward: bool) {
        let f = &mut self.flags[axis.index()];
        f.insert(StepFlags::ENABLED);
        f.set(StepFlags::FORWARD, forward);
    }
}

/// Drive direction outputs for a signed step delta and mirror them into
/// the position flags. Axes with zero delta keep their previous direction.
pub(crate) fn drive_directions<H: StepperHal>(
    hal: &mut H,
    position: &mut Position,
    delta: &[i32; AXES],
) {
    for axis in Axis::ALL {
        let d = delta[axis.index()];
        if d != 0 {
            let forward = d > 0;
            hal.set_direction(axis, forward);
            position.set_direction(axis, forward);
        }
    }
}

// ─── Break Predicate ────────────────────────────────────────────────

/// Per-tick abort test: `(signed step delta, endstops, probe armed)`.
pub type BreakPredicate = fn(&[i32; AXES], &Endstops, bool) -> bool;

/// Default break predicate.
///
/// Limit switches sit at the negative end of each axis and only trip while
/// that axis moves toward them. The probe trips while Z is not retracting.
pub fn break_on_endstops(delta: &[i32; AXES], endstops: &Endstops, probe_armed: bool) -> bool {
    for axis in Axis::ALL {
        if endstops.stop(axis) && delta[axis.index()] < 0 {
            return true;
        }
    }
    probe_armed && endstops.probe && delta[Axis::Z.index()] >= 0
}

/// Break predicate that never trips.
pub fn never_break(_delta: &[i32; AXES], _endstops: &Endstops, _probe_armed: bool) -> bool {
    false
}

// ─── Outcomes ───────────────────────────────────────────────────────

/// Result of dispatching an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Motion started; ticks will follow.
    Running,
    /// Completed synchronously with no physical steps; move on at once.
    Advance,
}

/// Result of one tick of a mover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// A step was issued; schedule the next tick after this delay.
    Delay(f64),
    /// All steps issued.
    Finished,
    /// The break predicate tripped; no step was issued this tick.
    Break,
    /// The next action waits for the background pass to pre-calculate it.
    Pending,
    /// Nothing is executing.
    Idle,
}

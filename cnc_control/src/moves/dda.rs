//! Integer digital differential analyzer (Bresenham) for one straight
//! step segment.
//!
//! The dominant axis (largest absolute step count) pulses on every tick.
//! Each other axis accumulates its absolute delta into an error term and
//! pulses whenever `2 * error >= total_steps`, then subtracts
//! `total_steps`. Error terms start at `-(total_steps / 2)`, which makes the
//! per-axis pulse totals land exactly on the requested deltas.

use cnc_common::axis::Axis;
use cnc_common::consts::AXES;
use cnc_common::hal::StepperHal;

/// Bresenham state for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dda {
    delta: [i32; AXES],
    dominant: usize,
    steps: u32,
    step: u32,
    err: [i64; AXES],
    issued: [i32; AXES],
}

/// Index of the axis with the largest absolute step count (lowest index
/// wins ties).
pub fn dominant_axis(delta: &[i32; AXES]) -> usize {
    let mut best = 0;
    for i in 1..AXES {
        if delta[i].unsigned_abs() > delta[best].unsigned_abs() {
            best = i;
        }
    }
    best
}

impl Dda {
    pub fn new(delta: [i32; AXES]) -> Self {
        let dominant = dominant_axis(&delta);
        let steps = delta[dominant].unsigned_abs();
        let e0 = -(i64::from(steps) / 2);
        Self {
            delta,
            dominant,
            steps,
            step: 0,
            err: [e0; AXES],
            issued: [0; AXES],
        }
    }

    #[inline]
    pub const fn delta(&self) -> &[i32; AXES] {
        &self.delta
    }

    #[inline]
    pub const fn dominant(&self) -> usize {
        self.dominant
    }

    /// Total number of ticks (dominant-axis steps).
    #[inline]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Ticks already issued.
    #[inline]
    pub const fn step_index(&self) -> u32 {
        self.step
    }

    #[inline]
    pub const fn is_done(&self) -> bool {
        self.step >= self.steps
    }

    /// Signed steps issued so far per axis.
    #[inline]
    pub const fn issued(&self) -> &[i32; AXES] {
        &self.issued
    }

    /// Issue the pulses of one tick. Returns `false` (and does nothing)
    /// once all ticks are spent.
    pub fn advance<H: StepperHal>(&mut self, hal: &mut H) -> bool {
        if self.is_done() {
            return false;
        }
        let total = i64::from(self.steps);
        for (i, axis) in Axis::ALL.into_iter().enumerate() {
            let d = self.delta[i];
            let pulse = if i == self.dominant {
                true
            } else {
                self.err[i] += i64::from(d.unsigned_abs());
                if 2 * self.err[i] >= total {
                    self.err[i] -= total;
                    true
                } else {
                    false
                }
            };
            if pulse {
                hal.pulse_step(axis);
                self.issued[i] += d.signum();
            }
        }
        self.step += 1;
        true
    }
}

//! Planar arcs.
//!
//! The queue only relies on the two-phase contract: an idempotent
//! `pre_calculate` that sets `ready`, and a `tick` with the same outcomes as
//! a line. The built-in interpolator reads `height` as the sagitta (distance
//! from the chord midpoint to the arc), splits the arc into at most
//! `ARC_SEGMENTS` chords and steps each chord with the line DDA under a
//! single velocity ramp. The shape coefficients `a`/`b` are carried
//! untouched for interpolators that need them.

use std::f64::consts::{PI, TAU};

use static_assertions::const_assert;
use tracing::trace;

use cnc_common::axis::Axis;
use cnc_common::consts::{ARC_SEGMENTS, AXES};
use cnc_common::hal::StepperHal;

use super::dda::Dda;
use super::ramp::{Ramp, ramp_steps};
use super::{BreakPredicate, FeedProfile, Position, Tick, drive_directions};

const ARC_POINTS: usize = ARC_SEGMENTS + 1;
const_assert!(ARC_POINTS >= 2);

/// Largest angle one chord may span.
const MAX_CHORD_ANGLE: f64 = TAU / ARC_SEGMENTS as f64;

/// Heights below this are treated as a straight chord.
const FLAT_EPSILON: f64 = 1e-9;

/// Plane an arc lies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArcPlane {
    #[default]
    XY,
    YZ,
    ZX,
}

impl ArcPlane {
    /// The (first, second) axes spanning the plane.
    pub const fn axes(self) -> (Axis, Axis) {
        match self {
            ArcPlane::XY => (Axis::X, Axis::Y),
            ArcPlane::YZ => (Axis::Y, Axis::Z),
            ArcPlane::ZX => (Axis::Z, Axis::X),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Host-supplied arc description. Coordinates are in the plane's
/// (first, second) axes, in units, relative to the position where the
/// arc begins; the displacement is `end - start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    pub start: [f64; 2],
    pub end: [f64; 2],
    /// Sagitta [units].
    pub height: f64,
    pub a: f64,
    pub b: f64,
    /// Arc length [units]; `<= 0` derives it from the geometry.
    pub len: f64,
    pub plane: ArcPlane,
    pub rotation: Rotation,
}

impl ArcGeometry {
    /// Identical endpoints: nothing to move.
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

/// Queued arc payload.
#[derive(Debug, Clone)]
pub struct ArcPlan {
    pub geometry: ArcGeometry,
    pub profile: FeedProfile,
    pub check_break: BreakPredicate,
    /// Set once pre-calculated; gates execution.
    pub ready: bool,

    // ── Pre-calculated ──
    /// Chord vertices in steps, relative to the arc start. First is origin.
    pub points: heapless::Vec<[i32; 2], ARC_POINTS>,
    /// Resolved arc length [units].
    pub len: f64,
    /// Sum of dominant-axis steps over all chords.
    pub steps: u32,
    pub acc_steps: u32,
    pub dec_steps: u32,
}

impl ArcPlan {
    pub fn new(geometry: ArcGeometry, profile: FeedProfile, check_break: BreakPredicate) -> Self {
        Self {
            geometry,
            profile,
            check_break,
            ready: false,
            points: heapless::Vec::new(),
            len: 0.0,
            steps: 0,
            acc_steps: 0,
            dec_steps: 0,
        }
    }

    pub fn step_len(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.len / f64::from(self.steps)
        }
    }

    /// Split the arc into chords and size the ramp. Idempotent.
    pub fn pre_calculate(&mut self, steps_per_unit: &[f64; AXES]) {
        if self.ready {
            return;
        }
        let g = self.geometry;
        let (u, v) = g.plane.axes();
        let spu = [steps_per_unit[u.index()], steps_per_unit[v.index()]];
        let to_steps = |p: [f64; 2]| -> [i32; 2] {
            [
                ((p[0] - g.start[0]) * spu[0]).round() as i32,
                ((p[1] - g.start[1]) * spu[1]).round() as i32,
            ]
        };

        let chord = [g.end[0] - g.start[0], g.end[1] - g.start[1]];
        let chord_len = chord[0].hypot(chord[1]);
        let h = g.height.abs();

        self.points.clear();
        let _ = self.points.push([0, 0]);

        let geometric_len = if h < FLAT_EPSILON || chord_len == 0.0 {
            let _ = self.points.push(to_steps(g.end));
            chord_len
        } else {
            let side = match g.rotation {
                Rotation::CounterClockwise => 1.0,
                Rotation::Clockwise => -1.0,
            };
            let normal = [-chord[1] / chord_len * side, chord[0] / chord_len * side];
            let mid = [(g.start[0] + g.end[0]) / 2.0, (g.start[1] + g.end[1]) / 2.0];
            let r = (chord_len * chord_len / 4.0 + h * h) / (2.0 * h);
            let center = [mid[0] + normal[0] * (r - h), mid[1] + normal[1] * (r - h)];

            let t0 = (g.start[1] - center[1]).atan2(g.start[0] - center[0]);
            let t1 = (g.end[1] - center[1]).atan2(g.end[0] - center[0]);
            let mut sweep = t1 - t0;
            match g.rotation {
                Rotation::CounterClockwise => {
                    while sweep <= 0.0 {
                        sweep += TAU;
                    }
                }
                Rotation::Clockwise => {
                    while sweep >= 0.0 {
                        sweep -= TAU;
                    }
                }
            }

            let segments = ((sweep.abs() / MAX_CHORD_ANGLE).ceil() as usize).clamp(1, ARC_SEGMENTS);
            for k in 1..segments {
                let t = t0 + sweep * k as f64 / segments as f64;
                let p = [center[0] + r * t.cos(), center[1] + r * t.sin()];
                let _ = self.points.push(to_steps(p));
            }
            let _ = self.points.push(to_steps(g.end));
            r * sweep.abs().min(2.0 * PI)
        };

        self.len = if g.len > 0.0 { g.len } else { geometric_len };
        self.steps = self
            .points
            .windows(2)
            .map(|w| (w[1][0] - w[0][0]).unsigned_abs().max((w[1][1] - w[0][1]).unsigned_abs()))
            .sum();
        let (acc, dec) = ramp_steps(&self.profile, self.steps, self.step_len());
        self.acc_steps = acc;
        self.dec_steps = dec;
        self.ready = true;
        trace!(
            chords = self.points.len() - 1,
            len = self.len,
            steps = self.steps,
            "arc pre-calculated"
        );
    }

    /// Total displacement in steps on the three axes.
    pub fn displacement(&self) -> [i32; AXES] {
        let (u, v) = self.geometry.plane.axes();
        let mut d = [0; AXES];
        if let Some(last) = self.points.last() {
            d[u.index()] = last[0];
            d[v.index()] = last[1];
        }
        d
    }
}

/// RT state of the arc currently being executed.
#[derive(Debug, Clone)]
pub struct ArcMover {
    plane: ArcPlane,
    points: heapless::Vec<[i32; 2], ARC_POINTS>,
    chord: usize,
    dda: Dda,
    ramp: Ramp,
    step: u32,
    done: [i32; AXES],
    planned: [i32; AXES],
    check_break: BreakPredicate,
}

impl ArcMover {
    /// Begin executing `plan`. Returns `None` when the arc rounds to zero
    /// steps.
    pub fn start<H: StepperHal>(
        plan: &mut ArcPlan,
        steps_per_unit: &[f64; AXES],
        hal: &mut H,
        position: &mut Position,
    ) -> Option<Self> {
        plan.pre_calculate(steps_per_unit);
        if plan.steps == 0 {
            return None;
        }
        let mut mover = Self {
            plane: plan.geometry.plane,
            points: plan.points.clone(),
            chord: 0,
            dda: Dda::new([0; AXES]),
            ramp: Ramp::new(
                &plan.profile,
                plan.step_len(),
                plan.steps,
                plan.acc_steps,
                plan.dec_steps,
            ),
            step: 0,
            done: [0; AXES],
            planned: plan.displacement(),
            check_break: plan.check_break,
        };
        mover.next_chord(hal, position);
        Some(mover)
    }

    #[inline]
    pub const fn planned(&self) -> &[i32; AXES] {
        &self.planned
    }

    /// Steps physically issued so far.
    pub fn issued(&self) -> [i32; AXES] {
        let cur = self.dda.issued();
        [
            self.done[0] + cur[0],
            self.done[1] + cur[1],
            self.done[2] + cur[2],
        ]
    }

    fn chord_delta(&self, k: usize) -> [i32; AXES] {
        let (u, v) = self.plane.axes();
        let a = self.points[k - 1];
        let b = self.points[k];
        let mut d = [0; AXES];
        d[u.index()] = b[0] - a[0];
        d[v.index()] = b[1] - a[1];
        d
    }

    /// Retire the current chord and load the next non-empty one.
    fn next_chord<H: StepperHal>(&mut self, hal: &mut H, position: &mut Position) -> bool {
        let issued = *self.dda.issued();
        for i in 0..AXES {
            self.done[i] += issued[i];
        }
        self.dda = Dda::new([0; AXES]);
        while self.chord + 1 < self.points.len() {
            self.chord += 1;
            let d = self.chord_delta(self.chord);
            if d != [0; AXES] {
                drive_directions(hal, position, &d);
                self.dda = Dda::new(d);
                return true;
            }
        }
        false
    }

    /// One RT tick. Direction outputs change between chords.
    pub fn tick<H: StepperHal>(
        &mut self,
        hal: &mut H,
        position: &mut Position,
        probe_armed: bool,
    ) -> Tick {
        if self.dda.is_done() && !self.next_chord(hal, position) {
            return Tick::Finished;
        }
        let endstops = hal.read_endstops();
        if (self.check_break)(self.dda.delta(), &endstops, probe_armed) {
            return Tick::Break;
        }
        self.dda.advance(hal);
        let step = self.step;
        self.step += 1;
        Tick::Delay(self.ramp.delay(step))
    }
}

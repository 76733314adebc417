//! Simulated stepper backend.
//!
//! `SimulatedSteppers` implements `StepperHal` in software for development
//! and testing without physical hardware. It counts pulses, tracks a
//! virtual position from the direction outputs and lets callers force
//! endstop inputs or place soft limit switches at a step position.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use cnc_common::axis::{Axis, Endstops};
use cnc_common::consts::AXES;
use cnc_common::hal::StepperHal;

/// Software stepper backend.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSteppers {
    configured: bool,
    direction: [Option<bool>; AXES],
    pulses: [u64; AXES],
    position: [i32; AXES],
    /// Forced switch inputs.
    forced: Endstops,
    /// Limit switch positions; the stop reads closed at or below the limit.
    min_limits: [Option<i32>; AXES],
    tools: BTreeMap<u8, bool>,
    lines_started: u32,
    lines_finished: u32,
    line_errors: u32,
    halts: u32,
}

impl SimulatedSteppers {
    /// A backend that reports itself configured.
    pub fn new() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }

    /// A backend whose hardware initialization has not completed.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    pub fn set_configured(&mut self, configured: bool) {
        self.configured = configured;
    }

    /// Place a limit switch at `limit` steps on `axis`.
    pub fn with_min_limit(mut self, axis: Axis, limit: i32) -> Self {
        self.min_limits[axis.index()] = Some(limit);
        self
    }

    /// Force a limit switch input.
    pub fn set_endstop(&mut self, axis: Axis, closed: bool) {
        self.forced.set_stop(axis, closed);
    }

    /// Force the probe input.
    pub fn set_probe(&mut self, closed: bool) {
        self.forced.probe = closed;
    }

    /// Last direction driven on an axis, `None` if never driven.
    pub fn direction(&self, axis: Axis) -> Option<bool> {
        self.direction[axis.index()]
    }

    /// Total pulses issued per axis regardless of direction.
    pub fn pulse_counts(&self) -> [u64; AXES] {
        self.pulses
    }

    /// Virtual step position integrated from pulses and directions.
    pub fn position(&self) -> [i32; AXES] {
        self.position
    }

    pub fn tool(&self, id: u8) -> Option<bool> {
        self.tools.get(&id).copied()
    }

    pub fn lines_started(&self) -> u32 {
        self.lines_started
    }

    pub fn lines_finished(&self) -> u32 {
        self.lines_finished
    }

    pub fn line_errors(&self) -> u32 {
        self.line_errors
    }

    pub fn halts(&self) -> u32 {
        self.halts
    }
}

impl StepperHal for SimulatedSteppers {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn set_direction(&mut self, axis: Axis, forward: bool) {
        self.direction[axis.index()] = Some(forward);
    }

    fn pulse_step(&mut self, axis: Axis) {
        let i = axis.index();
        self.pulses[i] += 1;
        match self.direction[i] {
            Some(true) => self.position[i] += 1,
            Some(false) => self.position[i] -= 1,
            None => warn!(%axis, "step pulse with no direction set"),
        }
    }

    fn read_endstops(&self) -> Endstops {
        let mut limits = Endstops::default();
        for axis in Axis::ALL {
            if let Some(limit) = self.min_limits[axis.index()] {
                limits.set_stop(axis, self.position[axis.index()] <= limit);
            }
        }
        limits.merge(self.forced)
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn set_tool(&mut self, tool: u8, on: bool) {
        self.tools.insert(tool, on);
    }

    fn line_started(&mut self) {
        self.lines_started += 1;
    }

    fn line_finished(&mut self) {
        self.lines_finished += 1;
    }

    fn line_error(&mut self) {
        self.line_errors += 1;
        debug!("simulated line error");
    }

    fn halt(&mut self) {
        self.halts += 1;
        debug!("simulated halt");
    }
}

//! Hardware capability trait.
//!
//! This module defines `StepperHal`, the interface every stepper backend
//! (GPIO bit-banging, timer peripherals, simulation) implements. The motion
//! core is generic over this trait and never names a concrete driver.
//!
//! # Call Contexts
//!
//! | Method | Called from | RT Constraint |
//! |--------|-------------|---------------|
//! | `set_direction()` | tick / dispatch | **HARD** |
//! | `pulse_step()` | tick | **HARD** |
//! | `read_endstops()` | tick | **HARD** |
//! | `is_configured()` | command context | None |
//! | `set_tool()` | dispatch | **HARD** |
//! | hooks (`line_*`, `halt`) | tick / command | **HARD** |
//!
//! None of these may block or allocate.

use crate::axis::{Axis, Endstops};

/// Capability set supplied by a stepper/GPIO backend.
pub trait StepperHal {
    /// Returns the backend's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Drive the direction output of one axis.
    fn set_direction(&mut self, axis: Axis, forward: bool);

    /// Emit one step pulse on one axis.
    fn pulse_step(&mut self, axis: Axis);

    /// Sample limit switches and probe.
    fn read_endstops(&self) -> Endstops;

    /// Whether hardware initialization has completed.
    ///
    /// The planner refuses to unlock until this returns `true`.
    fn is_configured(&self) -> bool;

    /// Switch a tool output.
    fn set_tool(&mut self, tool: u8, on: bool);

    /// A step-generating action started driving the motors.
    fn line_started(&mut self) {}

    /// A step-generating action completed.
    fn line_finished(&mut self) {}

    /// A step-generating action aborted on an endstop fault.
    fn line_error(&mut self) {}

    /// All motion was abandoned (planner lock).
    fn halt(&mut self) {}
}

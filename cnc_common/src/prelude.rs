//! Prelude module for common re-exports.
//!
//! ```rust
//! use cnc_common::prelude::*;
//! ```

// ─── Axes & Inputs ──────────────────────────────────────────────────
pub use crate::axis::{Axis, Endstops};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::hal::StepperHal;

// ─── Host Events ────────────────────────────────────────────────────
pub use crate::events::{ActionId, EventBatch, EventBuffer, EventLog, EventSink, HostEvent};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{Admission, PlannerError};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, ControllerConfig, LogLevel, MachineConfig, SharedConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{AXES, QUEUE_SIZE};

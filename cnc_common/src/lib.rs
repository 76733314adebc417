//! CNC Common Library
//!
//! Shared vocabulary for the motion controller workspace: axis and endstop
//! types, the hardware capability trait implemented by stepper backends,
//! host event types, the error taxonomy, and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Compile-time limits and defaults
//! - [`axis`] - Axis indices and endstop snapshot
//! - [`hal`] - Hardware capability trait (`StepperHal`)
//! - [`events`] - Host-facing event vocabulary and sinks
//! - [`error`] - Admission results and planner errors
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cnc_common::prelude::*;
//! ```

pub mod axis;
pub mod config;
pub mod consts;
pub mod error;
pub mod events;
pub mod hal;
pub mod prelude;

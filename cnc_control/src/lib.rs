//! # CNC Motion Core
//!
//! Motion command queue and step generation engine for a three-axis stepper
//! controller. Commands (lines, arcs, tool switches) are admitted into a
//! bounded ring, pre-calculated off the real-time path, and executed one
//! step per tick with Bresenham axis synchronization and trapezoidal feed
//! ramps.
//!
//! ## Execution Contexts
//!
//! 1. **Command producer**: [`command::Dispatcher`] turns frames into
//!    `enqueue_*`/`lock`/`unlock` calls.
//! 2. **Background pass**: `report_states` + `pre_calculate`.
//! 3. **Tick source**: [`planner::Planner::tick`], never blocked.
//!
//! [`shared::SharedPlanner`] serializes the first two and lets the tick
//! context skip a tick instead of waiting.
//!
//! ## Zero-Allocation RT Path
//!
//! Queue slots, arc chord tables and command frames are fixed-size. The
//! tick path performs no heap allocation.

pub mod command;
pub mod moves;
pub mod planner;
pub mod runtime;
pub mod shared;
pub mod sim;

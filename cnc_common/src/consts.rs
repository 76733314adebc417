//! System-wide constants for the motion controller.
//!
//! Single source of truth for queue sizing and numeric defaults.

use static_assertions::const_assert;

/// Number of controlled axes (X, Y, Z).
pub const AXES: usize = 3;

/// Action queue capacity. One slot is permanently reserved to tell a full
/// ring from an empty one, so at most `QUEUE_SIZE - 1` actions are in flight.
pub const QUEUE_SIZE: usize = 10;

/// Maximum number of chords an arc is split into by the built-in interpolator.
pub const ARC_SEGMENTS: usize = 32;

/// Host events one background pass can hand over.
pub const EVENT_BUFFER_SIZE: usize = 64;

/// Maximum number of words in one command frame.
pub const MAX_FRAME_WORDS: usize = 16;

/// Default minimum feed [units/min]. Feeds below this are clamped up.
pub const FEED_BASE_DEFAULT: f64 = 100.0;

/// Default acceleration [units/s²] when a command omits one.
pub const ACC_DEFAULT: f64 = 50.0;

/// Default length of one delay unit [µs]. Delays are hundredths of a second.
pub const TICK_BASE_US_DEFAULT: u32 = 10_000;

/// Lower bound for `steps_per_unit`.
pub const STEPS_PER_UNIT_MIN: f64 = 0.001;

/// Upper bound for `steps_per_unit`.
pub const STEPS_PER_UNIT_MAX: f64 = 1_000_000.0;

/// Lower bound for `tick_base_us`.
pub const TICK_BASE_US_MIN: u32 = 1;

/// Upper bound for `tick_base_us`.
pub const TICK_BASE_US_MAX: u32 = 1_000_000;

const_assert!(QUEUE_SIZE >= 2);
const_assert!(AXES == 3);
const_assert!(ARC_SEGMENTS >= 1);
const_assert!(EVENT_BUFFER_SIZE >= 4 * QUEUE_SIZE);

//! Axis indices and endstop snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consts::AXES;

/// One of the three linear axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; AXES] = [Axis::X, Axis::Y, Axis::Z];

    /// Array index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Word letter of this axis in command frames.
    #[inline]
    pub const fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }

    /// Axis for an array index, `None` when out of range.
    #[inline]
    pub const fn from_index(i: usize) -> Option<Axis> {
        match i {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Snapshot of the limit switches and the probe input.
///
/// `true` means triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endstops {
    pub stop_x: bool,
    pub stop_y: bool,
    pub stop_z: bool,
    pub probe: bool,
}

impl Endstops {
    /// Limit switch state for one axis.
    #[inline]
    pub const fn stop(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.stop_x,
            Axis::Y => self.stop_y,
            Axis::Z => self.stop_z,
        }
    }

    /// Set the limit switch state for one axis.
    #[inline]
    pub fn set_stop(&mut self, axis: Axis, triggered: bool) {
        match axis {
            Axis::X => self.stop_x = triggered,
            Axis::Y => self.stop_y = triggered,
            Axis::Z => self.stop_z = triggered,
        }
    }

    /// Whether any input (limit or probe) is triggered.
    #[inline]
    pub const fn any(&self) -> bool {
        self.stop_x || self.stop_y || self.stop_z || self.probe
    }

    /// Merge two snapshots (logical OR per input).
    #[inline]
    pub const fn merge(self, other: Endstops) -> Endstops {
        Endstops {
            stop_x: self.stop_x || other.stop_x,
            stop_y: self.stop_y || other.stop_y,
            stop_z: self.stop_z || other.stop_z,
            probe: self.probe || other.probe,
        }
    }
}

impl fmt::Display for Endstops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EX:{} EY:{} EZ:{} EP:{}",
            self.stop_x as u8, self.stop_y as u8, self.stop_z as u8, self.probe as u8
        )
    }
}

//! Trapezoidal velocity ramp: entry feed → cruise feed → exit feed.

use super::{FeedProfile, acceleration_steps, accelerate, feed_to_delay};

/// Acceleration and deceleration step counts for a segment of `steps`
/// steps, clipped so the two ramps never overlap.
pub fn ramp_steps(profile: &FeedProfile, steps: u32, step_len: f64) -> (u32, u32) {
    let cruise = profile.feed;
    let acc = acceleration_steps(profile.feed_in.min(cruise), cruise, profile.acceleration, step_len);
    let dec = acceleration_steps(cruise, profile.feed_out.min(cruise), profile.acceleration, step_len);
    clip_ramps(acc, dec, steps)
}

/// Scale `acc`/`dec` down proportionally when they do not fit in `steps`.
pub fn clip_ramps(acc: u32, dec: u32, steps: u32) -> (u32, u32) {
    let sum = u64::from(acc) + u64::from(dec);
    if sum <= u64::from(steps) {
        return (acc, dec);
    }
    let acc = (u64::from(steps) * u64::from(acc) / sum) as u32;
    (acc, steps - acc)
}

/// Per-step delay generator for one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    feed: f64,
    cruise: f64,
    feed_out: f64,
    acc: f64,
    step_len: f64,
    acc_steps: u32,
    dec_start: u32,
}

impl Ramp {
    pub fn new(profile: &FeedProfile, step_len: f64, steps: u32, acc_steps: u32, dec_steps: u32) -> Self {
        let cruise = profile.feed.max(1.0);
        let feed = if acc_steps > 0 {
            profile.feed_in.min(cruise)
        } else {
            cruise
        };
        Self {
            feed,
            cruise,
            feed_out: profile.feed_out.min(cruise),
            acc: profile.acceleration,
            step_len,
            acc_steps,
            dec_start: steps.saturating_sub(dec_steps),
        }
    }

    /// Current feed [units/min].
    #[inline]
    pub const fn feed(&self) -> f64 {
        self.feed
    }

    /// Delay for step `step` (0-based), then move the feed along the ramp.
    pub fn delay(&mut self, step: u32) -> f64 {
        let delay = feed_to_delay(self.feed, self.step_len);
        self.feed = if step < self.acc_steps {
            accelerate(self.feed, self.acc, delay).min(self.cruise)
        } else if step >= self.dec_start {
            accelerate(self.feed, -self.acc, delay).max(self.feed_out)
        } else {
            self.cruise
        };
        delay
    }
}

//! Tick and background threads for hosted builds.
//!
//! On a microcontroller the tick is a timer interrupt and the background
//! pass a low-priority task. Hosted builds emulate both with OS threads
//! sharing one [`SharedPlanner`]. The background thread publishes host
//! events through `tracing` after it has released the planner.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use cnc_common::events::{EventBatch, EventSink};
use cnc_common::hal::StepperHal;

use crate::moves::Tick;
use crate::shared::SharedPlanner;

/// Pacing of the emulated contexts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Wall time of one delay unit.
    pub delay_unit: Duration,
    /// Sleep while no action is executing.
    pub idle_poll: Duration,
    /// Period of the background pass.
    pub background_period: Duration,
}

impl Timing {
    /// Timing for a configured `tick_base_us`, sped up by `time_scale`.
    pub fn new(tick_base_us: u32, time_scale: f64) -> Self {
        let scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            1.0
        };
        Self {
            delay_unit: Duration::from_nanos((f64::from(tick_base_us) * 1000.0 / scale).round() as u64),
            idle_poll: Duration::from_millis(1),
            background_period: Duration::from_millis(5),
        }
    }

    /// Wall time for a delay in delay units.
    pub fn sleep_for(&self, delay: f64) -> Duration {
        if delay.is_finite() && delay > 0.0 {
            Duration::from_nanos((self.delay_unit.as_nanos() as f64 * delay).round() as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// Running tick and background threads.
pub struct Runtime {
    stop: Arc<AtomicBool>,
    contended: Arc<AtomicU64>,
    handles: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Spawn both threads.
    pub fn spawn<H, E, const N: usize>(
        planner: &SharedPlanner<H, E, N>,
        timing: Timing,
    ) -> io::Result<Self>
    where
        H: StepperHal + Send + 'static,
        E: EventSink + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let contended = Arc::new(AtomicU64::new(0));

        let tick = {
            let planner = planner.clone();
            let stop = Arc::clone(&stop);
            let contended = Arc::clone(&contended);
            thread::Builder::new()
                .name("tick".into())
                .spawn(move || tick_loop(&planner, timing, &stop, &contended))?
        };
        let background = {
            let planner = planner.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("background".into())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        publish(&planner.background());
                        thread::sleep(timing.background_period);
                    }
                    publish(&planner.background());
                })?
        };
        debug!("runtime threads started");

        Ok(Self {
            stop,
            contended,
            handles: vec![tick, background],
        })
    }

    /// Ticks that found the planner busy and retried.
    pub fn contended_ticks(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }

    /// Stop both threads and wait for them. Returns the number of ticks
    /// that found the planner locked by another context.
    pub fn shutdown(self) -> u64 {
        self.stop.store(true, Ordering::Release);
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("runtime thread panicked");
            }
        }
        let contended = self.contended.load(Ordering::Relaxed);
        info!(contended_ticks = contended, "runtime threads stopped");
        contended
    }
}

/// Log a batch of host events. Called without the planner lock held.
fn publish(batch: &EventBatch) {
    if batch.lost > 0 {
        warn!(lost = batch.lost, "host event buffer overflowed");
    }
    for event in &batch.events {
        info!(id = event.id(), "{event}");
    }
}

fn tick_loop<H: StepperHal, E: EventSink, const N: usize>(
    planner: &SharedPlanner<H, E, N>,
    timing: Timing,
    stop: &AtomicBool,
    contended: &AtomicU64,
) {
    while !stop.load(Ordering::Acquire) {
        match planner.try_tick() {
            Some(Tick::Delay(d)) => thread::sleep(timing.sleep_for(d)),
            Some(Tick::Pending | Tick::Idle) => thread::sleep(timing.idle_poll),
            // Next action is already started; tick it right away.
            Some(Tick::Finished | Tick::Break) => {}
            None => {
                contended.fetch_add(1, Ordering::Relaxed);
                thread::yield_now();
            }
        }
    }
}

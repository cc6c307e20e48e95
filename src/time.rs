// src/time.rs
//! Frame timing for the synchronization loop.
//!
//! - **Clock**: anything that reports monotonically increasing seconds.
//!   `MonotonicClock` wraps `Instant`; `ManualClock` is driven by hand (tests,
//!   headless runs).
//! - **FrameTimer**: keeps the previous reading and hands out `deltaTime`.
//! - **SubstepPlan**: how many fixed steps an elapsed time buys, and how much
//!   time is thrown away when the catch-up cap is hit.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Source of elapsed seconds since some fixed origin.
pub trait Clock {
    fn elapsed_seconds(&self) -> f64;
}

/// Wall clock, origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    #[inline(always)]
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock() = seconds;
    }

    pub fn advance(&self, seconds: f64) {
        *self.now.lock() += seconds;
    }
}

impl Clock for ManualClock {
    fn elapsed_seconds(&self) -> f64 {
        *self.now.lock()
    }
}

/// Derives `deltaTime = elapsed - previous_elapsed` once per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTimer {
    previous: f64,
    frame: u64,
}

impl FrameTimer {
    /// The first tick measures from clock origin, like a fresh render clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a reading and returns the time since the previous one.
    /// A reading that goes backwards yields 0 and becomes the new baseline.
    pub fn tick(&mut self, elapsed: f64) -> f64 {
        self.frame += 1;
        let delta = elapsed - self.previous;
        self.previous = elapsed;
        if delta.is_nan() || delta < 0.0 {
            log::warn!("clock went backwards ({:.4}s), treating frame {} as zero-length", delta, self.frame);
            return 0.0;
        }
        delta
    }

    pub fn tick_clock<C: Clock + ?Sized>(&mut self, clock: &C) -> f64 {
        self.tick(clock.elapsed_seconds())
    }

    #[inline(always)]
    pub fn previous(&self) -> f64 {
        self.previous
    }

    #[inline(always)]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Absorbs float noise in `elapsed / fixed_dt` so an exact multiple of the
/// step never buys an extra substep.
const STEP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubstepPlan {
    pub substeps: u32,
    /// Elapsed time not covered by the substeps; dropped, never carried over.
    pub discarded: f64,
}

/// `ceil(elapsed / fixed_dt)` capped at `max_substeps`.
pub fn plan_substeps(fixed_dt: f64, elapsed: f64, max_substeps: u32) -> SubstepPlan {
    if !(fixed_dt > 0.0) || !(elapsed > 0.0) || max_substeps == 0 {
        return SubstepPlan { substeps: 0, discarded: 0.0 };
    }
    let wanted = (elapsed / fixed_dt - STEP_TOLERANCE).ceil().max(1.0);
    let substeps = if wanted >= max_substeps as f64 { max_substeps } else { wanted as u32 };
    let discarded = (elapsed - substeps as f64 * fixed_dt).max(0.0);
    SubstepPlan { substeps, discarded }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    #[test]
    fn test_long_pause_is_capped() {
        let plan = plan_substeps(DT, 10.0, 3);
        assert_eq!(plan.substeps, 3);
        assert!((plan.discarded - (10.0 - 3.0 * DT)).abs() < 1e-9);
    }

    #[test]
    fn test_ceil_rounds_up_partial_steps() {
        assert_eq!(plan_substeps(DT, DT, 3).substeps, 1);
        assert_eq!(plan_substeps(DT, DT * 1.5, 3).substeps, 2);
        assert_eq!(plan_substeps(DT, 0.001, 3).substeps, 1);
        assert_eq!(plan_substeps(DT, DT * 2.0 + 1e-9, 3).substeps, 2);
        assert_eq!(plan_substeps(DT, DT * 2.0, 3).discarded, 0.0);
    }

    #[test]
    fn test_slightly_over_one_step_buys_a_second() {
        let plan = plan_substeps(DT, DT * 1.0005, 3);
        assert_eq!(plan.substeps, 2);
        assert_eq!(plan.discarded, 0.0);
        let mut elapsed = 0.0;
        let mut previous = 0.0;
        for _ in 0..600 {
            elapsed += DT;
            assert_eq!(plan_substeps(DT, elapsed - previous, 3).substeps, 1);
            previous = elapsed;
        }
    }

    #[test]
    fn test_degenerate_inputs_do_nothing() {
        assert_eq!(plan_substeps(DT, 0.0, 3).substeps, 0);
        assert_eq!(plan_substeps(DT, -1.0, 3).substeps, 0);
        assert_eq!(plan_substeps(DT, f64::NAN, 3).substeps, 0);
        assert_eq!(plan_substeps(0.0, 1.0, 3).substeps, 0);
        assert_eq!(plan_substeps(DT, 1.0, 0).substeps, 0);
    }

    #[test]
    fn test_frame_timer_deltas() {
        let clock = ManualClock::new();
        let mut timer = FrameTimer::new();
        clock.set(0.5);
        assert_eq!(timer.tick_clock(&clock), 0.5);
        clock.advance(0.25);
        assert_eq!(timer.tick_clock(&clock), 0.25);
        assert_eq!(timer.tick_clock(&clock), 0.0);
        assert_eq!(timer.frame(), 3);
    }

    #[test]
    fn test_backwards_clock_yields_zero() {
        let mut timer = FrameTimer::new();
        timer.tick(2.0);
        assert_eq!(timer.tick(1.0), 0.0);
        assert_eq!(timer.previous(), 1.0);
        assert_eq!(timer.tick(1.5), 0.5);
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();
        let a = clock.elapsed_seconds();
        let b = clock.elapsed_seconds();
        assert!(b >= a);
    }
}

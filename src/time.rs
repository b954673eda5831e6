//! Integer simulation time.
//!
//! The kernel never advances time in floating point: the clock counts elementary steps of
//! length `h` (the resolution, in ms) and every delay is stored as a whole number of steps.
//! A spike generated while updating step `T` is stamped `T + 1`, i.e., it happens at the end
//! of the interval `(T*h, (T+1)*h]`, possibly `offset` ms earlier for precise spike times.
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// A point in simulation time, counted in elementary steps.
pub type Step = u64;

/// Relative tolerance (in units of the resolution) for a time to be considered on the grid.
pub const GRID_TOLERANCE: f64 = 1e-9;

/// The simulation resolution, i.e., the length of one elementary step in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    h: f64,
}

impl Resolution {
    /// Create a new resolution.
    /// Returns an error if the step is not finite and positive.
    pub fn new(h: f64) -> Result<Self, KernelError> {
        if !(h.is_finite() && h > 0.0) {
            return Err(KernelError::InvalidConfiguration(format!(
                "resolution must be finite and positive, got {}",
                h
            )));
        }
        Ok(Resolution { h })
    }

    /// Returns the step length in ms.
    pub fn ms(&self) -> f64 {
        self.h
    }

    /// Returns the time (in ms) at the beginning of the given step.
    pub fn time_of(&self, step: Step) -> f64 {
        step as f64 * self.h
    }

    /// Returns the number of whole steps in a simulation duration.
    /// Durations which are not a multiple of the resolution are truncated.
    pub fn steps_in(&self, duration: f64) -> Result<Step, KernelError> {
        if duration.is_nan() || duration < 0.0 {
            return Err(KernelError::NegativeDuration(duration));
        }
        if duration.is_infinite() {
            return Ok(Step::MAX);
        }
        let steps = (duration / self.h + GRID_TOLERANCE).floor();
        if steps >= Step::MAX as f64 {
            return Ok(Step::MAX);
        }
        Ok(steps as Step)
    }

    /// Returns the step whose end coincides with the given time, if the time lies on the grid.
    pub fn on_grid(&self, time: f64) -> Option<i64> {
        let steps = time / self.h;
        let rounded = steps.round();
        if (steps - rounded).abs() <= GRID_TOLERANCE * rounded.abs().max(1.0) {
            Some(rounded as i64)
        } else {
            None
        }
    }

    /// Converts a time to a whole number of steps, rejecting times which are not on the grid.
    pub fn to_steps(&self, time: f64, what: &str) -> Result<i64, KernelError> {
        self.on_grid(time).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "{} = {} ms is not a multiple of the resolution {} ms",
                what, time, self.h
            ))
        })
    }

    /// Splits an off-grid time into the step whose end lies at or after it and the offset
    /// (in ms, `0 <= offset < h`) measured back from the end of that step.
    pub fn split(&self, time: f64) -> (i64, f64) {
        if let Some(steps) = self.on_grid(time) {
            return (steps, 0.0);
        }
        let steps = (time / self.h).ceil();
        let offset = (steps * self.h - time).clamp(0.0, self.h);
        (steps as i64, offset)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution { h: 0.1 }
    }
}

/// The global simulation clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    now: Step,
    max_steps: Step,
}

impl Clock {
    pub fn new(max_steps: Step) -> Self {
        Clock { now: 0, max_steps }
    }

    /// Returns the current step.
    pub fn now(&self) -> Step {
        self.now
    }

    pub fn max_steps(&self) -> Step {
        self.max_steps
    }

    /// Check that the clock can be advanced by the given number of steps.
    pub fn check_advance(&self, steps: Step) -> Result<(), KernelError> {
        match self.now.checked_add(steps) {
            Some(end) if end <= self.max_steps => Ok(()),
            _ => Err(KernelError::ClockOverflow {
                now: self.now,
                requested: steps,
                max: self.max_steps,
            }),
        }
    }

    /// Advance the clock by a single step.
    pub fn tick(&mut self) {
        self.now += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resolution() {
        assert!(Resolution::new(0.0).is_err());
        assert!(Resolution::new(-0.1).is_err());
        assert!(Resolution::new(f64::NAN).is_err());
        let res = Resolution::new(0.1).unwrap();
        assert_relative_eq!(res.time_of(10), 1.0);
    }

    #[test]
    fn test_steps_in() {
        let res = Resolution::new(0.1).unwrap();
        assert_eq!(res.steps_in(10.0), Ok(100));
        assert_eq!(res.steps_in(1000.0), Ok(10000));
        assert_eq!(res.steps_in(0.0), Ok(0));
        assert_eq!(res.steps_in(0.25), Ok(2));
        assert_eq!(res.steps_in(-1.0), Err(KernelError::NegativeDuration(-1.0)));
    }

    #[test]
    fn test_on_grid() {
        let res = Resolution::new(0.1).unwrap();
        assert_eq!(res.on_grid(1.0), Some(10));
        assert_eq!(res.on_grid(0.3), Some(3));
        assert_eq!(res.on_grid(0.35), None);
        assert!(res.to_steps(0.35, "delay").is_err());
    }

    #[test]
    fn test_split() {
        let res = Resolution::new(0.1).unwrap();
        assert_eq!(res.split(0.3), (3, 0.0));
        let (steps, offset) = res.split(0.32);
        assert_eq!(steps, 4);
        assert_relative_eq!(offset, 0.08, epsilon = 1e-12);
    }

    #[test]
    fn test_clock_overflow() {
        let mut clock = Clock::new(10);
        assert!(clock.check_advance(10).is_ok());
        for _ in 0..5 {
            clock.tick();
        }
        assert_eq!(clock.now(), 5);
        assert_eq!(
            clock.check_advance(6),
            Err(KernelError::ClockOverflow {
                now: 5,
                requested: 6,
                max: 10
            })
        );
        assert!(clock.check_advance(Step::MAX).is_err());
    }
}

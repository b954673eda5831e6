//! Activity windows shared by all devices.
//!
//! A device is active for events whose time `t` satisfies `origin + start < t <= origin + stop`.
//! For stimulating devices, `t` is the end of the step being updated, so the device acts during
//! step `T` iff `origin + start <= T*h < origin + stop`.
use crate::error::KernelError;
use crate::status::{get_f64, ParamSpec, Status};
use crate::time::{Resolution, Step};

/// Value of `stop` for devices which never stop.
pub const NEVER: f64 = f64::MAX;

/// Schema entries shared by all devices.
pub const ORIGIN: ParamSpec = ParamSpec::double("origin");
pub const START: ParamSpec = ParamSpec::double("start");
pub const STOP: ParamSpec = ParamSpec::double("stop");

/// The activity window of a device, in ms relative to the simulation start.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityWindow {
    origin: f64,
    start: f64,
    stop: f64,
    origin_step: i64,
    start_step: i64,
    stop_step: Option<i64>,
}

impl ActivityWindow {
    pub fn new() -> Self {
        ActivityWindow {
            origin: 0.0,
            start: 0.0,
            stop: NEVER,
            origin_step: 0,
            start_step: 0,
            stop_step: None,
        }
    }

    /// Returns the window updated with `origin`, `start` and `stop` from the status.
    /// All times must be multiples of the resolution and `stop` must not precede `start`.
    pub fn updated(&self, status: &Status, resolution: &Resolution) -> Result<Self, KernelError> {
        let origin = get_f64(status, "origin").unwrap_or(self.origin);
        let start = get_f64(status, "start").unwrap_or(self.start);
        let stop = get_f64(status, "stop").unwrap_or(self.stop);
        if stop < start {
            return Err(KernelError::InvalidParameter(format!(
                "stop ({} ms) must not precede start ({} ms)",
                stop, start
            )));
        }
        let origin_steps = resolution.to_steps(origin, "origin")?;
        let start_step = origin_steps + resolution.to_steps(start, "start")?;
        let stop_step = if stop >= NEVER {
            None
        } else {
            Some(origin_steps + resolution.to_steps(stop, "stop")?)
        };
        Ok(ActivityWindow {
            origin,
            start,
            stop,
            origin_step: origin_steps,
            start_step,
            stop_step,
        })
    }

    pub fn get_status(&self, status: &mut Status) {
        status.insert("origin".into(), self.origin.into());
        status.insert("start".into(), self.start.into());
        status.insert("stop".into(), self.stop.into());
    }

    /// Returns the origin in steps.
    pub fn origin_steps(&self) -> i64 {
        self.origin_step
    }

    /// Returns true if an event stamped `stamp` falls within the window.
    pub fn contains_stamp(&self, stamp: Step) -> bool {
        let stamp = stamp as i64;
        self.start_step < stamp && self.stop_step.map_or(true, |stop| stamp <= stop)
    }

    /// Returns true if a stimulating device acts during the given step.
    pub fn is_active(&self, step: Step) -> bool {
        self.contains_stamp(step + 1)
    }
}

impl Default for ActivityWindow {
    fn default() -> Self {
        Self::new()
    }
}

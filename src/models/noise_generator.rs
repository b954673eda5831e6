//! Gaussian white noise current generator.
//!
//! While active, the generator injects into each target an independent Gaussian current with
//! mean `mean` and standard deviation `std` (in pA), drawn anew at every step.
use crate::error::KernelError;
use crate::event::{Emission, EventKind};
use crate::models::device::{self, ActivityWindow};
use crate::models::{Node, UpdateContext};
use crate::status::{get_f64, ParamSpec, Status};
use crate::time::Resolution;

pub const NAME: &str = "noise_generator";

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::double("mean"),
    ParamSpec::double("std").min(0.0),
    device::ORIGIN,
    device::START,
    device::STOP,
];

pub fn build(resolution: Resolution) -> Box<dyn Node> {
    Box::new(NoiseGenerator::new(resolution))
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoiseGenerator {
    resolution: Resolution,
    mean: f64,
    std: f64,
    window: ActivityWindow,
}

impl NoiseGenerator {
    pub fn new(resolution: Resolution) -> Self {
        NoiseGenerator {
            resolution,
            mean: 0.0,
            std: 0.0,
            window: ActivityWindow::new(),
        }
    }
}

impl Node for NoiseGenerator {
    fn get_status(&self, status: &mut Status) {
        status.insert("mean".into(), self.mean.into());
        status.insert("std".into(), self.std.into());
        self.window.get_status(status);
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        self.window.updated(status, &self.resolution).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        self.window = self.window.updated(status, &self.resolution)?;
        self.mean = get_f64(status, "mean").unwrap_or(self.mean);
        self.std = get_f64(status, "std").unwrap_or(self.std);
        Ok(())
    }

    fn sends(&self) -> Option<EventKind> {
        Some(EventKind::Current)
    }

    fn update(&mut self, ctx: &mut UpdateContext) -> Vec<Emission> {
        if !self.window.is_active(ctx.step) {
            return vec![];
        }
        vec![Emission::NoiseCurrent {
            mean: self.mean,
            std: self.std,
        }]
    }
}

//! Piecewise constant current generator.
//!
//! The current is 0 pA until the first of `amplitude_times` and switches to the corresponding
//! entry of `amplitude_values` at each of these times.
use crate::error::KernelError;
use crate::event::{Emission, EventKind};
use crate::models::device::{self, ActivityWindow};
use crate::models::{Node, UpdateContext};
use crate::status::{get_f64_vec, ParamSpec, Status};
use crate::time::Resolution;

pub const NAME: &str = "step_current_generator";

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::doubles("amplitude_times").min(0.0),
    ParamSpec::doubles("amplitude_values"),
    device::ORIGIN,
    device::START,
    device::STOP,
];

pub fn build(resolution: Resolution) -> Box<dyn Node> {
    Box::new(StepCurrentGenerator::new(resolution))
}

#[derive(Debug, Clone, PartialEq)]
struct Parameters {
    amplitude_times: Vec<f64>,
    amplitude_values: Vec<f64>,
    window: ActivityWindow,
    /// Steps at which the amplitude changes.
    steps: Vec<i64>,
}

impl Parameters {
    fn updated(&self, status: &Status, resolution: &Resolution) -> Result<Self, KernelError> {
        let mut p = self.clone();
        let times = get_f64_vec(status, "amplitude_times");
        let values = get_f64_vec(status, "amplitude_values");
        if times.is_some() != values.is_some() {
            return Err(KernelError::InvalidParameter(format!(
                "{}: amplitude_times and amplitude_values must be set together",
                NAME
            )));
        }
        if let (Some(times), Some(values)) = (times, values) {
            if times.len() != values.len() {
                return Err(KernelError::InvalidParameter(format!(
                    "{}: amplitude_times and amplitude_values must have the same length, got {} and {}",
                    NAME,
                    times.len(),
                    values.len()
                )));
            }
            p.amplitude_times = times;
            p.amplitude_values = values;
        }
        p.window = p.window.updated(status, resolution)?;

        p.steps = p
            .amplitude_times
            .iter()
            .map(|&t| resolution.to_steps(t, "amplitude time"))
            .collect::<Result<Vec<_>, KernelError>>()?;
        if p.steps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(KernelError::InvalidParameter(format!(
                "{}.amplitude_times must be strictly increasing",
                NAME
            )));
        }
        Ok(p)
    }

    /// Returns the amplitude during the given step.
    fn amplitude(&self, step: i64) -> f64 {
        match self.steps.partition_point(|&s| s <= step) {
            0 => 0.0,
            i => self.amplitude_values[i - 1],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepCurrentGenerator {
    resolution: Resolution,
    params: Parameters,
}

impl StepCurrentGenerator {
    pub fn new(resolution: Resolution) -> Self {
        StepCurrentGenerator {
            resolution,
            params: Parameters {
                amplitude_times: vec![],
                amplitude_values: vec![],
                window: ActivityWindow::new(),
                steps: vec![],
            },
        }
    }
}

impl Node for StepCurrentGenerator {
    fn get_status(&self, status: &mut Status) {
        status.insert(
            "amplitude_times".into(),
            self.params.amplitude_times.clone().into(),
        );
        status.insert(
            "amplitude_values".into(),
            self.params.amplitude_values.clone().into(),
        );
        self.params.window.get_status(status);
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        self.params.updated(status, &self.resolution).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        self.params = self.params.updated(status, &self.resolution)?;
        Ok(())
    }

    fn sends(&self) -> Option<EventKind> {
        Some(EventKind::Current)
    }

    fn update(&mut self, ctx: &mut UpdateContext) -> Vec<Emission> {
        if !self.params.window.is_active(ctx.step) {
            return vec![];
        }
        let amplitude = self.params.amplitude(ctx.step as i64);
        if amplitude == 0.0 {
            return vec![];
        }
        vec![Emission::Current { amplitude }]
    }
}

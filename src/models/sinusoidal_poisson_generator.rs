//! Inhomogeneous Poisson generator with sinusoidally modulated rate.
//!
//! The rate is `dc + ac * sin(2*pi*freq*t + phi)` (in spikes/s), clipped at zero. The oscillation
//! is advanced every step by a rotation, including while the generator is inactive, so that its
//! phase stays consistent. With `individual_spike_trains` (the default), every target receives
//! its own Poisson spike train; otherwise all targets receive the same spikes. This property can
//! only be set as a model default.
use rand_distr::{Distribution, Poisson};

use crate::error::KernelError;
use crate::event::{Emission, EventKind};
use crate::models::device::{self, ActivityWindow};
use crate::models::{CalibrateContext, Node, UpdateContext};
use crate::status::{get_bool, get_f64, ParamSpec, Status};
use crate::time::Resolution;

pub const NAME: &str = "sinusoidal_poisson_generator";

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::double("dc"),
    ParamSpec::double("ac"),
    ParamSpec::double("freq"),
    ParamSpec::double("phi"),
    ParamSpec::boolean("individual_spike_trains").defaults_only(),
    ParamSpec::double("rate").read_only(),
    device::ORIGIN,
    device::START,
    device::STOP,
];

pub fn build(resolution: Resolution) -> Box<dyn Node> {
    Box::new(SinusoidalPoissonGenerator::new(resolution))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinusoidalPoissonGenerator {
    resolution: Resolution,
    /// Mean rate in spikes/ms.
    dc: f64,
    /// Modulation amplitude in spikes/ms.
    ac: f64,
    /// Angular frequency in rad/ms.
    om: f64,
    /// Phase in rad.
    phi: f64,
    individual_spike_trains: bool,
    window: ActivityWindow,
    y_0: f64,
    y_1: f64,
    /// Current rate in spikes/ms.
    rate: f64,
    sin: f64,
    cos: f64,
}

impl SinusoidalPoissonGenerator {
    pub fn new(resolution: Resolution) -> Self {
        SinusoidalPoissonGenerator {
            resolution,
            dc: 0.0,
            ac: 0.0,
            om: 0.0,
            phi: 0.0,
            individual_spike_trains: true,
            window: ActivityWindow::new(),
            y_0: 0.0,
            y_1: 0.0,
            rate: 0.0,
            sin: 0.0,
            cos: 1.0,
        }
    }
}

impl Node for SinusoidalPoissonGenerator {
    fn get_status(&self, status: &mut Status) {
        status.insert("dc".into(), (self.dc * 1000.0).into());
        status.insert("ac".into(), (self.ac * 1000.0).into());
        status.insert(
            "freq".into(),
            (self.om / (2.0 * std::f64::consts::PI / 1000.0)).into(),
        );
        status.insert("phi".into(), self.phi.into());
        status.insert(
            "individual_spike_trains".into(),
            self.individual_spike_trains.into(),
        );
        status.insert("rate".into(), (self.rate * 1000.0).into());
        self.window.get_status(status);
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        self.window.updated(status, &self.resolution).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        self.window = self.window.updated(status, &self.resolution)?;
        if let Some(dc) = get_f64(status, "dc") {
            self.dc = dc / 1000.0;
        }
        if let Some(ac) = get_f64(status, "ac") {
            self.ac = ac / 1000.0;
        }
        if let Some(freq) = get_f64(status, "freq") {
            self.om = freq * 2.0 * std::f64::consts::PI / 1000.0;
        }
        self.phi = get_f64(status, "phi").unwrap_or(self.phi);
        self.individual_spike_trains =
            get_bool(status, "individual_spike_trains").unwrap_or(self.individual_spike_trains);
        Ok(())
    }

    fn sends(&self) -> Option<EventKind> {
        Some(EventKind::Spike)
    }

    fn calibrate(&mut self, ctx: &mut CalibrateContext) -> Result<(), KernelError> {
        let h = self.resolution.ms();
        let t = self.resolution.time_of(ctx.now);
        self.y_0 = self.ac * (self.om * t + self.phi).cos();
        self.y_1 = self.ac * (self.om * t + self.phi).sin();
        self.sin = (h * self.om).sin();
        self.cos = (h * self.om).cos();
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext) -> Vec<Emission> {
        let y_0 = self.cos * self.y_0 - self.sin * self.y_1;
        self.y_1 = self.sin * self.y_0 + self.cos * self.y_1;
        self.y_0 = y_0;
        self.rate = (self.dc + self.y_1).max(0.0);

        if self.rate <= 0.0 || !self.window.is_active(ctx.step) {
            return vec![];
        }
        let lambda = self.rate * self.resolution.ms();
        if self.individual_spike_trains {
            return vec![Emission::PoissonSpikes { lambda }];
        }
        let n: f64 = match Poisson::new(lambda) {
            Ok(poisson) => poisson.sample(&mut *ctx.rng),
            Err(_) => return vec![],
        };
        if n < 1.0 {
            return vec![];
        }
        vec![Emission::Spike {
            multiplicity: n as u32,
            offset: 0.0,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageHub;
    use crate::random::{KernelRng, RngType};
    use crate::status;
    use approx::assert_relative_eq;

    fn calibrated(status: &Status) -> SinusoidalPoissonGenerator {
        let mut generator = SinusoidalPoissonGenerator::new(Resolution::default());
        generator.set_status(status).unwrap();
        let mut ports = MessageHub::new();
        let mut ctx = CalibrateContext {
            now: 0,
            ports: &mut ports,
        };
        generator.calibrate(&mut ctx).unwrap();
        generator
    }

    #[test]
    fn test_rate_follows_sine() {
        let mut generator = calibrated(&status! { "dc" => 100.0, "ac" => 50.0, "freq" => 10.0 });
        let mut rng = KernelRng::new(RngType::ChaCha8, 0, 0);
        for step in 0..1000 {
            let mut ctx = UpdateContext { step, rng: &mut rng };
            generator.update(&mut ctx);
            let t = (step + 1) as f64 * 0.1;
            let expected = 100.0 + 50.0 * (2.0 * std::f64::consts::PI * 10.0 * t / 1000.0).sin();
            let mut status = Status::new();
            generator.get_status(&mut status);
            assert_relative_eq!(get_f64(&status, "rate").unwrap(), expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_rate_is_clipped() {
        let mut generator = calibrated(&status! { "dc" => 10.0, "ac" => 50.0, "freq" => 10.0 });
        let mut rng = KernelRng::new(RngType::ChaCha8, 0, 0);
        for step in 0..1000 {
            let mut ctx = UpdateContext { step, rng: &mut rng };
            if let [Emission::PoissonSpikes { lambda }] = generator.update(&mut ctx)[..] {
                assert!(lambda > 0.0);
            }
            assert!(generator.rate >= 0.0);
        }
    }

    #[test]
    fn test_shared_spike_train() {
        let mut generator = calibrated(&status! {
            "dc" => 1000.0,
            "individual_spike_trains" => false,
        });
        let mut rng = KernelRng::new(RngType::ChaCha8, 1, 0);
        let mut total = 0;
        for step in 0..10000 {
            let mut ctx = UpdateContext { step, rng: &mut rng };
            match generator.update(&mut ctx)[..] {
                [Emission::Spike { multiplicity, .. }] => total += multiplicity,
                [] => {}
                ref other => panic!("unexpected emission {:?}", other),
            }
        }
        // 1000 spikes/s for 1 s
        assert!(total > 850 && total < 1150);
    }
}

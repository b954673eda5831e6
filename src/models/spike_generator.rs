//! Spike generator: emits spikes at prescribed times.
//!
//! Spike times are given in ms relative to `origin` and must be sorted. A spike at time `t` is
//! emitted during the update of the step ending at `t`. Without `precise_times`, spike times
//! must lie on the grid, unless `allow_offgrid_spikes` is set, in which case they are moved to
//! the end of the step containing them. With `precise_times`, off-grid spikes keep their exact
//! time as an offset. Several spikes at the same time are emitted as a single spike with
//! multiplicity; spikes at distinct precise times within one step are emitted separately.
use itertools::Itertools;

use crate::error::KernelError;
use crate::event::{Emission, EventKind};
use crate::models::device::{self, ActivityWindow};
use crate::models::{Node, UpdateContext};
use crate::status::{get_bool, get_f64_vec, ParamSpec, Status};
use crate::time::Resolution;

pub const NAME: &str = "spike_generator";

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::doubles("spike_times").min(0.0),
    ParamSpec::boolean("precise_times"),
    ParamSpec::boolean("allow_offgrid_spikes"),
    device::ORIGIN,
    device::START,
    device::STOP,
];

pub fn build(resolution: Resolution) -> Box<dyn Node> {
    Box::new(SpikeGenerator::new(resolution))
}

#[derive(Debug, Clone, PartialEq)]
struct Parameters {
    spike_times: Vec<f64>,
    precise_times: bool,
    allow_offgrid_spikes: bool,
    window: ActivityWindow,
    /// Stamps (relative to origin) and offsets of all spikes, sorted by stamp.
    stamps: Vec<(i64, f64)>,
}

impl Parameters {
    fn updated(&self, status: &Status, resolution: &Resolution) -> Result<Self, KernelError> {
        let mut p = self.clone();
        p.spike_times = get_f64_vec(status, "spike_times").unwrap_or(p.spike_times);
        p.precise_times = get_bool(status, "precise_times").unwrap_or(p.precise_times);
        p.allow_offgrid_spikes =
            get_bool(status, "allow_offgrid_spikes").unwrap_or(p.allow_offgrid_spikes);
        p.window = p.window.updated(status, resolution)?;

        if p.spike_times.windows(2).any(|w| w[1] < w[0]) {
            return Err(KernelError::InvalidParameter(format!(
                "{}.spike_times must be sorted in non-descending order",
                NAME
            )));
        }
        p.stamps = p
            .spike_times
            .iter()
            .map(|&t| {
                if p.precise_times {
                    Ok(resolution.split(t))
                } else if p.allow_offgrid_spikes {
                    Ok((resolution.split(t).0, 0.0))
                } else {
                    resolution.to_steps(t, "spike time").map(|stamp| (stamp, 0.0))
                }
            })
            .collect::<Result<Vec<_>, KernelError>>()?;
        Ok(p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpikeGenerator {
    resolution: Resolution,
    params: Parameters,
}

impl SpikeGenerator {
    pub fn new(resolution: Resolution) -> Self {
        SpikeGenerator {
            resolution,
            params: Parameters {
                spike_times: vec![],
                precise_times: false,
                allow_offgrid_spikes: false,
                window: ActivityWindow::new(),
                stamps: vec![],
            },
        }
    }
}

impl Node for SpikeGenerator {
    fn get_status(&self, status: &mut Status) {
        status.insert("spike_times".into(), self.params.spike_times.clone().into());
        status.insert("precise_times".into(), self.params.precise_times.into());
        status.insert(
            "allow_offgrid_spikes".into(),
            self.params.allow_offgrid_spikes.into(),
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
        Some(EventKind::Spike)
    }

    fn update(&mut self, ctx: &mut UpdateContext) -> Vec<Emission> {
        let stamp = ctx.step + 1;
        if !self.params.window.contains_stamp(stamp) {
            return vec![];
        }
        let relative = stamp as i64 - self.params.window.origin_steps();
        let stamps = &self.params.stamps;
        let first = stamps.partition_point(|&(s, _)| s < relative);
        let last = stamps.partition_point(|&(s, _)| s <= relative);
        // sorted times within a step have non-increasing offsets
        stamps[first..last]
            .iter()
            .map(|&(_, offset)| offset)
            .dedup_with_count()
            .map(|(multiplicity, offset)| Emission::Spike {
                multiplicity: multiplicity as u32,
                offset,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{KernelRng, RngType};
    use crate::status;
    use approx::assert_relative_eq;

    fn run(generator: &mut SpikeGenerator, steps: u64) -> Vec<(u64, Emission)> {
        let mut rng = KernelRng::new(RngType::ChaCha8, 0, 0);
        (0..steps)
            .flat_map(|step| {
                let mut ctx = UpdateContext { step, rng: &mut rng };
                let emissions = generator.update(&mut ctx);
                emissions.into_iter().map(move |emission| (step, emission))
            })
            .collect()
    }

    #[test]
    fn test_grid_spikes() {
        let mut generator = SpikeGenerator::new(Resolution::default());
        generator
            .set_status(&status! { "spike_times" => vec![0.1, 1.0, 1.0, 2.5] })
            .unwrap();
        let emissions = run(&mut generator, 30);
        assert_eq!(
            emissions,
            vec![
                (0, Emission::Spike { multiplicity: 1, offset: 0.0 }),
                (9, Emission::Spike { multiplicity: 2, offset: 0.0 }),
                (24, Emission::Spike { multiplicity: 1, offset: 0.0 }),
            ]
        );
    }

    #[test]
    fn test_offgrid_spikes() {
        let mut generator = SpikeGenerator::new(Resolution::default());
        assert!(generator
            .set_status(&status! { "spike_times" => vec![0.25] })
            .is_err());

        generator
            .set_status(&status! { "spike_times" => vec![0.25], "allow_offgrid_spikes" => true })
            .unwrap();
        assert_eq!(
            run(&mut generator, 5),
            vec![(2, Emission::Spike { multiplicity: 1, offset: 0.0 })]
        );

        generator
            .set_status(&status! { "precise_times" => true })
            .unwrap();
        let emissions = run(&mut generator, 5);
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].0, 2);
        match emissions[0].1 {
            Emission::Spike { offset, .. } => assert_relative_eq!(offset, 0.05, epsilon = 1e-12),
            _ => panic!("expected a spike"),
        }
    }

    #[test]
    fn test_precise_spikes_in_one_step() {
        let mut generator = SpikeGenerator::new(Resolution::default());
        generator
            .set_status(&status! {
                "spike_times" => vec![1.01, 1.01, 1.07],
                "precise_times" => true,
            })
            .unwrap();
        let emissions = run(&mut generator, 15);
        assert_eq!(emissions.len(), 2);
        assert!(emissions.iter().all(|&(step, _)| step == 10));
        let spikes: Vec<(u32, f64)> = emissions
            .iter()
            .map(|(_, emission)| match *emission {
                Emission::Spike { multiplicity, offset } => (multiplicity, offset),
                _ => panic!("expected a spike"),
            })
            .collect();
        assert_eq!(spikes[0].0, 2);
        assert_relative_eq!(spikes[0].1, 0.09, epsilon = 1e-12);
        assert_eq!(spikes[1].0, 1);
        assert_relative_eq!(spikes[1].1, 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_unsorted_spike_times() {
        let mut generator = SpikeGenerator::new(Resolution::default());
        assert!(matches!(
            generator.set_status(&status! { "spike_times" => vec![2.0, 1.0] }),
            Err(KernelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_origin_and_window() {
        let mut generator = SpikeGenerator::new(Resolution::default());
        generator
            .set_status(&status! {
                "spike_times" => vec![1.0, 2.0, 3.0],
                "origin" => 1.0,
                "stop" => 2.5,
            })
            .unwrap();
        // spikes at 2.0 and 3.0 ms; the spike at 4.0 ms falls after origin + stop
        let steps: Vec<u64> = run(&mut generator, 50).into_iter().map(|(s, _)| s).collect();
        assert_eq!(steps, vec![19, 29]);
    }
}

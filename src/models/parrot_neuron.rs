//! Parrot neuron: repeats every incoming spike.
//!
//! Spikes delivered at step `T` are re-emitted during the update of step `T`, with the same
//! multiplicity and offset, regardless of their weight. Coincident spikes are merged.
use crate::error::KernelError;
use crate::event::{Emission, Event, EventKind, Signal};
use crate::models::{Node, UpdateContext};
use crate::status::{ParamSpec, Status};
use crate::time::Resolution;

pub const NAME: &str = "parrot_neuron";

pub const SCHEMA: &[ParamSpec] = &[];

pub fn build(_resolution: Resolution) -> Box<dyn Node> {
    Box::new(ParrotNeuron::default())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParrotNeuron {
    /// Offsets and multiplicities of the spikes received during the current step.
    spikes: Vec<(f64, u32)>,
}

impl Node for ParrotNeuron {
    fn get_status(&self, _status: &mut Status) {}

    fn check_status(&self, _status: &Status) -> Result<(), KernelError> {
        Ok(())
    }

    fn set_status(&mut self, _status: &Status) -> Result<(), KernelError> {
        Ok(())
    }

    fn sends(&self) -> Option<EventKind> {
        Some(EventKind::Spike)
    }

    fn handles(&self, kind: EventKind, receptor: usize) -> bool {
        kind == EventKind::Spike && receptor == 0
    }

    fn handle(&mut self, event: &Event) {
        if let Signal::Spike { multiplicity } = event.signal {
            match self.spikes.iter_mut().find(|(offset, _)| *offset == event.offset) {
                Some((_, m)) => *m += multiplicity,
                None => self.spikes.push((event.offset, multiplicity)),
            }
        }
    }

    fn update(&mut self, _ctx: &mut UpdateContext) -> Vec<Emission> {
        let mut spikes = std::mem::take(&mut self.spikes);
        // earliest first, i.e., largest offset first
        spikes.sort_by(|a, b| b.0.total_cmp(&a.0));
        spikes
            .into_iter()
            .map(|(offset, multiplicity)| Emission::Spike {
                multiplicity,
                offset,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{KernelRng, RngType};
    use crate::registry::NodeId;

    fn spike(multiplicity: u32, offset: f64) -> Event {
        Event {
            source: NodeId(1),
            receptor: 0,
            stamp: 5,
            offset,
            weight: -3.0,
            signal: Signal::Spike { multiplicity },
        }
    }

    #[test]
    fn test_repeats_spikes() {
        let mut parrot = ParrotNeuron::default();
        let mut rng = KernelRng::new(RngType::ChaCha8, 0, 0);
        let mut ctx = UpdateContext {
            step: 0,
            rng: &mut rng,
        };
        assert!(parrot.update(&mut ctx).is_empty());

        parrot.handle(&spike(2, 0.02));
        parrot.handle(&spike(1, 0.05));
        parrot.handle(&spike(1, 0.02));
        assert_eq!(
            parrot.update(&mut ctx),
            vec![
                Emission::Spike {
                    multiplicity: 1,
                    offset: 0.05
                },
                Emission::Spike {
                    multiplicity: 3,
                    offset: 0.02
                },
            ]
        );
        assert!(parrot.update(&mut ctx).is_empty());
    }

    #[test]
    fn test_handles_spikes_only() {
        let parrot = ParrotNeuron::default();
        assert!(parrot.handles(EventKind::Spike, 0));
        assert!(!parrot.handles(EventKind::Current, 0));
        assert!(!parrot.handles(EventKind::Spike, 1));
    }
}

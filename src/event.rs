//! Events exchanged between nodes.
//!
//! A node's per-step update may produce an [`Emission`]. Emissions are gathered from all workers
//! as [`SpikeRecord`]s, broadcast, and expanded by every worker into [`PendingEvent`]s along its
//! local connections. Stochastic emissions are drawn only when the event is delivered, with the
//! generator of the receiving node, and arrive at the node as a resolved [`Event`] stamped with
//! its arrival time, i.e., its emission time plus the connection delay.
use std::cmp::Reverse;

use rand::Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::registry::NodeId;
use crate::time::{Resolution, Step};

/// The kind of event a node sends or accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Spike,
    Current,
}

/// What a node emits during the update of one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Emission {
    /// `multiplicity` coincident spikes, `offset` ms before the end of the step.
    Spike { multiplicity: u32, offset: f64 },
    /// A Poisson number of spikes with mean `lambda`, drawn independently for each target.
    PoissonSpikes { lambda: f64 },
    /// A current of the given amplitude (pA), held during the delivery step.
    Current { amplitude: f64 },
    /// A Gaussian current with the given mean and standard deviation, drawn independently for each target.
    NoiseCurrent { mean: f64, std: f64 },
}

impl Emission {
    pub fn kind(&self) -> EventKind {
        match self {
            Emission::Spike { .. } | Emission::PoissonSpikes { .. } => EventKind::Spike,
            Emission::Current { .. } | Emission::NoiseCurrent { .. } => EventKind::Current,
        }
    }

    /// Returns the offset of the emission within its step.
    pub fn offset(&self) -> f64 {
        match self {
            Emission::Spike { offset, .. } => *offset,
            _ => 0.0,
        }
    }
}

/// An emission, as exchanged between workers at the end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeRecord {
    /// The emitting node.
    pub source: NodeId,
    /// The step during which the emission was produced.
    pub step: Step,
    pub emission: Emission,
}

/// An event travelling along a connection, waiting in the target worker's ring buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub source: NodeId,
    pub target: NodeId,
    pub receptor: usize,
    /// Identifier of the connection carrying the event.
    pub connection_id: u64,
    /// The step at which the event is delivered.
    pub delivery: Step,
    /// Stamp of the emission, i.e., the end of the step during which it was generated.
    pub stamp: Step,
    /// Offset of the arrival time, measured back from the end of the delivery step.
    pub offset: f64,
    pub weight: f64,
    pub emission: Emission,
}

impl PendingEvent {
    /// Key defining the delivery order of events due at the same step, independent of arrival order.
    /// Spikes of one connection within a step are ordered by arrival time.
    pub fn order_key(&self) -> (NodeId, Step, NodeId, u64, Reverse<u64>) {
        // offsets are non-negative, so their bit patterns sort like their values
        (
            self.target,
            self.stamp,
            self.source,
            self.connection_id,
            Reverse(self.offset.to_bits()),
        )
    }

    /// Resolve stochastic emissions with the target's generator.
    /// Returns `None` if nothing is left to deliver (e.g., a Poisson draw of zero spikes).
    pub fn resolve<R: Rng>(&self, rng: &mut R) -> Option<Event> {
        let signal = match self.emission {
            Emission::Spike { multiplicity, .. } => Signal::Spike { multiplicity },
            Emission::PoissonSpikes { lambda } => {
                if lambda <= 0.0 {
                    return None;
                }
                let n: f64 = Poisson::new(lambda).ok()?.sample(rng);
                if n < 1.0 {
                    return None;
                }
                Signal::Spike {
                    multiplicity: n as u32,
                }
            }
            Emission::Current { amplitude } => Signal::Current { amplitude },
            Emission::NoiseCurrent { mean, std } => {
                let z: f64 = StandardNormal.sample(rng);
                Signal::Current {
                    amplitude: mean + std * z,
                }
            }
        };
        Some(Event {
            source: self.source,
            receptor: self.receptor,
            stamp: self.delivery + 1,
            offset: self.offset,
            weight: self.weight,
            signal,
        })
    }
}

/// A resolved signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Spike { multiplicity: u32 },
    Current { amplitude: f64 },
}

/// An event, as handled by its target node.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub source: NodeId,
    pub receptor: usize,
    /// Arrival stamp, i.e., the end of the delivery step.
    pub stamp: Step,
    /// Offset of the arrival time, measured back from the end of the delivery step.
    pub offset: f64,
    pub weight: f64,
    pub signal: Signal,
}

impl Event {
    /// Returns the (possibly off-grid) arrival time of the event in ms.
    pub fn time(&self, resolution: &Resolution) -> f64 {
        resolution.time_of(self.stamp) - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pending(emission: Emission) -> PendingEvent {
        PendingEvent {
            source: NodeId(1),
            target: NodeId(2),
            receptor: 0,
            connection_id: 0,
            delivery: 11,
            stamp: 1,
            offset: 0.0,
            weight: 2.0,
            emission,
        }
    }

    #[test]
    fn test_resolve_deterministic_signals() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let event = pending(Emission::Spike {
            multiplicity: 3,
            offset: 0.0,
        })
        .resolve(&mut rng)
        .unwrap();
        assert_eq!(event.signal, Signal::Spike { multiplicity: 3 });
        assert_eq!(event.stamp, 12);

        let event = pending(Emission::Current { amplitude: 5.0 })
            .resolve(&mut rng)
            .unwrap();
        assert_eq!(event.signal, Signal::Current { amplitude: 5.0 });

        assert!(pending(Emission::PoissonSpikes { lambda: 0.0 })
            .resolve(&mut rng)
            .is_none());
    }

    #[test]
    fn test_resolve_noise_without_std() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let event = pending(Emission::NoiseCurrent {
            mean: 4.0,
            std: 0.0,
        })
        .resolve(&mut rng)
        .unwrap();
        assert_eq!(event.signal, Signal::Current { amplitude: 4.0 });
    }

    #[test]
    fn test_event_time() {
        let resolution = Resolution::new(0.1).unwrap();
        let mut event = pending(Emission::Spike {
            multiplicity: 1,
            offset: 0.0,
        })
        .resolve(&mut ChaCha8Rng::seed_from_u64(0))
        .unwrap();
        event.stamp = 10;
        event.offset = 0.05;
        assert!((event.time(&resolution) - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_order_key() {
        let spike = Emission::Spike {
            multiplicity: 1,
            offset: 0.0,
        };
        let early = PendingEvent {
            offset: 0.07,
            ..pending(spike)
        };
        let late = PendingEvent {
            offset: 0.01,
            ..pending(spike)
        };
        let other = PendingEvent {
            source: NodeId(0),
            ..pending(spike)
        };
        let mut events = vec![late.clone(), early.clone(), other.clone()];
        events.sort_unstable_by_key(|event| event.order_key());
        assert_eq!(events, vec![other, early, late]);
    }
}

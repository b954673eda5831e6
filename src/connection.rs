//! Module implementing the concept of connections between nodes.
//!
//! A connection is immutable once created. It carries the events emitted by its source to a
//! receptor port of its target, after a delay stored as a whole number of steps. Connections are
//! created in bulk from a [`Pattern`] and a [`SynSpec`] describing weights and delays.
use derivative::Derivative;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::KernelError;
use crate::event::{Emission, PendingEvent, SpikeRecord};
use crate::registry::NodeId;
use crate::time::{Resolution, Step, GRID_TOLERANCE};

pub mod store;

pub use store::ConnectionStore;

/// The type of synapse, i.e., how delays are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynapseType {
    /// Delays must be multiples of the resolution.
    #[default]
    StaticSynapse,
    /// Any delay of at least one step; the fractional part is carried as an offset of the spikes.
    ContDelaySynapse,
}

impl SynapseType {
    pub fn name(&self) -> &'static str {
        match self {
            SynapseType::StaticSynapse => "static_synapse",
            SynapseType::ContDelaySynapse => "cont_delay_synapse",
        }
    }
}

impl fmt::Display for SynapseType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Represents a connection between two nodes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Connection {
    /// Identifier of the connection, unique within a kernel epoch and increasing with creation order.
    id: u64,
    source: NodeId,
    target: NodeId,
    receptor: usize,
    weight: f64,
    /// Delay in ms.
    delay: f64,
    /// Delay in steps, rounded up for continuous delays.
    delay_steps: Step,
    /// Fractional part of a continuous delay, i.e., `delay_steps * h - delay`.
    delay_offset: f64,
    synapse: SynapseType,
}

impl Connection {
    /// Create a new connection with the specified parameters.
    /// Returns an error if the weight is not finite, or if the delay is not finite, shorter than
    /// one step, or (for static synapses) not a multiple of the resolution.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        id: u64,
        source: NodeId,
        target: NodeId,
        receptor: usize,
        weight: f64,
        delay: f64,
        synapse: SynapseType,
        resolution: &Resolution,
    ) -> Result<Self, KernelError> {
        if !weight.is_finite() {
            return Err(KernelError::InvalidWeight(format!(
                "weight of connection {} -> {} must be finite, got {}",
                source, target, weight
            )));
        }
        let h = resolution.ms();
        if !delay.is_finite() || delay < h * (1.0 - GRID_TOLERANCE) {
            return Err(KernelError::InvalidDelay(format!(
                "delay of connection {} -> {} must be at least one step ({} ms), got {}",
                source, target, h, delay
            )));
        }
        let (delay_steps, delay_offset) = match synapse {
            SynapseType::StaticSynapse => match resolution.on_grid(delay) {
                Some(steps) => (steps as Step, 0.0),
                None => {
                    return Err(KernelError::InvalidDelay(format!(
                        "delay {} ms of a static synapse is not a multiple of the resolution {} ms",
                        delay, h
                    )))
                }
            },
            SynapseType::ContDelaySynapse => {
                let (steps, offset) = resolution.split(delay);
                (steps as Step, offset)
            }
        };
        Ok(Connection {
            id,
            source,
            target,
            receptor,
            weight,
            delay,
            delay_steps,
            delay_offset,
            synapse,
        })
    }

    /// Returns the identifier of the connection.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn receptor(&self) -> usize {
        self.receptor
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the delay of the connection in ms.
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Returns the delay of the connection in whole steps.
    pub fn delay_steps(&self) -> Step {
        self.delay_steps
    }

    pub fn synapse(&self) -> SynapseType {
        self.synapse
    }

    /// Returns the event carrying an emission along the connection.
    ///
    /// An emission produced during step `T` is delivered at step `T + delay_steps`. For continuous
    /// delays, the fractional part of the delay is added to the offset of spikes; if the total
    /// offset reaches a full step, the spike is delivered one step earlier.
    pub fn transmit(&self, record: &SpikeRecord, resolution: &Resolution) -> PendingEvent {
        let mut delivery = record.step + self.delay_steps;
        let mut offset = record.emission.offset();
        if let (SynapseType::ContDelaySynapse, Emission::Spike { .. }) = (self.synapse, record.emission) {
            let h = resolution.ms();
            offset += self.delay_offset;
            if offset >= h {
                delivery -= 1;
                offset -= h;
            }
        }
        PendingEvent {
            source: self.source,
            target: self.target,
            receptor: self.receptor,
            connection_id: self.id,
            delivery,
            stamp: record.step + 1,
            offset,
            weight: self.weight,
            emission: record.emission,
        }
    }
}

/// A per-connection value: a scalar, one value per connection, a random distribution or a
/// function of the source and target handles.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub enum ValueSpec {
    Value(f64),
    Array(Vec<f64>),
    Uniform {
        min: f64,
        max: f64,
    },
    Normal {
        mean: f64,
        std: f64,
    },
    Function(
        #[derivative(Debug = "ignore")] Arc<dyn Fn(NodeId, NodeId) -> f64 + Send + Sync>,
    ),
}

impl From<f64> for ValueSpec {
    fn from(x: f64) -> Self {
        ValueSpec::Value(x)
    }
}

impl From<Vec<f64>> for ValueSpec {
    fn from(x: Vec<f64>) -> Self {
        ValueSpec::Array(x)
    }
}

/// A distribution from which per-connection values are drawn.
enum Sampler<'a> {
    Value(f64),
    Array(&'a [f64]),
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    Function(&'a (dyn Fn(NodeId, NodeId) -> f64 + Send + Sync)),
}

impl ValueSpec {
    /// Prepare sampling `n` values.
    /// Returns an error if an array does not hold `n` values or a distribution is invalid.
    fn sampler(&self, what: &str, n: usize) -> Result<Sampler<'_>, KernelError> {
        let invalid = |msg: String| {
            if what == "delay" {
                KernelError::InvalidDelay(msg)
            } else {
                KernelError::InvalidWeight(msg)
            }
        };
        match self {
            ValueSpec::Value(x) => Ok(Sampler::Value(*x)),
            ValueSpec::Array(values) => {
                if values.len() != n {
                    return Err(KernelError::LengthMismatch {
                        expected: n,
                        found: values.len(),
                    });
                }
                Ok(Sampler::Array(values))
            }
            ValueSpec::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite() && min < max) {
                    return Err(invalid(format!(
                        "invalid uniform {} distribution on [{}, {})",
                        what, min, max
                    )));
                }
                Ok(Sampler::Uniform(Uniform::new(*min, *max)))
            }
            ValueSpec::Normal { mean, std } => Normal::new(*mean, *std)
                .map(Sampler::Normal)
                .map_err(|e| invalid(format!("invalid normal {} distribution: {}", what, e))),
            ValueSpec::Function(f) => Ok(Sampler::Function(f.as_ref())),
        }
    }
}

impl Sampler<'_> {
    fn sample<R: Rng>(&self, index: usize, source: NodeId, target: NodeId, rng: &mut R) -> f64 {
        match self {
            Sampler::Value(x) => *x,
            Sampler::Array(values) => values[index],
            Sampler::Uniform(dist) => dist.sample(rng),
            Sampler::Normal(dist) => dist.sample(rng),
            Sampler::Function(f) => f(source, target),
        }
    }
}

/// Synapse specification of a connection call.
#[derive(Debug, Clone)]
pub struct SynSpec {
    pub synapse: SynapseType,
    pub weight: ValueSpec,
    /// Delay in ms.
    pub delay: ValueSpec,
    pub receptor: usize,
}

impl Default for SynSpec {
    fn default() -> Self {
        SynSpec {
            synapse: SynapseType::default(),
            weight: ValueSpec::Value(1.0),
            delay: ValueSpec::Value(1.0),
            receptor: 0,
        }
    }
}

impl SynSpec {
    pub fn new(weight: impl Into<ValueSpec>, delay: impl Into<ValueSpec>) -> Self {
        SynSpec {
            weight: weight.into(),
            delay: delay.into(),
            ..Default::default()
        }
    }

    pub fn with_synapse(mut self, synapse: SynapseType) -> Self {
        self.synapse = synapse;
        self
    }

    pub fn with_receptor(mut self, receptor: usize) -> Self {
        self.receptor = receptor;
        self
    }

    /// Build one connection per pair, with consecutive identifiers starting at `first_id`.
    /// Weights and delays are drawn pair after pair (weight first) from `rng`.
    /// The function fails without side effects if any connection is invalid.
    pub fn build_all<R: Rng>(
        &self,
        pairs: &[(NodeId, NodeId)],
        first_id: u64,
        resolution: &Resolution,
        rng: &mut R,
    ) -> Result<Vec<Connection>, KernelError> {
        let weights = self.weight.sampler("weight", pairs.len())?;
        let delays = self.delay.sampler("delay", pairs.len())?;
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(source, target))| {
                let weight = weights.sample(i, source, target, rng);
                let delay = delays.sample(i, source, target, rng);
                Connection::build(
                    first_id + i as u64,
                    source,
                    target,
                    self.receptor,
                    weight,
                    delay,
                    self.synapse,
                    resolution,
                )
            })
            .collect()
    }
}

/// A connection pattern between a list of sources and a list of targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// The i-th source to the i-th target; both lists must have the same length.
    OneToOne,
    /// Each source to all targets.
    Divergent,
    /// Each target from all sources.
    Convergent,
}

impl Pattern {
    /// Returns the (source, target) pairs described by the pattern, in creation order.
    pub fn expand(&self, sources: &[NodeId], targets: &[NodeId]) -> Result<Vec<(NodeId, NodeId)>, KernelError> {
        match self {
            Pattern::OneToOne => {
                if sources.len() != targets.len() {
                    return Err(KernelError::LengthMismatch {
                        expected: sources.len(),
                        found: targets.len(),
                    });
                }
                Ok(sources.iter().copied().zip(targets.iter().copied()).collect())
            }
            Pattern::Divergent => Ok(sources
                .iter()
                .flat_map(|&s| targets.iter().map(move |&t| (s, t)))
                .collect()),
            Pattern::Convergent => Ok(targets
                .iter()
                .flat_map(|&t| sources.iter().map(move |&s| (s, t)))
                .collect()),
        }
    }
}

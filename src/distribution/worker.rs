//! A worker owns the state of its nodes, the connections to them and their pending events.
use std::collections::HashMap;

use crate::connection::{Connection, ConnectionStore};
use crate::error::KernelError;
use crate::event::SpikeRecord;
use crate::models::{CalibrateContext, Node, UpdateContext};
use crate::random::KernelRng;
use crate::registry::NodeId;
use crate::time::{Resolution, Step};

use super::ring_buffer::RingBuffer;

/// A node, with its handle and its random stream.
#[derive(Debug)]
pub struct NodeSlot {
    pub id: NodeId,
    pub node: Box<dyn Node>,
    pub rng: KernelRng,
}

#[derive(Debug)]
pub struct Worker {
    rank: usize,
    resolution: Resolution,
    /// Local nodes, in ascending handle order.
    nodes: Vec<NodeSlot>,
    lookup: HashMap<NodeId, usize>,
    connections: ConnectionStore,
    ring: RingBuffer,
}

impl Worker {
    pub fn new(rank: usize, resolution: Resolution) -> Self {
        Worker {
            rank,
            resolution,
            nodes: vec![],
            lookup: HashMap::new(),
            connections: ConnectionStore::new(),
            ring: RingBuffer::new(1),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Add a node. Nodes must be added in ascending handle order.
    pub fn add_node(&mut self, slot: NodeSlot) {
        debug_assert!(self.nodes.last().map_or(true, |last| last.id < slot.id));
        self.lookup.insert(slot.id, self.nodes.len());
        self.nodes.push(slot);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        self.lookup.get(&id).map(|&i| self.nodes[i].node.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut (dyn Node + 'static)> {
        let i = *self.lookup.get(&id)?;
        Some(self.nodes[i].node.as_mut())
    }

    /// Returns an iterator over the local nodes, in ascending handle order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSlot> + '_ {
        self.nodes.iter()
    }

    pub fn connections(&self) -> &ConnectionStore {
        &self.connections
    }

    /// Append a batch of connections targeting local nodes.
    pub fn append_connections(&mut self, batch: Vec<Connection>) {
        self.connections.batch_append(batch);
    }

    /// Index pending connections and size the ring buffer to the longest delay.
    /// Returns the number of newly indexed connections.
    pub fn sync(&mut self) -> usize {
        let flushed = self.connections.flush();
        self.ring.resize(self.connections.max_delay_steps().max(1));
        flushed
    }

    /// Returns the number of events waiting for delivery.
    pub fn pending_events(&self) -> usize {
        self.ring.len()
    }

    /// Prepare all local nodes for a simulation run.
    pub fn calibrate(&mut self, ctx: &mut CalibrateContext) -> Result<(), KernelError> {
        self.nodes
            .iter_mut()
            .try_for_each(|slot| slot.node.calibrate(ctx))
    }

    /// Deliver the events due at `step` and update all local nodes.
    /// Returns the emissions of the step, in ascending handle order.
    ///
    /// Events are delivered in the order of their target, emission stamp, source and connection,
    /// which does not depend on how nodes are distributed over workers.
    pub fn deliver_and_update(&mut self, step: Step) -> Vec<SpikeRecord> {
        let mut events = self.ring.take(step);
        events.sort_unstable_by_key(|event| event.order_key());
        for event in events.iter() {
            if let Some(&i) = self.lookup.get(&event.target) {
                let slot = &mut self.nodes[i];
                if let Some(resolved) = event.resolve(&mut slot.rng) {
                    slot.node.handle(&resolved);
                }
            }
        }

        self.nodes
            .iter_mut()
            .flat_map(|slot| {
                let mut ctx = UpdateContext {
                    step,
                    rng: &mut slot.rng,
                };
                let source = slot.id;
                slot.node
                    .update(&mut ctx)
                    .into_iter()
                    .map(move |emission| SpikeRecord {
                        source,
                        step,
                        emission,
                    })
            })
            .collect()
    }

    /// File the events caused by the given emissions along the local connections.
    pub fn route(&mut self, records: &[SpikeRecord]) {
        for record in records.iter() {
            for conn in self.connections.outgoing(record.source) {
                self.ring.push(conn.transmit(record, &self.resolution));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SynapseType;
    use crate::event::Emission;
    use crate::models::parrot_neuron::ParrotNeuron;
    use crate::random::RngType;

    fn slot(id: u64) -> NodeSlot {
        NodeSlot {
            id: NodeId(id),
            node: Box::new(ParrotNeuron::default()),
            rng: KernelRng::new(RngType::ChaCha8, 0, id),
        }
    }

    #[test]
    fn test_route_and_deliver() {
        let res = Resolution::default();
        let mut worker = Worker::new(0, res);
        worker.add_node(slot(2));
        worker.add_node(slot(4));
        worker.append_connections(vec![
            Connection::build(0, NodeId(1), NodeId(2), 0, 1.0, 0.3, SynapseType::StaticSynapse, &res)
                .unwrap(),
            Connection::build(1, NodeId(1), NodeId(4), 0, 1.0, 0.1, SynapseType::StaticSynapse, &res)
                .unwrap(),
        ]);
        assert_eq!(worker.sync(), 2);

        let record = SpikeRecord {
            source: NodeId(1),
            step: 0,
            emission: Emission::Spike {
                multiplicity: 2,
                offset: 0.0,
            },
        };
        worker.route(&[record]);
        assert_eq!(worker.pending_events(), 2);

        let emitted: Vec<Vec<NodeId>> = (0..5)
            .map(|step| {
                worker
                    .deliver_and_update(step)
                    .into_iter()
                    .map(|r| r.source)
                    .collect()
            })
            .collect();
        assert_eq!(
            emitted,
            vec![vec![], vec![NodeId(4)], vec![], vec![NodeId(2)], vec![]]
        );
    }
}

//! Distribution of nodes and connections over parallel workers.
//!
//! Nodes are assigned to workers when they are created; connections are stored on the worker
//! owning their target. At every step, each worker delivers its due events and updates its
//! nodes, then all emissions are exchanged and every worker routes them along its local
//! connections.
use serde::{Deserialize, Serialize};

use crate::registry::NodeId;

pub mod ring_buffer;
pub mod worker;

pub use ring_buffer::RingBuffer;
pub use worker::{NodeSlot, Worker};

/// How nodes are assigned to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Partition {
    /// Node `id` is owned by worker `id mod num_workers`.
    #[default]
    RoundRobin,
    /// Consecutive blocks of `block_size` nodes (in creation order since the last reset) are
    /// owned by consecutive workers, cyclically.
    Block { block_size: usize },
}

impl Partition {
    /// Returns the worker owning a node, given its handle and its creation index in the epoch.
    pub fn worker_of(&self, id: NodeId, index: usize, num_workers: usize) -> usize {
        match self {
            Partition::RoundRobin => (id.0 % num_workers as u64) as usize,
            Partition::Block { block_size } => (index / (*block_size).max(1)) % num_workers,
        }
    }
}

/// Report returned by a synchronization of all workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Number of connections newly indexed by the synchronization.
    pub flushed: usize,
    /// Number of connections stored on each worker.
    pub connections_per_worker: Vec<usize>,
    /// Number of nodes owned by each worker.
    pub nodes_per_worker: Vec<usize>,
}

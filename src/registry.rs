//! Node handles and the node registry.
//!
//! The registry owns the bookkeeping of all nodes of a kernel: their model and the worker owning
//! their state. The state itself lives on the owning worker. Handles are handed out in increasing
//! order and are never reused, not even after a kernel reset.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::KernelError;
use crate::event::EventKind;

/// The handle of a node, unique within a kernel context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// Bookkeeping of a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub model: String,
    pub worker: usize,
    /// The kind of event the node emits, if any.
    pub sends: Option<EventKind>,
}

/// The registry of all nodes created since the last reset.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRegistry {
    first_id: u64,
    entries: Vec<NodeEntry>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl NodeRegistry {
    /// Create an empty registry whose first handle is `first_id`.
    pub fn starting_at(first_id: u64) -> Self {
        NodeRegistry {
            first_id,
            entries: vec![],
        }
    }

    /// Returns an empty registry for the next epoch; handles keep counting from this registry.
    pub fn next_epoch(&self) -> Self {
        Self::starting_at(self.next_id().0)
    }

    /// Returns the handle the next created node will receive.
    pub fn next_id(&self) -> NodeId {
        NodeId(self.first_id + self.entries.len() as u64)
    }

    /// Returns the number of nodes in the current epoch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the position of a handle in the current epoch, i.e., its creation index since the last reset.
    pub fn index_of(&self, id: NodeId) -> Result<usize, KernelError> {
        if id.0 == 0 || id >= self.next_id() {
            return Err(KernelError::UnknownNode(id.0));
        }
        if id.0 < self.first_id {
            return Err(KernelError::StaleHandle(id.0));
        }
        Ok((id.0 - self.first_id) as usize)
    }

    /// Returns the bookkeeping of a node.
    pub fn get(&self, id: NodeId) -> Result<&NodeEntry, KernelError> {
        let index = self.index_of(id)?;
        Ok(&self.entries[index])
    }

    /// Check all handles, returning the first error if any.
    pub fn check_all(&self, ids: &[NodeId]) -> Result<(), KernelError> {
        ids.iter().try_for_each(|&id| self.index_of(id).map(|_| ()))
    }

    /// Register a new node and returns its handle.
    pub fn push(&mut self, entry: NodeEntry) -> NodeId {
        let id = self.next_id();
        self.entries.push(entry);
        id
    }

    /// Returns an iterator over all handles and bookkeeping entries, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(move |(i, entry)| (NodeId(self.first_id + i as u64), entry))
    }
}

//! Append-only connection log of a worker.
//!
//! A worker stores the connections whose target it owns. Connections are appended in batches
//! and indexed by source at the next synchronization, so that each worker can expand a spike
//! record into the events of its local targets without scanning the whole log.
use std::collections::HashMap;

use crate::connection::Connection;
use crate::registry::NodeId;
use crate::time::Step;

#[derive(Debug, Clone, Default)]
pub struct ConnectionStore {
    connections: Vec<Connection>,
    /// Positions of the connections of each source, in creation order.
    by_source: HashMap<NodeId, Vec<usize>>,
    /// Number of connections already in the source index.
    indexed: usize,
    max_delay_steps: Step,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of connections. They become visible to [`Self::outgoing`] after [`Self::flush`].
    pub fn batch_append(&mut self, batch: Vec<Connection>) {
        if let Some(max) = batch.iter().map(Connection::delay_steps).max() {
            self.max_delay_steps = self.max_delay_steps.max(max);
        }
        self.connections.extend(batch);
    }

    /// Index all pending connections by source. Returns the number of newly indexed connections.
    pub fn flush(&mut self) -> usize {
        let pending = self.connections.len() - self.indexed;
        for (i, conn) in self.connections.iter().enumerate().skip(self.indexed) {
            self.by_source.entry(conn.source()).or_default().push(i);
        }
        self.indexed = self.connections.len();
        pending
    }

    /// Returns the number of connections not yet indexed.
    pub fn pending(&self) -> usize {
        self.connections.len() - self.indexed
    }

    /// Returns the indexed connections of the given source.
    pub fn outgoing(&self, source: NodeId) -> impl Iterator<Item = &Connection> + '_ {
        self.by_source
            .get(&source)
            .into_iter()
            .flatten()
            .map(move |&i| &self.connections[i])
    }

    /// Returns an iterator over all connections, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns the longest delay in steps, or 0 if there is no connection.
    pub fn max_delay_steps(&self) -> Step {
        self.max_delay_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SynapseType;
    use crate::time::Resolution;

    fn conn(id: u64, source: u64, target: u64, delay: f64) -> Connection {
        Connection::build(
            id,
            NodeId(source),
            NodeId(target),
            0,
            1.0,
            delay,
            SynapseType::StaticSynapse,
            &Resolution::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_append_and_flush() {
        let mut store = ConnectionStore::new();
        store.batch_append(vec![conn(0, 1, 2, 1.0), conn(1, 1, 3, 2.5), conn(2, 4, 2, 0.1)]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.pending(), 3);
        assert_eq!(store.outgoing(NodeId(1)).count(), 0);

        assert_eq!(store.flush(), 3);
        assert_eq!(store.pending(), 0);
        let targets: Vec<NodeId> = store.outgoing(NodeId(1)).map(|c| c.target()).collect();
        assert_eq!(targets, vec![NodeId(2), NodeId(3)]);
        assert_eq!(store.outgoing(NodeId(7)).count(), 0);
        assert_eq!(store.max_delay_steps(), 25);

        store.batch_append(vec![conn(3, 1, 5, 1.0)]);
        assert_eq!(store.flush(), 1);
        assert_eq!(store.outgoing(NodeId(1)).count(), 3);
        assert_eq!(store.iter().map(|c| c.id()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}

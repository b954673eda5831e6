//! Ring buffer of pending events.
//!
//! Events are filed under their delivery step modulo the buffer length. Since every event is
//! delivered at least one and at most `max_delay` steps after it is filed, a buffer of
//! `max_delay + 1` slots never mixes events due at different steps.
use crate::event::PendingEvent;
use crate::time::Step;

#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer {
    slots: Vec<Vec<PendingEvent>>,
}

impl RingBuffer {
    /// Create a buffer for delays up to `max_delay` steps.
    pub fn new(max_delay: Step) -> Self {
        RingBuffer {
            slots: vec![vec![]; max_delay as usize + 1],
        }
    }

    /// Returns the longest delay the buffer can hold.
    pub fn max_delay(&self) -> Step {
        self.slots.len() as Step - 1
    }

    /// Grow the buffer to hold delays up to `max_delay` steps, keeping all pending events.
    pub fn resize(&mut self, max_delay: Step) {
        if max_delay <= self.max_delay() {
            return;
        }
        let pending: Vec<PendingEvent> = self.slots.drain(..).flatten().collect();
        self.slots = vec![vec![]; max_delay as usize + 1];
        for event in pending {
            self.push(event);
        }
    }

    /// File an event under its delivery step.
    pub fn push(&mut self, event: PendingEvent) {
        let len = self.slots.len() as Step;
        self.slots[(event.delivery % len) as usize].push(event);
    }

    /// Remove and return all events due at the given step.
    pub fn take(&mut self, step: Step) -> Vec<PendingEvent> {
        let len = self.slots.len() as Step;
        std::mem::take(&mut self.slots[(step % len) as usize])
    }

    /// Returns the number of pending events.
    pub fn len(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Vec::is_empty)
    }

    /// Drop all pending events.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Emission;
    use crate::registry::NodeId;

    fn event(delivery: Step) -> PendingEvent {
        PendingEvent {
            source: NodeId(1),
            target: NodeId(2),
            receptor: 0,
            connection_id: delivery,
            delivery,
            stamp: 1,
            offset: 0.0,
            weight: 1.0,
            emission: Emission::Spike {
                multiplicity: 1,
                offset: 0.0,
            },
        }
    }

    #[test]
    fn test_push_take() {
        let mut ring = RingBuffer::new(3);
        ring.push(event(1));
        ring.push(event(3));
        ring.push(event(3));
        assert_eq!(ring.len(), 3);
        assert!(ring.take(0).is_empty());
        assert_eq!(ring.take(1).len(), 1);
        assert!(ring.take(2).is_empty());
        assert_eq!(ring.take(3).len(), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_resize_keeps_events() {
        let mut ring = RingBuffer::new(2);
        ring.push(event(11));
        ring.push(event(12));
        ring.resize(5);
        assert_eq!(ring.max_delay(), 5);
        ring.push(event(15));
        assert_eq!(ring.take(11).len(), 1);
        assert_eq!(ring.take(12).len(), 1);
        assert_eq!(ring.take(15)[0].delivery, 15);
        ring.resize(1);
        assert_eq!(ring.max_delay(), 5);
    }
}

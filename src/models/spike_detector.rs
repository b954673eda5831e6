//! Spike detector: records the spikes it receives.
//!
//! A spike with multiplicity `m` counts as `m` events. Events are kept in memory (unless
//! `to_memory` is unset) and can be read through the `events` dictionary, with the `senders` and
//! `times` of all recorded spikes. Setting `n_events` to 0 clears the recorder; no other value is
//! accepted.
use crate::error::KernelError;
use crate::event::{Emission, Event, EventKind, Signal};
use crate::models::device::{self, ActivityWindow};
use crate::models::{Node, UpdateContext};
use crate::status::{get_bool, get_i64, ParamSpec, Status, Value};
use crate::time::Resolution;

pub const NAME: &str = "spike_detector";

pub const SCHEMA: &[ParamSpec] = &[
    ParamSpec::boolean("to_memory"),
    ParamSpec::int("n_events").min(0.0).max(0.0),
    ParamSpec::dict("events").read_only(),
    device::ORIGIN,
    device::START,
    device::STOP,
];

pub fn build(resolution: Resolution) -> Box<dyn Node> {
    Box::new(SpikeDetector::new(resolution))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpikeDetector {
    resolution: Resolution,
    to_memory: bool,
    window: ActivityWindow,
    n_events: u64,
    senders: Vec<i64>,
    times: Vec<f64>,
}

impl SpikeDetector {
    pub fn new(resolution: Resolution) -> Self {
        SpikeDetector {
            resolution,
            to_memory: true,
            window: ActivityWindow::new(),
            n_events: 0,
            senders: vec![],
            times: vec![],
        }
    }

    /// Returns the number of recorded events since the last clearing.
    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    fn check_n_events(status: &Status) -> Result<(), KernelError> {
        match get_i64(status, "n_events") {
            Some(n) if n != 0 => Err(KernelError::InvalidParameter(format!(
                "{}.n_events can only be set to 0, got {}",
                NAME, n
            ))),
            _ => Ok(()),
        }
    }
}

impl Node for SpikeDetector {
    fn get_status(&self, status: &mut Status) {
        status.insert("to_memory".into(), self.to_memory.into());
        status.insert("n_events".into(), self.n_events.into());
        let mut events = Status::new();
        events.insert("senders".into(), Value::Ints(self.senders.clone()));
        events.insert("times".into(), Value::Doubles(self.times.clone()));
        status.insert("events".into(), events.into());
        self.window.get_status(status);
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        Self::check_n_events(status)?;
        self.window.updated(status, &self.resolution).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        Self::check_n_events(status)?;
        self.window = self.window.updated(status, &self.resolution)?;
        self.to_memory = get_bool(status, "to_memory").unwrap_or(self.to_memory);
        if get_i64(status, "n_events").is_some() {
            self.n_events = 0;
            self.senders.clear();
            self.times.clear();
        }
        Ok(())
    }

    fn handles(&self, kind: EventKind, receptor: usize) -> bool {
        kind == EventKind::Spike && receptor == 0
    }

    fn handle(&mut self, event: &Event) {
        if !self.window.contains_stamp(event.stamp) {
            return;
        }
        if let Signal::Spike { multiplicity } = event.signal {
            self.n_events += multiplicity as u64;
            if self.to_memory {
                let time = event.time(&self.resolution);
                for _ in 0..multiplicity {
                    self.senders.push(event.source.0 as i64);
                    self.times.push(time);
                }
            }
        }
    }

    fn update(&mut self, _ctx: &mut UpdateContext) -> Vec<Emission> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeId;
    use crate::status;
    use crate::status::get_f64_vec;

    fn spike(source: u64, stamp: u64, multiplicity: u32) -> Event {
        Event {
            source: NodeId(source),
            receptor: 0,
            stamp,
            offset: 0.0,
            weight: 1.0,
            signal: Signal::Spike { multiplicity },
        }
    }

    #[test]
    fn test_record_and_clear() {
        let mut detector = SpikeDetector::new(Resolution::default());
        detector.handle(&spike(3, 10, 1));
        detector.handle(&spike(4, 12, 2));
        assert_eq!(detector.n_events(), 3);

        let mut status = Status::new();
        detector.get_status(&mut status);
        let events = status.get("events").and_then(Value::as_dict).unwrap();
        assert_eq!(events.get("senders"), Some(&Value::Ints(vec![3, 4, 4])));
        let times = get_f64_vec(events, "times").unwrap();
        assert_eq!(times.len(), 3);
        assert!((times[1] - 1.2).abs() < 1e-12);

        detector.set_status(&status! { "n_events" => 0 }).unwrap();
        assert_eq!(detector.n_events(), 0);
        // clearing twice is harmless
        detector.set_status(&status! { "n_events" => 0 }).unwrap();
        assert_eq!(detector.n_events(), 0);

        assert!(matches!(
            detector.set_status(&status! { "n_events" => 5 }),
            Err(KernelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_without_memory() {
        let mut detector = SpikeDetector::new(Resolution::default());
        detector.set_status(&status! { "to_memory" => false }).unwrap();
        detector.handle(&spike(3, 10, 2));
        assert_eq!(detector.n_events(), 2);
        assert!(detector.times.is_empty());
    }

    #[test]
    fn test_recording_window() {
        let mut detector = SpikeDetector::new(Resolution::default());
        detector
            .set_status(&status! { "start" => 1.0, "stop" => 2.0 })
            .unwrap();
        for stamp in [5, 10, 11, 20, 21] {
            detector.handle(&spike(1, stamp, 1));
        }
        assert_eq!(detector.n_events(), 2);
    }
}

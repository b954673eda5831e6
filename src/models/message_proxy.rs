//! Message port proxies.
//!
//! `message_in_proxy` buffers the messages arriving on an input port, `message_out_proxy` sends
//! queued messages through an output port once simulation time reaches them. A port is published
//! when the first simulation run starts; from then on, `port_name` and `max_buffered` are frozen.
//! When a buffer holds `max_buffered` messages (`-1` means unlimited), the `overflow` policy
//! decides whether the oldest buffered message or the incoming one is dropped. Dropped messages
//! are counted in `n_dropped`.
use log;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender};

use crate::error::KernelError;
use crate::event::Emission;
use crate::message::{Message, OverflowPolicy};
use crate::models::{CalibrateContext, Node, UpdateContext};
use crate::status::{get_f64_vec, get_i64, get_string, get_string_vec, ParamSpec, Status, Value};
use crate::time::Resolution;

pub const IN_NAME: &str = "message_in_proxy";
pub const OUT_NAME: &str = "message_out_proxy";

pub const IN_SCHEMA: &[ParamSpec] = &[
    ParamSpec::string("port_name"),
    ParamSpec::int("max_buffered").min(-1.0),
    ParamSpec::string("overflow"),
    ParamSpec::int("n_messages").min(0.0).max(0.0),
    ParamSpec::int("n_dropped").read_only(),
    ParamSpec::dict("data").read_only(),
    ParamSpec::boolean("published").read_only(),
];

pub const OUT_SCHEMA: &[ParamSpec] = &[
    ParamSpec::string("port_name"),
    ParamSpec::int("max_buffered").min(-1.0),
    ParamSpec::string("overflow"),
    ParamSpec::strings("messages"),
    ParamSpec::doubles("message_times").min(0.0),
    ParamSpec::int("n_messages").read_only(),
    ParamSpec::int("n_dropped").read_only(),
    ParamSpec::dict("data").read_only(),
    ParamSpec::boolean("published").read_only(),
];

pub fn build_in(_resolution: Resolution) -> Box<dyn Node> {
    Box::new(MessageInProxy::new())
}

pub fn build_out(resolution: Resolution) -> Box<dyn Node> {
    Box::new(MessageOutProxy::new(resolution))
}

/// Port settings shared by both proxies.
#[derive(Debug, Clone, PartialEq)]
struct PortSettings {
    port_name: String,
    max_buffered: i64,
    overflow: OverflowPolicy,
    published: bool,
}

impl PortSettings {
    fn new(port_name: &str) -> Self {
        PortSettings {
            port_name: port_name.to_string(),
            max_buffered: -1,
            overflow: OverflowPolicy::default(),
            published: false,
        }
    }

    fn updated(&self, model: &str, status: &Status) -> Result<Self, KernelError> {
        let mut s = self.clone();
        s.port_name = get_string(status, "port_name").unwrap_or(s.port_name);
        s.max_buffered = get_i64(status, "max_buffered").unwrap_or(s.max_buffered);
        if let Some(name) = get_string(status, "overflow") {
            s.overflow = OverflowPolicy::parse(&name)?;
        }
        if self.published
            && (s.port_name != self.port_name || s.max_buffered != self.max_buffered)
        {
            return Err(KernelError::InvalidParameter(format!(
                "{}: port_name and max_buffered cannot be changed once port '{}' is published",
                model, self.port_name
            )));
        }
        Ok(s)
    }

    fn get_status(&self, status: &mut Status) {
        status.insert("port_name".into(), self.port_name.clone().into());
        status.insert("max_buffered".into(), self.max_buffered.into());
        status.insert("overflow".into(), self.overflow.as_str().into());
        status.insert("published".into(), self.published.into());
    }

    /// Push a message into a bounded buffer. Returns false if a message was dropped.
    fn push(&self, buffer: &mut VecDeque<Message>, message: Message) -> bool {
        if self.max_buffered < 0 || buffer.len() < self.max_buffered as usize {
            buffer.push_back(message);
            return true;
        }
        if self.overflow == OverflowPolicy::DropOldest && self.max_buffered > 0 {
            buffer.pop_front();
            buffer.push_back(message);
        }
        false
    }
}

fn data_status(messages: &VecDeque<Message>) -> Status {
    let mut data = Status::new();
    data.insert(
        "messages".into(),
        Value::Strings(messages.iter().map(|m| m.text.clone()).collect()),
    );
    data.insert(
        "message_times".into(),
        Value::Doubles(messages.iter().map(|m| m.time).collect()),
    );
    data
}

/// Buffers messages received on an input port.
#[derive(Debug)]
pub struct MessageInProxy {
    settings: PortSettings,
    receiver: Option<Receiver<Message>>,
    buffer: VecDeque<Message>,
    n_messages: u64,
    n_dropped: u64,
}

impl MessageInProxy {
    pub fn new() -> Self {
        MessageInProxy {
            settings: PortSettings::new("message_in"),
            receiver: None,
            buffer: VecDeque::new(),
            n_messages: 0,
            n_dropped: 0,
        }
    }

    fn check_n_messages(status: &Status) -> Result<(), KernelError> {
        match get_i64(status, "n_messages") {
            Some(n) if n != 0 => Err(KernelError::InvalidParameter(format!(
                "{}.n_messages can only be set to 0, got {}",
                IN_NAME, n
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for MessageInProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for MessageInProxy {
    fn get_status(&self, status: &mut Status) {
        self.settings.get_status(status);
        status.insert("n_messages".into(), self.n_messages.into());
        status.insert("n_dropped".into(), self.n_dropped.into());
        status.insert("data".into(), data_status(&self.buffer).into());
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        Self::check_n_messages(status)?;
        self.settings.updated(IN_NAME, status).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        Self::check_n_messages(status)?;
        self.settings = self.settings.updated(IN_NAME, status)?;
        if get_i64(status, "n_messages").is_some() {
            self.buffer.clear();
            self.n_messages = 0;
            self.n_dropped = 0;
        }
        Ok(())
    }

    fn calibrate(&mut self, ctx: &mut CalibrateContext) -> Result<(), KernelError> {
        if !self.settings.published {
            self.receiver = Some(ctx.ports.publish_input(&self.settings.port_name)?);
            self.settings.published = true;
            log::debug!("Input port {} published", self.settings.port_name);
        }
        Ok(())
    }

    fn update(&mut self, _ctx: &mut UpdateContext) -> Vec<Emission> {
        if let Some(receiver) = self.receiver.as_ref() {
            for message in receiver.try_iter() {
                self.n_messages += 1;
                if !self.settings.push(&mut self.buffer, message) {
                    self.n_dropped += 1;
                }
            }
        }
        vec![]
    }
}

/// Sends queued messages through an output port.
#[derive(Debug)]
pub struct MessageOutProxy {
    resolution: Resolution,
    settings: PortSettings,
    sender: Option<Sender<Message>>,
    queue: VecDeque<Message>,
    n_messages: u64,
    n_dropped: u64,
}

impl MessageOutProxy {
    pub fn new(resolution: Resolution) -> Self {
        MessageOutProxy {
            resolution,
            settings: PortSettings::new("message_out"),
            sender: None,
            queue: VecDeque::new(),
            n_messages: 0,
            n_dropped: 0,
        }
    }

    fn messages(status: &Status) -> Result<Option<Vec<Message>>, KernelError> {
        let texts = get_string_vec(status, "messages");
        let times = get_f64_vec(status, "message_times");
        match (texts, times) {
            (None, None) => Ok(None),
            (Some(texts), Some(times)) if texts.len() == times.len() => {
                let mut messages: Vec<Message> = times
                    .into_iter()
                    .zip(texts)
                    .map(|(time, text)| Message::new(time, text))
                    .collect();
                messages.sort_by(|a, b| a.time.total_cmp(&b.time));
                Ok(Some(messages))
            }
            (Some(texts), Some(times)) => Err(KernelError::InvalidParameter(format!(
                "{}: messages and message_times must have the same length, got {} and {}",
                OUT_NAME,
                texts.len(),
                times.len()
            ))),
            _ => Err(KernelError::InvalidParameter(format!(
                "{}: messages and message_times must be set together",
                OUT_NAME
            ))),
        }
    }
}

impl Node for MessageOutProxy {
    fn get_status(&self, status: &mut Status) {
        self.settings.get_status(status);
        status.insert("n_messages".into(), self.n_messages.into());
        status.insert("n_dropped".into(), self.n_dropped.into());
        status.insert("data".into(), data_status(&self.queue).into());
    }

    fn check_status(&self, status: &Status) -> Result<(), KernelError> {
        Self::messages(status)?;
        self.settings.updated(OUT_NAME, status).map(|_| ())
    }

    fn set_status(&mut self, status: &Status) -> Result<(), KernelError> {
        let messages = Self::messages(status)?;
        self.settings = self.settings.updated(OUT_NAME, status)?;
        for message in messages.into_iter().flatten() {
            // keep the queue sorted by time
            let position = self.queue.partition_point(|m| m.time <= message.time);
            if position == self.queue.len() {
                if !self.settings.push(&mut self.queue, message) {
                    self.n_dropped += 1;
                }
            } else {
                self.queue.insert(position, message);
                if self.settings.max_buffered >= 0
                    && self.queue.len() > self.settings.max_buffered as usize
                {
                    match self.settings.overflow {
                        OverflowPolicy::DropOldest => self.queue.pop_front(),
                        OverflowPolicy::Reject => self.queue.remove(position),
                    };
                    self.n_dropped += 1;
                }
            }
        }
        Ok(())
    }

    fn calibrate(&mut self, ctx: &mut CalibrateContext) -> Result<(), KernelError> {
        if !self.settings.published {
            self.sender = Some(ctx.ports.publish_output(&self.settings.port_name)?);
            self.settings.published = true;
            log::debug!("Output port {} published", self.settings.port_name);
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut UpdateContext) -> Vec<Emission> {
        let Some(sender) = self.sender.as_ref() else {
            return vec![];
        };
        let end = self.resolution.time_of(ctx.step + 1);
        while let Some(message) = self.queue.front() {
            if message.time > end {
                break;
            }
            if let Some(message) = self.queue.pop_front() {
                match sender.send(message) {
                    Ok(()) => self.n_messages += 1,
                    Err(e) => {
                        log::warn!(
                            "Message dropped on port {}: {}",
                            self.settings.port_name,
                            e
                        );
                        self.n_dropped += 1;
                    }
                }
            }
        }
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageHub;
    use crate::random::{KernelRng, RngType};
    use crate::status;

    fn calibrate(node: &mut dyn Node, ports: &mut MessageHub) -> Result<(), KernelError> {
        let mut ctx = CalibrateContext { now: 0, ports };
        node.calibrate(&mut ctx)
    }

    fn run(node: &mut dyn Node, steps: std::ops::Range<u64>) {
        let mut rng = KernelRng::new(RngType::ChaCha8, 0, 0);
        for step in steps {
            let mut ctx = UpdateContext { step, rng: &mut rng };
            node.update(&mut ctx);
        }
    }

    fn data(node: &dyn Node) -> (Vec<String>, u64, u64) {
        let mut status = Status::new();
        node.get_status(&mut status);
        let data = status.get("data").and_then(Value::as_dict).unwrap();
        (
            get_string_vec(data, "messages").unwrap(),
            get_i64(&status, "n_messages").unwrap() as u64,
            get_i64(&status, "n_dropped").unwrap() as u64,
        )
    }

    #[test]
    fn test_in_proxy_drop_oldest() {
        let mut ports = MessageHub::new();
        let mut proxy = MessageInProxy::new();
        proxy
            .set_status(&status! { "port_name" => "in", "max_buffered" => 2 })
            .unwrap();
        calibrate(&mut proxy, &mut ports).unwrap();

        let sender = ports.input_sender("in");
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            sender.send(Message::new(i as f64, *text)).unwrap();
        }
        run(&mut proxy, 0..1);
        assert_eq!(data(&proxy), (vec!["b".to_string(), "c".to_string()], 3, 1));

        proxy.set_status(&status! { "n_messages" => 0 }).unwrap();
        assert_eq!(data(&proxy), (vec![], 0, 0));
    }

    #[test]
    fn test_in_proxy_reject() {
        let mut ports = MessageHub::new();
        let mut proxy = MessageInProxy::new();
        proxy
            .set_status(&status! { "max_buffered" => 2, "overflow" => "reject" })
            .unwrap();
        calibrate(&mut proxy, &mut ports).unwrap();
        let sender = ports.input_sender("message_in");
        for text in ["a", "b", "c"] {
            sender.send(Message::new(0.0, text)).unwrap();
        }
        run(&mut proxy, 0..1);
        assert_eq!(data(&proxy), (vec!["a".to_string(), "b".to_string()], 3, 1));
    }

    #[test]
    fn test_port_frozen_after_publish() {
        let mut ports = MessageHub::new();
        let mut proxy = MessageInProxy::new();
        calibrate(&mut proxy, &mut ports).unwrap();
        assert!(matches!(
            proxy.set_status(&status! { "port_name" => "other" }),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(proxy.set_status(&status! { "max_buffered" => 10 }).is_err());
        assert!(proxy.set_status(&status! { "overflow" => "reject" }).is_ok());

        // a second proxy cannot publish the same port
        let mut other = MessageInProxy::new();
        assert!(matches!(
            calibrate(&mut other, &mut ports),
            Err(KernelError::PortUnavailable(_))
        ));
    }

    #[test]
    fn test_out_proxy() {
        let mut ports = MessageHub::new();
        let mut proxy = MessageOutProxy::new(Resolution::default());
        proxy
            .set_status(&status! {
                "messages" => vec!["late", "early"],
                "message_times" => vec![2.0, 0.5],
            })
            .unwrap();
        calibrate(&mut proxy, &mut ports).unwrap();
        let receiver = ports.output_receiver("message_out").unwrap();

        run(&mut proxy, 0..10);
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![Message::new(0.5, "early")]);
        run(&mut proxy, 10..20);
        assert_eq!(receiver.try_iter().collect::<Vec<_>>(), vec![Message::new(2.0, "late")]);
        assert_eq!(data(&proxy), (vec![], 2, 0));
    }

    #[test]
    fn test_out_proxy_invalid_messages() {
        let mut proxy = MessageOutProxy::new(Resolution::default());
        assert!(proxy
            .set_status(&status! { "messages" => vec!["a", "b"], "message_times" => vec![1.0] })
            .is_err());
        assert!(proxy.set_status(&status! { "messages" => vec!["a"] }).is_err());
    }

    #[test]
    fn test_out_proxy_overflow() {
        let mut proxy = MessageOutProxy::new(Resolution::default());
        proxy
            .set_status(&status! {
                "max_buffered" => 2,
                "messages" => vec!["a", "b", "c"],
                "message_times" => vec![1.0, 2.0, 3.0],
            })
            .unwrap();
        assert_eq!(data(&proxy), (vec!["b".to_string(), "c".to_string()], 0, 1));
    }
}

//! Message ports.
//!
//! Message proxies exchange timestamped text messages with a co-process through named ports.
//! Here, the co-process is any code holding the external end of an in-process channel: the
//! [`Sender`] of an input port or the [`Receiver`] of an output port.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::error::KernelError;

/// A timestamped message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Time in ms.
    pub time: f64,
    pub text: String,
}

impl Message {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Message {
            time,
            text: text.into(),
        }
    }
}

/// What to do when a proxy buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest buffered message to make room.
    #[default]
    DropOldest,
    /// Discard the incoming message.
    Reject,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowPolicy::DropOldest => "drop_oldest",
            OverflowPolicy::Reject => "reject",
        }
    }

    pub fn parse(name: &str) -> Result<Self, KernelError> {
        match name {
            "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "reject" => Ok(OverflowPolicy::Reject),
            _ => Err(KernelError::InvalidParameter(format!(
                "unknown overflow policy '{}', expected 'drop_oldest' or 'reject'",
                name
            ))),
        }
    }
}

/// The registry of named ports of a kernel.
///
/// Each port name can be published once per direction. The kernel-side end is handed to the
/// proxy at publication, the external end is handed out on request and can be requested before
/// or after publication.
#[derive(Debug, Default)]
pub struct MessageHub {
    inputs: HashMap<String, InputPort>,
    outputs: HashMap<String, OutputPort>,
}

#[derive(Debug)]
struct InputPort {
    sender: Sender<Message>,
    receiver: Option<Receiver<Message>>,
}

#[derive(Debug)]
struct OutputPort {
    sender: Option<Sender<Message>>,
    receiver: Option<Receiver<Message>>,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn input(&mut self, port: &str) -> &mut InputPort {
        self.inputs.entry(port.to_string()).or_insert_with(|| {
            let (sender, receiver) = channel();
            InputPort {
                sender,
                receiver: Some(receiver),
            }
        })
    }

    fn output(&mut self, port: &str) -> &mut OutputPort {
        self.outputs.entry(port.to_string()).or_insert_with(|| {
            let (sender, receiver) = channel();
            OutputPort {
                sender: Some(sender),
                receiver: Some(receiver),
            }
        })
    }

    /// Returns a sender feeding the given input port. Any number of senders can be handed out.
    pub fn input_sender(&mut self, port: &str) -> Sender<Message> {
        self.input(port).sender.clone()
    }

    /// Publish an input port, returning the receiving end for the proxy.
    /// Returns an error if the port was already published.
    pub fn publish_input(&mut self, port: &str) -> Result<Receiver<Message>, KernelError> {
        self.input(port).receiver.take().ok_or_else(|| {
            KernelError::PortUnavailable(format!("input port '{}' is already published", port))
        })
    }

    /// Returns the receiving end of the given output port.
    /// Returns an error if the receiver was already handed out.
    pub fn output_receiver(&mut self, port: &str) -> Result<Receiver<Message>, KernelError> {
        self.output(port).receiver.take().ok_or_else(|| {
            KernelError::PortUnavailable(format!(
                "the receiver of output port '{}' is already in use",
                port
            ))
        })
    }

    /// Publish an output port, returning the sending end for the proxy.
    /// Returns an error if the port was already published.
    pub fn publish_output(&mut self, port: &str) -> Result<Sender<Message>, KernelError> {
        self.output(port).sender.take().ok_or_else(|| {
            KernelError::PortUnavailable(format!("output port '{}' is already published", port))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_port() {
        let mut hub = MessageHub::new();
        let sender = hub.input_sender("in");
        sender.send(Message::new(1.0, "early")).unwrap();

        let receiver = hub.publish_input("in").unwrap();
        hub.input_sender("in").send(Message::new(2.0, "late")).unwrap();
        let received: Vec<Message> = receiver.try_iter().collect();
        assert_eq!(
            received,
            vec![Message::new(1.0, "early"), Message::new(2.0, "late")]
        );

        assert!(matches!(
            hub.publish_input("in"),
            Err(KernelError::PortUnavailable(_))
        ));
    }

    #[test]
    fn test_output_port() {
        let mut hub = MessageHub::new();
        let sender = hub.publish_output("out").unwrap();
        assert!(hub.publish_output("out").is_err());
        sender.send(Message::new(0.5, "hello")).unwrap();

        let receiver = hub.output_receiver("out").unwrap();
        assert_eq!(receiver.try_recv().unwrap(), Message::new(0.5, "hello"));
        assert!(hub.output_receiver("out").is_err());
    }

    #[test]
    fn test_overflow_policy() {
        assert_eq!(
            OverflowPolicy::parse("reject"),
            Ok(OverflowPolicy::Reject)
        );
        assert_eq!(OverflowPolicy::default().as_str(), "drop_oldest");
        assert!(OverflowPolicy::parse("block").is_err());
    }
}

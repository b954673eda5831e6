//! Error module for the Rusty NEST kernel.
use std::error::Error;
use std::fmt;

/// The broad category of a kernel error.
///
/// Errors are local to the call that triggered them, except for [`ErrorKind::Scheduling`] errors
/// caused by a clock overflow, which invalidate the whole kernel until it is reset.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Bad kernel configuration, surfaced before any simulation starts.
    Configuration,
    /// Unknown model or invalid model parameter.
    Model,
    /// Invalid connection request.
    Connectivity,
    /// Invalid simulation request or broken clock.
    Scheduling,
    /// Failure while reading or writing files.
    IO,
}

/// Error types for the library.
#[derive(Debug, PartialEq, Clone)]
pub enum KernelError {
    /// Error for an invalid kernel configuration, e.g., zero workers or a non-positive resolution.
    InvalidConfiguration(String),
    /// Error for a model name which is not registered.
    UnknownModel(String),
    /// Error for a parameter violating the declared schema of a model (unknown key, wrong type, out of range).
    InvalidParameter(String),
    /// Error for a node handle which was never created.
    UnknownNode(u64),
    /// Error for a node handle created before the last kernel reset.
    StaleHandle(u64),
    /// Error for a layer handle which does not exist.
    UnknownLayer(usize),
    /// Error for one-to-one connections between sequences of different lengths.
    LengthMismatch { expected: usize, found: usize },
    /// Error for a delay which is non-positive or not representable at the simulation resolution.
    InvalidDelay(String),
    /// Error for a non-finite weight.
    InvalidWeight(String),
    /// Error for a connection whose target cannot handle what the source emits.
    IllegalConnection(String),
    /// Error for a message port which is already in use.
    PortUnavailable(String),
    /// Error for a negative simulation duration.
    NegativeDuration(f64),
    /// Error for a simulation which would run the clock past its maximum representable step.
    ClockOverflow { now: u64, requested: u64, max: u64 },
    /// Error for any operation on a kernel invalidated by a clock overflow.
    KernelInvalidated,
    /// Error for I/O operations.
    IOError(String),
}

impl KernelError {
    /// Returns the category of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::InvalidConfiguration(_) => ErrorKind::Configuration,
            KernelError::UnknownModel(_) | KernelError::InvalidParameter(_) => ErrorKind::Model,
            KernelError::UnknownNode(_)
            | KernelError::StaleHandle(_)
            | KernelError::UnknownLayer(_)
            | KernelError::LengthMismatch { .. }
            | KernelError::InvalidDelay(_)
            | KernelError::InvalidWeight(_)
            | KernelError::IllegalConnection(_)
            | KernelError::PortUnavailable(_) => ErrorKind::Connectivity,
            KernelError::NegativeDuration(_)
            | KernelError::ClockOverflow { .. }
            | KernelError::KernelInvalidated => ErrorKind::Scheduling,
            KernelError::IOError(_) => ErrorKind::IO,
        }
    }

    /// Returns true if the error leaves the kernel unusable until it is reset.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KernelError::ClockOverflow { .. } | KernelError::KernelInvalidated
        )
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::InvalidConfiguration(e) => write!(f, "Invalid configuration: {}", e),
            KernelError::UnknownModel(e) => write!(f, "Unknown model: {}", e),
            KernelError::InvalidParameter(e) => write!(f, "Invalid parameter: {}", e),
            KernelError::UnknownNode(id) => write!(f, "Unknown node: {}", id),
            KernelError::StaleHandle(id) => {
                write!(f, "Node {} was created before the last kernel reset", id)
            }
            KernelError::UnknownLayer(id) => write!(f, "Unknown layer: {}", id),
            KernelError::LengthMismatch { expected, found } => write!(
                f,
                "Length mismatch: one-to-one connection requires {} targets, found {}",
                expected, found
            ),
            KernelError::InvalidDelay(e) => write!(f, "Invalid delay: {}", e),
            KernelError::InvalidWeight(e) => write!(f, "Invalid weight: {}", e),
            KernelError::IllegalConnection(e) => write!(f, "Illegal connection: {}", e),
            KernelError::PortUnavailable(e) => write!(f, "Message port unavailable: {}", e),
            KernelError::NegativeDuration(d) => {
                write!(f, "Simulation duration must be non-negative, got {}", d)
            }
            KernelError::ClockOverflow {
                now,
                requested,
                max,
            } => write!(
                f,
                "Clock overflow: {} steps requested at step {}, but the clock cannot exceed {} steps; reset the kernel",
                requested, now, max
            ),
            KernelError::KernelInvalidated => {
                write!(f, "The kernel was invalidated by a clock overflow and must be reset")
            }
            KernelError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for KernelError {}

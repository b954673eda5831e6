//! Kernel configuration.
//!
//! The configuration is fixed when a kernel is constructed; changing it requires a full reset
//! with [`crate::kernel::Kernel::reset_with`]. Only the verbosity can be adjusted at runtime.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::distribution::Partition;
use crate::error::KernelError;
use crate::random::RngType;
use crate::time::{Resolution, Step};

/// Default maximum number of steps, i.e., about 2^53 steps so that step times remain exact in ms.
pub const DEFAULT_MAX_STEPS: Step = 1 << 53;

/// Severity levels of kernel messages, ordered from the most verbose to the least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    All,
    #[default]
    Info,
    Deprecated,
    Warning,
    Error,
    Fatal,
    /// Suppress all messages.
    Quiet,
}

impl Verbosity {
    /// Returns the `log` level used to forward a message of this severity, if any.
    pub fn log_level(&self) -> Option<log::Level> {
        match self {
            Verbosity::All => Some(log::Level::Debug),
            Verbosity::Info => Some(log::Level::Info),
            Verbosity::Deprecated | Verbosity::Warning => Some(log::Level::Warn),
            Verbosity::Error | Verbosity::Fatal => Some(log::Level::Error),
            Verbosity::Quiet => None,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Verbosity::All => "M_ALL",
            Verbosity::Info => "M_INFO",
            Verbosity::Deprecated => "M_DEPRECATED",
            Verbosity::Warning => "M_WARNING",
            Verbosity::Error => "M_ERROR",
            Verbosity::Fatal => "M_FATAL",
            Verbosity::Quiet => "M_QUIET",
        };
        write!(f, "{}", name)
    }
}

/// The configuration of a kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Number of parallel workers, each owning a share of the nodes.
    pub num_workers: usize,
    /// Length of one simulation step in ms.
    pub resolution: f64,
    /// Largest step the clock may reach.
    pub max_steps: Step,
    /// Messages below this level are dropped.
    pub verbosity: Verbosity,
    /// Seed of all random streams.
    pub seed: u64,
    pub rng_type: RngType,
    /// How nodes are assigned to workers.
    pub partition: Partition,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            num_workers: 1,
            resolution: 0.1,
            max_steps: DEFAULT_MAX_STEPS,
            verbosity: Verbosity::default(),
            seed: 0,
            rng_type: RngType::default(),
            partition: Partition::default(),
        }
    }
}

impl KernelConfig {
    /// Returns the default configuration with the given number of workers.
    pub fn with_workers(num_workers: usize) -> Self {
        KernelConfig {
            num_workers,
            ..Default::default()
        }
    }

    /// Check the configuration.
    /// The function returns an error for zero workers, a non-positive resolution, a zero maximum
    /// number of steps, or a block partition with zero-sized blocks.
    pub fn validate(&self) -> Result<Resolution, KernelError> {
        if self.num_workers == 0 {
            return Err(KernelError::InvalidConfiguration(
                "the number of workers must be positive".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(KernelError::InvalidConfiguration(
                "the maximum number of steps must be positive".to_string(),
            ));
        }
        if let Partition::Block { block_size: 0 } = self.partition {
            return Err(KernelError::InvalidConfiguration(
                "the block size of a block partition must be positive".to_string(),
            ));
        }
        Resolution::new(self.resolution)
    }

    /// Save the configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), KernelError> {
        let file = File::create(path).map_err(|e| KernelError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| KernelError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| KernelError::IOError(e.to_string()))
    }

    /// Load a configuration from a file. Missing fields take their default value.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, KernelError> {
        let file = File::open(path).map_err(|e| KernelError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| KernelError::IOError(e.to_string()))
    }
}

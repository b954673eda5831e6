//! Random number streams.
//!
//! Every node owns its own generator, seeded from the kernel seed and the node handle. Draws
//! made on behalf of a node (noise currents, Poisson spike counts, topological connection
//! probabilities) therefore never depend on how nodes are distributed over workers.
pub mod knuth_lfg;

use rand::RngCore;
use rand_chacha::rand_core::{Error, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub use knuth_lfg::KnuthLfg;

/// Stream offset reserved for pairwise `connect` calls, so they never share a stream with a node.
pub const CONNECT_STREAM_BASE: u64 = 1 << 62;

/// Stream offset reserved for layer connections. The stream of a driving node in the `n`-th
/// connect call is `LAYER_STREAM_BASE + (n << 32) + handle`.
pub const LAYER_STREAM_BASE: u64 = 1 << 61;

/// Returns the stream drawn from by a driving node during a layer connect call.
pub fn layer_stream(call: u64, driver: u64) -> u64 {
    LAYER_STREAM_BASE
        .wrapping_add(call.wrapping_shl(32))
        .wrapping_add(driver)
}

/// The type of generator used by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RngType {
    /// ChaCha with 8 rounds; streams are selected with `set_stream`.
    #[default]
    ChaCha8,
    /// Knuth's lagged Fibonacci generator; streams are selected by offsetting the seed.
    KnuthLfg,
}

/// A random number generator of one of the supported types.
#[derive(Debug, Clone)]
pub enum KernelRng {
    ChaCha8(ChaCha8Rng),
    KnuthLfg(KnuthLfg),
}

impl KernelRng {
    /// Returns the generator of the given stream.
    pub fn new(rng_type: RngType, seed: u64, stream: u64) -> Self {
        match rng_type {
            RngType::ChaCha8 => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(stream);
                KernelRng::ChaCha8(rng)
            }
            RngType::KnuthLfg => {
                KernelRng::KnuthLfg(KnuthLfg::new(seed.wrapping_add(stream.wrapping_mul(KNUTH_STREAM_SPACING))))
            }
        }
    }
}

/// Seed spacing between Knuth streams; Knuth guarantees distinct seeds give separated streams.
const KNUTH_STREAM_SPACING: u64 = 7919;

impl RngCore for KernelRng {
    fn next_u32(&mut self) -> u32 {
        match self {
            KernelRng::ChaCha8(rng) => rng.next_u32(),
            KernelRng::KnuthLfg(rng) => rng.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            KernelRng::ChaCha8(rng) => rng.next_u64(),
            KernelRng::KnuthLfg(rng) => rng.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            KernelRng::ChaCha8(rng) => rng.fill_bytes(dest),
            KernelRng::KnuthLfg(rng) => rng.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        match self {
            KernelRng::ChaCha8(rng) => rng.try_fill_bytes(dest),
            KernelRng::KnuthLfg(rng) => rng.try_fill_bytes(dest),
        }
    }
}

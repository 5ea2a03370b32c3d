//! Entropy-tracked pseudorandom generators.
//!
//! This module layers precise entropy bookkeeping and thread safety over a
//! raw bit source, and derives every higher-level value shape (bounded
//! integers, floats, Gaussian deviates, boolean trials, element picks, lazy
//! streams) from that source.
//!
//! # Components
//! - `tracked`: [`TrackedRng`], the lock-owning wrapper around a raw core.
//! - `distributions`: derived-value algorithms and their declared costs.
//! - `streams`: lazy iterator forms of the scalar operations.
//! - `aes_counter`: the AES counter-mode core and its public alias.
//!
//! # Design
//! - **One lock per generator**: raw state, entropy account and the Gaussian
//!   spare move together under a single mutex, so a concurrent reseed can
//!   never be observed half-applied.
//! - **Declared costs**: the account is debited by each operation's declared
//!   entropy cost, not by raw bits drawn; rejection re-draws are free.
//! - **Merge reseeds**: new seed material folds into existing state instead
//!   of replacing it, so resupplying an old seed can never rewind output.

pub mod aes_counter;
pub mod distributions;
pub mod streams;
#[cfg(test)]
pub(crate) mod testing;
pub mod tracked;

pub use aes_counter::{AesCounterRandom, AesCtrCore};
pub use distributions::{F32_ENTROPY_BITS, F64_ENTROPY_BITS};
pub use tracked::TrackedRng;

use core::fmt;

use crate::seed::SeedError;

/// Errors surfaced by generator construction and use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RngError {
    /// Seed length is outside the range the generator supports.
    InvalidSeed { len: usize, min: usize, max: usize },
    /// Seed material is absent or empty.
    EmptySeed,
    /// Bound arguments do not describe a non-empty range.
    InvalidRange,
    /// An external seed source failed to produce bytes.
    SeedGeneration(SeedError),
}

impl fmt::Display for RngError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RngError::InvalidSeed { len, min, max } => {
                write!(f, "seed of {} bytes outside supported {}..={} bytes", len, min, max)
            }
            RngError::EmptySeed => write!(f, "seed material is empty"),
            RngError::InvalidRange => write!(f, "bound arguments describe an empty range"),
            RngError::SeedGeneration(e) => write!(f, "seed generation failed: {}", e),
        }
    }
}

impl std::error::Error for RngError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RngError::SeedGeneration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SeedError> for RngError {
    fn from(e: SeedError) -> Self {
        RngError::SeedGeneration(e)
    }
}

/// Contract for a raw pseudorandom bit source driven by [`TrackedRng`].
///
/// Implementations produce raw 64-bit words and accept merge-style reseeds.
/// All locking, entropy accounting and distribution shaping happen in the
/// wrapper; a core is free to assume exclusive access.
pub trait RandomCore: Send {
    /// Identifier used in diagnostics and log lines.
    fn name(&self) -> &'static str;

    /// Produces the next 64 raw pseudorandom bits.
    fn next_raw(&mut self) -> u64;

    /// Merges new seed material into the current state. Never a wholesale
    /// replace: previously emitted output must stay unreachable.
    fn merge_seed(&mut self, seed: &[u8]) -> Result<(), RngError>;

    /// Merges a 64-bit fallback seed, the visibly smaller contribution.
    fn merge_seed_u64(&mut self, seed: u64);

    /// Preferred seed length, in bytes, for a full-state reseed.
    fn new_seed_length(&self) -> usize;

    /// Maximum entropy, in bits, the internal state can represent.
    fn max_state_bits(&self) -> i64;

    /// Snapshot of the state bytes that determine future output.
    fn seed_snapshot(&self) -> Vec<u8>;

    /// One-line diagnostic state description. Must not expose key material.
    fn dump_state(&self) -> String;
}

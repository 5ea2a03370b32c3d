//! Operating-system seed source.
//!
//! The default source: pulls bytes from the platform entropy facility via
//! `rand_core::OsRng`. Always worth trying; failures are only possible when
//! the OS interface itself breaks.

use rand_core::{OsRng, RngCore};

use super::{SeedError, SeedSource, SourceKey};

/// Seed source backed by the operating system's entropy facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSeedSource;

impl OsSeedSource {
    pub fn new() -> Self {
        Self
    }
}

impl SeedSource for OsSeedSource {
    fn generate_seed(&self, length: usize) -> Result<Vec<u8>, SeedError> {
        let mut buf = vec![0u8; length];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|_| SeedError::Unavailable)?;
        Ok(buf)
    }

    fn key(&self) -> SourceKey {
        // All instances read the same OS facility, so they share one key.
        SourceKey::new("os")
    }
}

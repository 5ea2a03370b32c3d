//! External seed sources.
//!
//! A seed source produces raw seed bytes on demand: from the operating
//! system, from a remote entropy service, or from another generator. The
//! core only observes success-with-bytes or failure; batching, retries and
//! rate limiting stay inside the source.
//!
//! # Design
//! - **Shared handles**: sources are `Send + Sync` and take `&self`, so one
//!   instance can serve application threads and the background seeder alike.
//! - **Value identity**: [`SourceKey`] captures a source's configuration as
//!   a stable, hashable value. The seeder directory shares one background
//!   task among all sources with equal keys.

pub mod os;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "web-seed")]
pub mod web;

pub use os::OsSeedSource;
#[cfg(feature = "web-seed")]
pub use web::WebSeedSource;

use core::fmt;

/// Errors from external seed sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// The source could not produce the requested bytes.
    Unavailable,
    /// Transport-level failure while contacting a remote source.
    Transport,
    /// The source is inside its retry-backoff window.
    Backoff,
    /// The source answered with the wrong number of bytes.
    ShortRead { requested: usize, got: usize },
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::Unavailable => write!(f, "seed source could not produce bytes"),
            SeedError::Transport => write!(f, "seed source transport failure"),
            SeedError::Backoff => write!(f, "seed source is backing off"),
            SeedError::ShortRead { requested, got } => {
                write!(f, "seed source returned {} bytes, wanted {}", got, requested)
            }
        }
    }
}

impl std::error::Error for SeedError {}

/// Stable value identity of a seed source.
///
/// Two source instances with equal configuration must produce equal keys;
/// the key is what the seeder directory hashes and compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An external provider of raw seed bytes.
pub trait SeedSource: Send + Sync {
    /// Produces exactly `length` bytes of seed material, or fails.
    fn generate_seed(&self, length: usize) -> Result<Vec<u8>, SeedError>;

    /// Cheap advisory check. False while the source is known to be in a
    /// backoff window; ignoring it is allowed but unlikely to succeed.
    fn is_worth_trying(&self) -> bool {
        true
    }

    /// Stable value identity, consistent with equality of the source's
    /// configuration. Keys the seeder directory.
    fn key(&self) -> SourceKey;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_key_equality() {
        assert_eq!(SourceKey::new("os"), SourceKey::new("os"));
        assert_ne!(SourceKey::new("os"), SourceKey::new("web:a"));
    }

    #[test]
    fn test_seed_error_display() {
        let e = SeedError::ShortRead {
            requested: 32,
            got: 16,
        };
        assert_eq!(e.to_string(), "seed source returned 16 bytes, wanted 32");
    }
}

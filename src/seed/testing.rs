//! Deterministic seed sources for tests.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use super::{SeedError, SeedSource, SourceKey};

/// Named source producing a rolling byte pattern. Cheap, deterministic, and
/// distinct per name so directory tests can tell instances apart.
pub(crate) struct FakeSeedSource {
    name: String,
    next: AtomicU8,
    requests: AtomicUsize,
}

impl FakeSeedSource {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            next: AtomicU8::new(1),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of `generate_seed` calls served so far.
    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl SeedSource for FakeSeedSource {
    fn generate_seed(&self, length: usize) -> Result<Vec<u8>, SeedError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let start = self.next.fetch_add(length as u8, Ordering::SeqCst);
        Ok((0..length).map(|i| start.wrapping_add(i as u8)).collect())
    }

    fn key(&self) -> SourceKey {
        SourceKey::new(format!("fake:{}", self.name))
    }
}

/// Source that fails every request; drives the seeder shutdown path.
pub(crate) struct FailingSeedSource {
    name: String,
}

impl FailingSeedSource {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }
}

impl SeedSource for FailingSeedSource {
    fn generate_seed(&self, _length: usize) -> Result<Vec<u8>, SeedError> {
        Err(SeedError::Unavailable)
    }

    fn key(&self) -> SourceKey {
        SourceKey::new(format!("failing:{}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_source_is_deterministic_pattern() {
        let source = FakeSeedSource::new("t");
        assert_eq!(source.generate_seed(4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(source.generate_seed(2).unwrap(), vec![5, 6]);
        assert_eq!(source.requests(), 2);
    }

    #[test]
    fn test_fake_source_identity_by_name() {
        assert_eq!(
            FakeSeedSource::new("a").key(),
            FakeSeedSource::new("a").key()
        );
        assert_ne!(
            FakeSeedSource::new("a").key(),
            FakeSeedSource::new("b").key()
        );
    }

    #[test]
    fn test_failing_source_always_fails() {
        let source = FailingSeedSource::new("t");
        assert_eq!(source.generate_seed(16), Err(SeedError::Unavailable));
    }
}

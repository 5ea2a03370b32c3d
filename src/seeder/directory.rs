//! One seeder per seed-source identity.
//!
//! The directory is an explicit value the host application creates and
//! shares; there is no hidden process-wide registry. Lookup is idempotent
//! per source identity (value equality via [`SourceKey`]), and a terminated
//! task removes its own entry, so the next lookup for the same identity
//! builds a fresh one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::SeederConfig;
use crate::seed::{SeedSource, SourceKey};

use super::task::Seeder;

/// Owns the map from seed-source identity to its one running seeder.
pub struct SeederDirectory {
    config: SeederConfig,
    seeders: Mutex<HashMap<SourceKey, Arc<Seeder>>>,
}

impl SeederDirectory {
    pub fn new(config: SeederConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            seeders: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(SeederConfig::default())
    }

    /// Returns the seeder for `source`'s identity, starting one if none is
    /// running. Sources comparing equal by key share one task.
    pub fn get_or_create(
        directory: &Arc<SeederDirectory>,
        source: Arc<dyn SeedSource>,
    ) -> Arc<Seeder> {
        let key = source.key();
        let mut map = directory.lock_map();
        if let Some(existing) = map.get(&key) {
            // A terminated entry can linger briefly before its task removes
            // itself; replace it here rather than handing it out.
            if !existing.is_terminated() {
                return Arc::clone(existing);
            }
        }
        let seeder = Seeder::start(source, &directory.config);
        seeder.set_home(directory);
        map.insert(key, Arc::clone(&seeder));
        seeder
    }

    /// Number of directory entries (terminated-but-unremoved included).
    pub fn len(&self) -> usize {
        self.lock_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Called by a terminating task; removes the entry only if it still maps
    /// to that task, never a fresh replacement.
    pub(crate) fn remove_terminated(&self, key: &SourceKey, seeder: &Seeder) {
        let mut map = self.lock_map();
        if let Some(current) = map.get(key) {
            if std::ptr::eq(current.as_ref(), seeder) {
                map.remove(key);
            }
        }
    }

    fn lock_map(&self) -> MutexGuard<'_, HashMap<SourceKey, Arc<Seeder>>> {
        self.seeders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::prng::testing::SplitMixCore;
    use crate::prng::TrackedRng;
    use crate::seed::testing::{FailingSeedSource, FakeSeedSource};

    fn directory() -> Arc<SeederDirectory> {
        SeederDirectory::new(SeederConfig {
            poll_interval_ms: 1,
        })
    }

    fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_lookup_is_idempotent_per_identity() {
        let dir = directory();
        let a = SeederDirectory::get_or_create(&dir, Arc::new(FakeSeedSource::new("one")));
        let b = SeederDirectory::get_or_create(&dir, Arc::new(FakeSeedSource::new("one")));
        let c = SeederDirectory::get_or_create(&dir, Arc::new(FakeSeedSource::new("two")));
        // Identity is value equality of the source, not instance identity.
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn test_terminated_task_removes_its_entry() {
        let dir = directory();
        let doomed =
            SeederDirectory::get_or_create(&dir, Arc::new(FailingSeedSource::new("dead")));

        let depleted = Arc::new(TrackedRng::new(
            SplitMixCore::new(1),
            1u64.to_be_bytes().to_vec(),
        ));
        depleted.next_u64();
        depleted.next_u64();
        TrackedRng::attach_seeder(&depleted, &doomed).unwrap();

        assert!(wait_until(2_000, || doomed.is_terminated()));
        assert!(wait_until(2_000, || dir.is_empty()));

        // The next lookup for the same identity starts a fresh task.
        let fresh =
            SeederDirectory::get_or_create(&dir, Arc::new(FailingSeedSource::new("dead")));
        assert!(!Arc::ptr_eq(&doomed, &fresh));
        // With nothing registered the fresh task idles instead of failing.
        assert!(!fresh.is_terminated());
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_stop_while_idle_removes_entry() {
        let dir = directory();
        let seeder = SeederDirectory::get_or_create(&dir, Arc::new(FakeSeedSource::new("idle")));
        seeder.stop_if_empty();
        assert!(wait_until(2_000, || dir.is_empty()));
    }
}

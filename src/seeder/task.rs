//! Background reseeding task.
//!
//! One [`Seeder`] runs per seed source. Its thread sleeps on a condition
//! variable while nobody is registered, then cycles over the live
//! generators: anything with entropy left is skipped, anything depleted gets
//! fresh bytes from the source. A cycle that fed at least one generator
//! loops again immediately; an idle cycle sleeps for the configured poll
//! interval instead of spinning.
//!
//! Source I/O happens outside the registry lock, serialized by the task
//! itself, so a slow source never blocks registration or application
//! threads.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use crate::config::SeederConfig;
use crate::seed::{SeedSource, SourceKey};

use super::directory::SeederDirectory;
use super::{Reseedable, SeederError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    StopRequested,
    Terminated,
}

struct Registry {
    prngs: Vec<Weak<dyn Reseedable>>,
    phase: Phase,
}

/// Background reseeding task bound to one seed source.
pub struct Seeder {
    source: Arc<dyn SeedSource>,
    poll_interval: Duration,
    registry: Mutex<Registry>,
    wakeup: Condvar,
    home: Mutex<Option<Weak<SeederDirectory>>>,
}

impl Seeder {
    /// Starts a seeder for `source`. The background thread runs until the
    /// source fails or `stop_if_empty` succeeds.
    pub fn start(source: Arc<dyn SeedSource>, config: &SeederConfig) -> Arc<Self> {
        let seeder = Arc::new(Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            registry: Mutex::new(Registry {
                prngs: Vec::new(),
                phase: Phase::Running,
            }),
            wakeup: Condvar::new(),
            home: Mutex::new(None),
            source,
        });
        let task = Arc::clone(&seeder);
        // The task detaches; its lifecycle is the registry phase, not a join.
        let _ = thread::Builder::new()
            .name(format!("everseed-{}", seeder.source.key()))
            .spawn(move || task.run())
            .expect("failed to spawn seeder thread");
        seeder
    }

    /// Identity of the source this task feeds from.
    pub fn source_key(&self) -> SourceKey {
        self.source.key()
    }

    pub(crate) fn set_home(&self, directory: &Arc<SeederDirectory>) {
        *self.lock_home() = Some(Arc::downgrade(directory));
    }

    /// Registers a generator (weakly). Duplicate registrations collapse to
    /// one entry. Fails once the task has terminated.
    pub fn add_target(&self, target: Weak<dyn Reseedable>) -> Result<(), SeederError> {
        let mut registry = self.lock_registry();
        match registry.phase {
            Phase::Terminated => return Err(SeederError::Terminated),
            // A registration arriving between stop_if_empty and the task
            // honoring it wins; the stop request is dropped.
            Phase::StopRequested => registry.phase = Phase::Running,
            Phase::Running => {}
        }
        if !registry.prngs.iter().any(|w| same_target(w, &target)) {
            registry.prngs.push(target);
        }
        self.wakeup.notify_all();
        Ok(())
    }

    /// Removes a generator from the registry. No-op when absent.
    pub fn remove_target(&self, target: &Weak<dyn Reseedable>) {
        let mut registry = self.lock_registry();
        registry.prngs.retain(|w| !same_target(w, target));
    }

    /// Number of registered generators still alive.
    pub fn registered(&self) -> usize {
        self.lock_registry()
            .prngs
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// True while no live generator is registered.
    pub fn is_empty(&self) -> bool {
        self.registered() == 0
    }

    /// Requests cooperative termination, honored only while the registry is
    /// empty. The task finishes its current cycle first.
    pub fn stop_if_empty(&self) {
        let mut registry = self.lock_registry();
        let any_live = registry.prngs.iter().any(|w| w.strong_count() > 0);
        if registry.phase == Phase::Running && !any_live {
            registry.phase = Phase::StopRequested;
            self.wakeup.notify_all();
        }
    }

    /// True once the background task has exited.
    pub fn is_terminated(&self) -> bool {
        self.lock_registry().phase == Phase::Terminated
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_home(&self) -> MutexGuard<'_, Option<Weak<SeederDirectory>>> {
        self.home.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(self: Arc<Self>) {
        log::info!("seeder for {} started", self.source.key());
        loop {
            {
                let mut registry = self.lock_registry();
                while registry.phase == Phase::Running && registry.prngs.is_empty() {
                    registry = self
                        .wakeup
                        .wait(registry)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                if registry.phase == Phase::StopRequested {
                    drop(registry);
                    self.terminate("stopped while idle");
                    return;
                }
            }

            // Source I/O stays outside the registry lock.
            let snapshot: Vec<Weak<dyn Reseedable>> = self.lock_registry().prngs.clone();
            let mut fed_any = false;
            for weak in &snapshot {
                let rng = match weak.upgrade() {
                    Some(rng) => rng,
                    None => continue, // pruned below
                };
                if rng.entropy_bits() > 0 {
                    continue;
                }
                if !self.source.is_worth_trying() {
                    // Advisory backoff covers the source, not one generator.
                    break;
                }
                match self.source.generate_seed(rng.new_seed_length()) {
                    Ok(seed) => match rng.reseed(&seed) {
                        Ok(()) => {
                            fed_any = true;
                            log::debug!(
                                "fed {} seed bytes from {}",
                                seed.len(),
                                self.source.key()
                            );
                        }
                        Err(e) => log::warn!("generator rejected seed material: {}", e),
                    },
                    Err(e) => {
                        // A source failing for one registrant fails for all
                        // of them; take the whole task down.
                        log::error!("seed source {} failed: {}", self.source.key(), e);
                        self.terminate("seed source failure");
                        return;
                    }
                }
            }

            self.lock_registry()
                .prngs
                .retain(|w| w.strong_count() > 0);
            if !fed_any {
                thread::sleep(self.poll_interval);
            }
        }
    }

    fn terminate(&self, reason: &str) {
        self.lock_registry().phase = Phase::Terminated;
        self.wakeup.notify_all();
        if let Some(directory) = self.lock_home().take().and_then(|w| w.upgrade()) {
            directory.remove_terminated(&self.source.key(), self);
        }
        log::info!("seeder for {} terminated: {}", self.source.key(), reason);
    }
}

/// Thin-pointer comparison; dead entries never match and get pruned instead.
fn same_target(a: &Weak<dyn Reseedable>, b: &Weak<dyn Reseedable>) -> bool {
    match (a.upgrade(), b.upgrade()) {
        (Some(a), Some(b)) => {
            Arc::as_ptr(&a) as *const () == Arc::as_ptr(&b) as *const ()
        }
        _ => false,
    }
}

//! Length-keyed cache of transform plans
//!
//! Each length owns a slot holding a once-initialised plan. The slot map lock
//! is only held to find or insert a slot; plan construction runs on the slot
//! itself, so callers asking for the same length wait for the first builder
//! while callers asking for other lengths proceed untouched.

use super::fft::{FftBackend, PlanBuilder, SharedPlan};
use crate::error::{InvalidSignalReason, Result, SpectrumError};
use log::{debug, info, trace};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Plan cache configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Backend used to build plans
    pub backend: FftBackend,

    /// Maximum number of cached plans (`None` = unbounded)
    ///
    /// When bounded, the least recently used plan is evicted to make room.
    pub capacity: Option<usize>,
}

impl CacheConfig {
    /// Unbounded cache on the given backend
    pub fn with_backend(backend: FftBackend) -> Self {
        Self {
            backend,
            capacity: None,
        }
    }

    /// Bounded LRU cache on the default backend
    pub fn bounded(capacity: usize) -> Self {
        Self {
            backend: FftBackend::default(),
            capacity: Some(capacity.max(1)),
        }
    }
}

/// Snapshot of the lengths that currently have a ready plan
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheInfo {
    /// Cached lengths in ascending order
    pub cached_lengths: Vec<usize>,
}

impl CacheInfo {
    pub fn len(&self) -> usize {
        self.cached_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached_lengths.is_empty()
    }
}

/// Lifetime counters for a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// `acquire` calls served by an existing plan (including waiters on an in-flight build)
    pub hits: u64,
    /// Times `acquire` found no ready plan for its length
    pub misses: u64,
    /// Plans successfully built
    pub constructions: u64,
    /// Builds that returned an error
    pub failures: u64,
    /// Plans dropped to respect the capacity bound
    pub evictions: u64,
}

/// Source of plans for the spectrum computer
///
/// Implemented by [`PlanCache`]; tests can substitute their own source.
pub trait PlanSource: Send + Sync {
    /// Ready-to-use plan for inputs of exactly `len` samples
    fn acquire(&self, len: usize) -> Result<SharedPlan>;
}

/// Outcome of one attempt to initialise a slot
enum BuildAttempt {
    Failed(SpectrumError),
    /// The slot was removed from the map after an earlier failed build
    Detached,
}

struct Slot {
    plan: OnceCell<SharedPlan>,
    last_used: AtomicU64,
}

impl Slot {
    fn new(tick: u64) -> Self {
        Self {
            plan: OnceCell::new(),
            last_used: AtomicU64::new(tick),
        }
    }

    fn touch(&self, tick: u64) {
        self.last_used.fetch_max(tick, Ordering::Relaxed);
    }

    fn is_ready(&self) -> bool {
        self.plan.get().is_some()
    }
}

/// Thread-safe cache of transform plans keyed by input length
pub struct PlanCache {
    builder: Arc<dyn PlanBuilder>,
    capacity: Option<usize>,
    slots: RwLock<HashMap<usize, Arc<Slot>>>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    constructions: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

impl PlanCache {
    /// Create an empty cache building plans with the configured backend
    pub fn new(config: CacheConfig) -> Self {
        Self::with_builder(config.backend.builder(), config.capacity)
    }

    /// Create an empty cache around a custom plan builder
    pub fn with_builder(builder: Arc<dyn PlanBuilder>, capacity: Option<usize>) -> Self {
        Self {
            builder,
            capacity: capacity.map(|c| c.max(1)),
            slots: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            constructions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the plan for `len`, building it if this is the first request
    ///
    /// Concurrent callers for the same length block until the single build
    /// completes and then share its result. A failed build is not remembered:
    /// the next caller attempts it again.
    pub fn acquire(&self, len: usize) -> Result<SharedPlan> {
        if len == 0 {
            return Err(InvalidSignalReason::EmptySamples.into());
        }

        loop {
            let tick = self.clock.fetch_add(1, Ordering::Relaxed);
            let slot = self.slot_for(len, tick);

            if let Some(plan) = slot.plan.get() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("plan cache hit for length {}", len);
                return Ok(Arc::clone(plan));
            }
            self.misses.fetch_add(1, Ordering::Relaxed);

            let mut built_here = false;
            let attempt = slot.plan.get_or_try_init(|| {
                // A waiter woken by a failed build must not rebuild on the
                // detached slot while a fresh one may exist in the map
                if !self.is_current(len, &slot) {
                    return Err(BuildAttempt::Detached);
                }
                built_here = true;
                self.construct(len).map_err(|err| {
                    // Still initialising, so waiters are blocked until the slot is gone
                    self.discard(len, &slot);
                    BuildAttempt::Failed(err)
                })
            });

            match attempt {
                Ok(plan) => {
                    if !built_here {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(Arc::clone(plan));
                }
                Err(BuildAttempt::Failed(err)) => return Err(err),
                Err(BuildAttempt::Detached) => continue,
            }
        }
    }

    fn is_current(&self, len: usize, slot: &Arc<Slot>) -> bool {
        self.slots
            .read()
            .get(&len)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Remove `slot` from the map if it is still the entry for `len` and holds no plan
    fn discard(&self, len: usize, slot: &Arc<Slot>) {
        let mut slots = self.slots.write();
        let stale = slots
            .get(&len)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.is_ready());
        if stale {
            slots.remove(&len);
        }
    }

    fn construct(&self, len: usize) -> Result<SharedPlan> {
        let started = Instant::now();

        match self.builder.build(len) {
            Ok(plan) => {
                self.constructions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "built {} plan for length {} in {:?}",
                    self.builder.name(),
                    len,
                    started.elapsed()
                );
                Ok(plan)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                debug!("{} plan for length {} failed: {}", self.builder.name(), len, err);
                Err(err)
            }
        }
    }

    fn slot_for(&self, len: usize, tick: u64) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(&len) {
            slot.touch(tick);
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write();
        if let Some(slot) = slots.get(&len) {
            slot.touch(tick);
            return Arc::clone(slot);
        }

        if let Some(capacity) = self.capacity {
            self.evict_to_fit(&mut slots, capacity);
        }

        let slot = Arc::new(Slot::new(tick));
        slots.insert(len, Arc::clone(&slot));
        slot
    }

    /// Drop least recently used ready plans until a new slot fits
    ///
    /// In-flight slots are never evicted, so the bound may be exceeded
    /// temporarily while builds are running.
    fn evict_to_fit(&self, slots: &mut HashMap<usize, Arc<Slot>>, capacity: usize) {
        while slots.len() >= capacity {
            let victim = slots
                .iter()
                .filter(|(_, slot)| slot.is_ready())
                .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
                .map(|(&len, _)| len);

            match victim {
                Some(len) => {
                    slots.remove(&len);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!("evicted plan for length {}", len);
                }
                None => break,
            }
        }
    }

    /// Release every cached plan
    ///
    /// Plans still held by running analyses stay alive until those finish.
    pub fn clear(&self) {
        let mut slots = self.slots.write();
        let released = slots.len();
        slots.clear();
        info!("cleared plan cache ({} entries)", released);
    }

    /// Lengths with a ready plan
    pub fn info(&self) -> CacheInfo {
        let mut cached_lengths: Vec<usize> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.is_ready())
            .map(|(&len, _)| len)
            .collect();
        cached_lengths.sort_unstable();

        CacheInfo { cached_lengths }
    }

    /// Number of lengths with a ready plan
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.is_ready())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, len: usize) -> bool {
        self.slots
            .read()
            .get(&len)
            .is_some_and(|slot| slot.is_ready())
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl PlanSource for PlanCache {
    fn acquire(&self, len: usize) -> Result<SharedPlan> {
        PlanCache::acquire(self, len)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spectrum::fft::RealFftBuilder;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Wraps the real builder, counting builds and optionally slowing them down
    pub(crate) struct CountingBuilder {
        pub builds: AtomicUsize,
        pub delay: Duration,
    }

    impl CountingBuilder {
        pub(crate) fn new(delay: Duration) -> Self {
            Self {
                builds: AtomicUsize::new(0),
                delay,
            }
        }

        pub(crate) fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    impl PlanBuilder for CountingBuilder {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn build(&self, len: usize) -> Result<SharedPlan> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            RealFftBuilder.build(len)
        }
    }

    /// Fails the first `remaining_failures` builds, then delegates to the real builder
    struct FlakyBuilder {
        remaining_failures: AtomicUsize,
        delay: Duration,
    }

    impl FlakyBuilder {
        fn new(failures: usize, delay: Duration) -> Self {
            Self {
                remaining_failures: AtomicUsize::new(failures),
                delay,
            }
        }
    }

    impl PlanBuilder for FlakyBuilder {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn build(&self, len: usize) -> Result<SharedPlan> {
            thread::sleep(self.delay);
            let failing = self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SpectrumError::PlanConstructionFailed {
                    len,
                    reason: "simulated allocation failure".into(),
                });
            }
            RealFftBuilder.build(len)
        }
    }

    /// Blocks builds of one length until released
    struct GatedBuilder {
        gated_len: usize,
        started: AtomicBool,
        released: AtomicBool,
    }

    impl PlanBuilder for GatedBuilder {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn build(&self, len: usize) -> Result<SharedPlan> {
            if len == self.gated_len {
                self.started.store(true, Ordering::SeqCst);
                let deadline = Instant::now() + Duration::from_secs(10);
                while !self.released.load(Ordering::SeqCst) && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            RealFftBuilder.build(len)
        }
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_acquire_builds_once_and_reuses() {
        init_logger();
        let builder = Arc::new(CountingBuilder::new(Duration::ZERO));
        let cache = PlanCache::with_builder(builder.clone(), None);

        let first = cache.acquire(64).unwrap();
        let second = cache.acquire(64).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 64);
        assert_eq!(builder.builds(), 1);

        let stats = cache.stats();
        assert_eq!(stats.constructions, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_concurrent_acquire_same_length_builds_once() {
        init_logger();
        const THREADS: usize = 16;

        let builder = Arc::new(CountingBuilder::new(Duration::from_millis(50)));
        let cache = PlanCache::with_builder(builder.clone(), None);
        let barrier = Barrier::new(THREADS);

        let plans: Vec<SharedPlan> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.acquire(1000).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(builder.builds(), 1);
        assert!(plans.iter().all(|p| Arc::ptr_eq(p, &plans[0])));

        let stats = cache.stats();
        assert_eq!(stats.constructions, 1);
        assert_eq!(stats.hits, THREADS as u64 - 1);
    }

    #[test]
    fn test_different_lengths_do_not_wait_on_each_other() {
        init_logger();
        let builder = Arc::new(GatedBuilder {
            gated_len: 4096,
            started: AtomicBool::new(false),
            released: AtomicBool::new(false),
        });
        let cache = PlanCache::with_builder(builder.clone(), None);

        thread::scope(|s| {
            let slow = s.spawn(|| cache.acquire(4096));

            while !builder.started.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }

            // 4096 is still mid-build here
            let other = cache.acquire(128).unwrap();
            assert_eq!(other.len(), 128);
            assert!(!cache.contains(4096));

            builder.released.store(true, Ordering::SeqCst);
            assert_eq!(slow.join().unwrap().unwrap().len(), 4096);
        });

        assert_eq!(cache.info().cached_lengths, vec![128, 4096]);
    }

    #[test]
    fn test_failed_construction_is_retried() {
        init_logger();
        let cache = PlanCache::with_builder(Arc::new(FlakyBuilder::new(1, Duration::ZERO)), None);

        let err = cache.acquire(32).err().unwrap();
        assert!(matches!(err, SpectrumError::PlanConstructionFailed { len: 32, .. }));
        assert!(!cache.contains(32));
        assert!(cache.is_empty());

        let plan = cache.acquire(32).unwrap();
        assert_eq!(plan.len(), 32);
        assert!(cache.contains(32));

        let stats = cache.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.constructions, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_failed_lengths_leave_no_slots_behind() {
        let cache = PlanCache::with_builder(Arc::new(FlakyBuilder::new(3, Duration::ZERO)), None);

        for len in [10, 20, 30] {
            assert!(cache.acquire(len).is_err());
        }

        assert!(cache.slots.read().is_empty());
        assert_eq!(cache.stats().failures, 3);
    }

    #[test]
    fn test_waiters_retry_after_failed_build() {
        init_logger();
        const THREADS: usize = 8;

        let cache =
            PlanCache::with_builder(Arc::new(FlakyBuilder::new(1, Duration::from_millis(50))), None);
        let barrier = Barrier::new(THREADS);

        let results: Vec<Result<SharedPlan>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.acquire(256)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        // Only the caller whose build failed sees the error
        let failed = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(failed, 1);

        let plans: Vec<&SharedPlan> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(plans.len(), THREADS - 1);
        assert!(plans.iter().all(|p| Arc::ptr_eq(p, plans[0])));

        let stats = cache.stats();
        assert_eq!(stats.constructions, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(cache.info().cached_lengths, vec![256]);
    }

    #[test]
    fn test_zero_length_rejected() {
        let cache = PlanCache::default();

        let err = cache.acquire(0).err().unwrap();
        assert!(err.is_invalid_signal());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_info_and_clear() {
        let cache = PlanCache::default();
        assert!(cache.info().is_empty());

        cache.acquire(5).unwrap();
        cache.acquire(4).unwrap();
        cache.acquire(4).unwrap();

        let info = cache.info();
        assert_eq!(info.len(), 2);
        assert_eq!(info.cached_lengths, vec![4, 5]);

        cache.clear();
        assert_eq!(cache.len(), 0);

        // Cleared plans are rebuilt on demand
        cache.acquire(4).unwrap();
        assert_eq!(cache.stats().constructions, 3);
    }

    #[test]
    fn test_unbounded_by_default() {
        let cache = PlanCache::default();
        assert_eq!(cache.capacity(), None);

        for len in 1..=50 {
            cache.acquire(len).unwrap();
        }

        assert_eq!(cache.len(), 50);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_bounded_cache_evicts_least_recently_used() {
        let cache = PlanCache::new(CacheConfig::bounded(2));

        cache.acquire(4).unwrap();
        cache.acquire(8).unwrap();
        cache.acquire(4).unwrap();
        cache.acquire(16).unwrap();

        assert_eq!(cache.info().cached_lengths, vec![4, 16]);
        assert_eq!(cache.stats().evictions, 1);

        // Evicted lengths are rebuilt
        cache.acquire(8).unwrap();
        assert_eq!(cache.info().cached_lengths, vec![8, 16]);
        assert_eq!(cache.stats().constructions, 4);
    }

    #[test]
    fn test_zero_capacity_means_one() {
        let cache = PlanCache::new(CacheConfig::bounded(0));
        assert_eq!(cache.capacity(), Some(1));

        cache.acquire(3).unwrap();
        cache.acquire(7).unwrap();
        assert_eq!(cache.info().cached_lengths, vec![7]);
    }

    #[test]
    fn test_complex_backend() {
        let cache = PlanCache::new(CacheConfig::with_backend(FftBackend::ComplexFft));
        let plan = cache.acquire(10).unwrap();
        assert_eq!(plan.num_bins(), 6);
    }
}

//! Reference-counted, GUID-keyed resource cache
//!
//! Deduplicates expensive assets (meshes, shaders, textures, fonts) so that
//! every consumer asking for the same GUID shares one instance.
//!
//! ## Guarantees
//!
//! - At most one live instance per GUID. The check, the factory call and the
//!   insert all happen under one lock, so concurrent misses for the same key
//!   never construct twice.
//! - A [`CacheHandle`] counts one reference. Dropping (or releasing) the last
//!   handle destroys the instance and erases the entry inside that same
//!   critical section: a racing acquire either sees the live instance or no
//!   entry at all, never a half-destroyed one.
//! - A failing or panicking factory leaves the cache exactly as it was.
//!
//! The lock is coarse (one per cache) and is held while a factory runs, so a
//! slow factory blocks every other lookup on the same cache. Factories and
//! `Drop` impls of cached values must not call back into the same cache.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::config::ResourceConfig;

/// Boxed error produced by a resource factory
pub type FactoryError = Box<dyn StdError + Send + Sync + 'static>;

/// Resource cache errors
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The factory for a missing GUID returned an error; nothing was cached
    #[error("failed to create {kind} '{guid}': {source}")]
    FactoryFailed {
        /// Resource kind of the cache
        kind: &'static str,
        /// Requested GUID
        guid: String,
        /// Error returned by the factory
        #[source]
        source: FactoryError,
    },

    /// A handle was released that no live entry accounts for
    ///
    /// [`CacheHandle::release`] consumes the handle and `Drop` runs once, so
    /// safe code cannot release twice. This reports a broken invariant in the
    /// cache's own bookkeeping (a missing entry, a zero count or a stale
    /// generation) instead of letting it corrupt the counts.
    #[error("{kind} '{guid}' released more times than it was acquired")]
    DoubleRelease {
        /// Resource kind of the cache
        kind: &'static str,
        /// GUID of the handle
        guid: String,
    },
}

/// Cache counters since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from an existing entry
    pub hits: u64,
    /// Lookups that constructed a new instance
    pub misses: u64,
    /// Instances destroyed because their last handle went away
    pub evictions: u64,
    /// Factory calls that returned an error or panicked
    pub failures: u64,
}

struct Entry<T> {
    guid: Arc<str>,
    value: Arc<T>,
    refs: usize,
    generation: u64,
}

struct State<T> {
    entries: HashMap<Arc<str>, Entry<T>>,
    next_generation: u64,
    stats: CacheStats,
}

struct Shared<T> {
    kind: &'static str,
    log_evictions: bool,
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    /// Lock the cache state
    ///
    /// A panicking factory poisons the mutex before anything was inserted,
    /// so the state behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts a factory failure when dropped while the factory unwinds
struct PanicRecorder<'a> {
    stats: &'a mut CacheStats,
}

impl Drop for PanicRecorder<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.stats.failures += 1;
        }
    }
}

/// Run a factory with the lock held, counting a panic as a failure
fn run_factory<T, R>(state: &mut State<T>, factory: impl FnOnce() -> R) -> R {
    let _recorder = PanicRecorder {
        stats: &mut state.stats,
    };
    factory()
}

/// Thread-safe cache of shared `T` instances keyed by GUID
///
/// Cloning the cache is cheap and yields another view of the same entries.
pub struct ResourceCache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ResourceCache")
            .field("kind", &self.shared.kind)
            .field("entries", &state.entries.len())
            .field("stats", &state.stats)
            .finish()
    }
}

impl<T> ResourceCache<T> {
    /// Create an empty cache for one resource kind
    pub fn new(kind: &'static str) -> Self {
        Self::with_config(kind, &ResourceConfig::default())
    }

    /// Create an empty cache with custom configuration
    pub fn with_config(kind: &'static str, config: &ResourceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                kind,
                log_evictions: config.log_evictions,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    next_generation: 0,
                    stats: CacheStats::default(),
                }),
            }),
        }
    }

    /// Resource kind this cache holds
    pub fn kind(&self) -> &'static str {
        self.shared.kind
    }

    /// Return the cached instance for `guid`, constructing it with `factory` on a miss
    ///
    /// The factory runs at most once per miss and never on a hit, even when
    /// many threads ask for the same GUID at once. On failure the error is
    /// returned as [`ResourceError::FactoryFailed`] and no entry is created.
    pub fn get_or_create<F, E>(&self, guid: &str, factory: F) -> Result<CacheHandle<T>, ResourceError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<FactoryError>,
    {
        let mut state = self.shared.lock();

        if let Some(handle) = self.acquire(&mut state, guid) {
            return Ok(handle);
        }

        match run_factory(&mut *state, factory) {
            Ok(value) => Ok(self.insert(&mut state, guid, value)),
            Err(e) => {
                state.stats.failures += 1;
                let source = e.into();
                log::warn!("{} cache factory failed for '{}': {}", self.shared.kind, guid, source);
                Err(ResourceError::FactoryFailed {
                    kind: self.shared.kind,
                    guid: guid.to_string(),
                    source,
                })
            }
        }
    }

    /// Infallible variant of [`ResourceCache::get_or_create`]
    pub fn get_or_insert_with<F>(&self, guid: &str, factory: F) -> CacheHandle<T>
    where
        F: FnOnce() -> T,
    {
        let mut state = self.shared.lock();

        if let Some(handle) = self.acquire(&mut state, guid) {
            return handle;
        }

        let value = run_factory(&mut *state, factory);
        self.insert(&mut state, guid, value)
    }

    /// Acquire an existing entry without ever constructing one
    pub fn get(&self, guid: &str) -> Option<CacheHandle<T>> {
        let mut state = self.shared.lock();
        self.acquire(&mut state, guid)
    }

    fn acquire(&self, state: &mut State<T>, guid: &str) -> Option<CacheHandle<T>> {
        let entry = state.entries.get_mut(guid)?;
        entry.refs += 1;
        let handle = self.handle(entry);
        state.stats.hits += 1;
        log::trace!("{} cache hit: '{}'", self.shared.kind, guid);
        Some(handle)
    }

    fn insert(&self, state: &mut State<T>, guid: &str, value: T) -> CacheHandle<T> {
        let key: Arc<str> = Arc::from(guid);
        let entry = Entry {
            guid: Arc::clone(&key),
            value: Arc::new(value),
            refs: 1,
            generation: state.next_generation,
        };
        state.next_generation += 1;
        let handle = self.handle(&entry);
        state.entries.insert(key, entry);
        state.stats.misses += 1;
        log::debug!("{} cache created '{}'", self.shared.kind, guid);
        handle
    }

    fn handle(&self, entry: &Entry<T>) -> CacheHandle<T> {
        CacheHandle {
            shared: Arc::clone(&self.shared),
            guid: Arc::clone(&entry.guid),
            generation: entry.generation,
            value: Some(Arc::clone(&entry.value)),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `guid` currently has a live instance
    pub fn contains(&self, guid: &str) -> bool {
        self.shared.lock().entries.contains_key(guid)
    }

    /// Outstanding handles for `guid` (0 when absent)
    pub fn ref_count(&self, guid: &str) -> usize {
        self.shared.lock().entries.get(guid).map_or(0, |entry| entry.refs)
    }

    /// GUIDs of all live entries, sorted
    pub fn guids(&self) -> Vec<String> {
        let state = self.shared.lock();
        let mut guids: Vec<String> = state.entries.keys().map(|key| key.to_string()).collect();
        guids.sort_unstable();
        guids
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        self.shared.lock().stats
    }
}

/// One counted reference to a cached instance
///
/// Dereferences to the instance. Cloning acquires another reference;
/// dropping releases it, destroying the instance if it was the last one.
pub struct CacheHandle<T> {
    shared: Arc<Shared<T>>,
    guid: Arc<str>,
    generation: u64,
    value: Option<Arc<T>>,
}

impl<T> CacheHandle<T> {
    /// GUID this handle was acquired for
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Whether both handles refer to the same instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Outstanding handles for this handle's entry, including this one
    pub fn ref_count(&self) -> usize {
        let state = self.shared.lock();
        state
            .entries
            .get(&*self.guid)
            .filter(|entry| entry.generation == self.generation)
            .map_or(0, |entry| entry.refs)
    }

    /// Release this reference now, reporting accounting errors
    ///
    /// Equivalent to dropping the handle, except that a release with no
    /// matching live entry is returned as [`ResourceError::DoubleRelease`]
    /// instead of being logged. Taking `self` by value means a handle can
    /// only be released once.
    pub fn release(mut self) -> Result<(), ResourceError> {
        self.release_ref()
    }

    fn release_ref(&mut self) -> Result<(), ResourceError> {
        let Some(value) = self.value.take() else {
            return Ok(());
        };

        let mut state = self.shared.lock();
        let remaining = match state.entries.get_mut(&*self.guid) {
            Some(entry) if entry.generation == self.generation && entry.refs > 0 => {
                entry.refs -= 1;
                entry.refs
            }
            _ => {
                return Err(ResourceError::DoubleRelease {
                    kind: self.shared.kind,
                    guid: self.guid.to_string(),
                });
            }
        };

        if remaining == 0 {
            let entry = state.entries.remove(&*self.guid);
            state.stats.evictions += 1;
            // last strong references: the instance is destroyed here, under the lock
            drop(value);
            drop(entry);
            if self.shared.log_evictions {
                log::debug!("{} cache evicted '{}'", self.shared.kind, self.guid);
            }
        } else {
            drop(value);
        }
        drop(state);
        Ok(())
    }
}

impl<T> Deref for CacheHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // only `release_ref` clears the value, and the handle is gone after it
        self.value.as_deref().expect("cache handle used after release")
    }
}

impl<T> Clone for CacheHandle<T> {
    fn clone(&self) -> Self {
        let mut state = self.shared.lock();
        if let Some(entry) = state.entries.get_mut(&*self.guid) {
            if entry.generation == self.generation {
                entry.refs += 1;
                state.stats.hits += 1;
            }
        }
        drop(state);

        Self {
            shared: Arc::clone(&self.shared),
            guid: Arc::clone(&self.guid),
            generation: self.generation,
            value: self.value.clone(),
        }
    }
}

impl<T> Drop for CacheHandle<T> {
    fn drop(&mut self) {
        if let Err(e) = self.release_ref() {
            log::error!("{}", e);
            debug_assert!(false, "{e}");
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CacheHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheHandle")
            .field("kind", &self.shared.kind)
            .field("guid", &self.guid)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    /// Counts live instances through a shared counter
    struct Tracked {
        label: String,
        live: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn new(label: &str, live: &Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self {
                label: label.to_string(),
                live: Arc::clone(live),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct DiskOnFire;

    #[test]
    fn test_hit_shares_instance_without_calling_factory() {
        let cache = ResourceCache::new("mesh");
        let first = cache.get_or_create("ship", || Ok::<_, DiskOnFire>(String::from("ship"))).unwrap();

        let second = cache
            .get_or_create("ship", || -> Result<String, DiskOnFire> { panic!("factory called on a hit") })
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(*second, "ship");
        assert_eq!(cache.ref_count("ship"), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, evictions: 0, failures: 0 });
    }

    #[test]
    fn test_last_release_destroys_and_next_lookup_rebuilds() {
        let live = Arc::new(AtomicUsize::new(0));
        let cache = ResourceCache::new("texture");
        let mut builds = 0;

        let handle = cache.get_or_insert_with("stone", || {
            builds += 1;
            Tracked::new("stone", &live)
        });
        let extra = handle.clone();
        assert_eq!(handle.ref_count(), 2);

        drop(extra);
        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert!(cache.contains("stone"));

        handle.release().unwrap();
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(!cache.contains("stone"));
        assert_eq!(cache.stats().evictions, 1);

        let again = cache.get_or_insert_with("stone", || {
            builds += 1;
            Tracked::new("stone", &live)
        });
        assert_eq!(again.label, "stone");
        assert_eq!(builds, 2);
    }

    #[test]
    fn test_factory_failure_leaves_no_entry() {
        let cache: ResourceCache<String> = ResourceCache::new("font");

        let err = cache.get_or_create("missing", || Err(DiskOnFire)).unwrap_err();

        match err {
            ResourceError::FactoryFailed { guid, source, .. } => {
                assert_eq!(guid, "missing");
                assert_eq!(source.to_string(), "disk on fire");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());
        assert_eq!(cache.stats().failures, 1);
        assert_eq!(cache.stats().misses, 0);

        let recovered = cache.get_or_create("missing", || Ok::<_, DiskOnFire>("found".to_string())).unwrap();
        assert_eq!(*recovered, "found");
    }

    #[test]
    fn test_panicking_factory_leaves_cache_usable() {
        let cache: ResourceCache<u32> = ResourceCache::new("shader");

        thread::scope(|s| {
            let result = s
                .spawn(|| {
                    cache.get_or_insert_with("boom", || panic!("factory exploded"));
                })
                .join();
            assert!(result.is_err());
        });

        assert!(!cache.contains("boom"));
        assert_eq!(cache.stats().failures, 1);
        assert_eq!(*cache.get_or_insert_with("boom", || 7), 7);
    }

    #[test]
    fn test_concurrent_misses_construct_once() {
        const THREADS: usize = 16;
        let cache: ResourceCache<usize> = ResourceCache::new("mesh");
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let handles: Vec<CacheHandle<usize>> = thread::scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_create("asteroid", || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(std::time::Duration::from_millis(5));
                                Ok::<_, DiskOnFire>(42)
                            })
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
        assert_eq!(cache.ref_count("asteroid"), THREADS);

        drop(handles);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_acquire_racing_last_release_never_sees_two_instances() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 500;
        let cache: ResourceCache<Tracked> = ResourceCache::new("mesh");
        let live = Arc::new(AtomicUsize::new(0));
        let peak = AtomicUsize::new(0);
        let builds = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        let handle = cache.get_or_insert_with("asteroid", || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            let instance = Tracked::new("asteroid", &live);
                            peak.fetch_max(live.load(Ordering::SeqCst), Ordering::SeqCst);
                            instance
                        });
                        // the handle always points at a live instance
                        assert!(live.load(Ordering::SeqCst) >= 1);
                        assert_eq!(handle.label, "asteroid");
                        drop(handle);
                    }
                });
            }
        });

        let stats = cache.stats();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
        assert_eq!(stats.misses, builds.load(Ordering::SeqCst) as u64);
        assert_eq!(stats.evictions, stats.misses);
        assert_eq!(stats.hits + stats.misses, (THREADS * ROUNDS) as u64);
    }

    #[test]
    fn test_release_without_matching_entry_is_reported() {
        let cache: ResourceCache<u32> = ResourceCache::new("font");
        let stale = cache.get_or_insert_with("serif", || 12);

        // entry rebuilt behind the handle's back under a new generation
        {
            let mut state = cache.shared.lock();
            let entry = state.entries.get_mut("serif").unwrap();
            entry.generation += 1;
        }

        let err = stale.release().unwrap_err();
        assert!(matches!(err, ResourceError::DoubleRelease { kind: "font", ref guid } if guid == "serif"));
        assert_eq!(cache.ref_count("serif"), 1);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_panic_is_counted_once_and_errors_separately() {
        let cache: ResourceCache<u32> = ResourceCache::new("shader");

        let _ = cache.get_or_create("bad", || Err::<u32, _>("nope"));
        thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    cache.get_or_insert_with("boom", || panic!("factory exploded"));
                })
                .join();
        });
        let _ok = cache.get_or_insert_with("fine", || 1);

        assert_eq!(cache.stats().failures, 2);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_get_never_constructs() {
        let cache: ResourceCache<i32> = ResourceCache::new("mesh");
        assert!(cache.get("nothing").is_none());

        let held = cache.get_or_insert_with("something", || 1);
        let found = cache.get("something").unwrap();
        assert!(found.ptr_eq(&held));
        assert_eq!(cache.guids(), vec!["something".to_string()]);
    }
}

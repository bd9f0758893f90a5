//! Image cache and loader
//!
//! Every path maps to exactly one [`LoadTask`]. A task's composite is
//! produced at most once: the first caller to resolve it (foreground
//! request or preload worker) runs the decode, everyone else blocks on the
//! same cell and receives the same `Arc<Composite>`.

use crate::cancel::CancelToken;
use crate::codec::current_thread_name;
use crate::composite::{Composite, LoadState};
use crate::estimator::LoadTimeEstimator;
use crate::format::ImageFormat;
use crate::pool::PreloadPool;
use crate::registry::DecoderRegistry;
use app_fs::{PathKey, UniversalPath};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// One in-flight or finished load
struct LoadTask {
    path: UniversalPath,
    cancel: CancelToken,
    result: OnceCell<Arc<Composite>>,
}

impl LoadTask {
    fn new(path: UniversalPath) -> Self {
        Self {
            path,
            cancel: CancelToken::new(),
            result: OnceCell::new(),
        }
    }
}

/// Counters for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Entries currently cached or in flight
    pub entries: usize,
    /// Decodes started since creation
    pub decodes: usize,
    /// Composites disposed by cleanup or shutdown
    pub disposals: usize,
}

/// State shared with preload workers
struct Shared {
    tasks: DashMap<PathKey, Arc<LoadTask>>,
    current: RwLock<Option<Arc<Composite>>>,
    registry: DecoderRegistry,
    estimator: Arc<LoadTimeEstimator>,
    decodes: AtomicUsize,
    disposals: AtomicUsize,
}

impl Shared {
    fn resolve(&self, task: &LoadTask) -> Arc<Composite> {
        task.result
            .get_or_init(|| Arc::new(self.load(&task.path, &task.cancel)))
            .clone()
    }

    fn load(&self, path: &UniversalPath, cancel: &CancelToken) -> Composite {
        let started = Instant::now();

        let pending = Composite::new(path.clone());
        let format = pending.format();
        let estimated_ms = self.estimator.estimate(format, pending.file_size());
        let decoder = self.registry.get(format);

        self.decodes.fetch_add(1, Ordering::Relaxed);

        let mut composite = match catch_unwind(AssertUnwindSafe(|| decoder.decode(pending, cancel))) {
            Ok(composite) => composite,
            Err(_) => {
                tracing::error!("[ImageLoader] Decoder panicked while loading {}", path);
                let failed = Composite::new(path.clone());
                failed.set_state(LoadState::Failed);
                failed
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        composite.set_timing(estimated_ms, elapsed_ms);

        // Only raster output is timed; vector parsing says nothing about
        // eventual render cost
        if composite.state() == LoadState::Complete && !composite.is_empty() && !composite.is_vector() {
            self.estimator.record(format, composite.file_size(), elapsed_ms);
        }

        tracing::debug!(
            "[ImageLoader] [Thread: {}] {} finished as {:?} in {:.1} ms (estimated {:.1} ms)",
            current_thread_name(),
            path,
            composite.state(),
            elapsed_ms,
            estimated_ms
        );

        composite
    }

    fn is_current(&self, composite: &Arc<Composite>) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, composite))
    }

    fn dispose(&self, composite: &Composite) {
        if composite.dispose() {
            self.disposals.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Path-keyed cache of load operations with background preloading
pub struct ImageLoader {
    shared: Arc<Shared>,
    pool: PreloadPool,
}

impl ImageLoader {
    pub fn new(registry: DecoderRegistry, estimator: Arc<LoadTimeEstimator>, pool: PreloadPool) -> Self {
        Self {
            shared: Arc::new(Shared {
                tasks: DashMap::new(),
                current: RwLock::new(None),
                registry,
                estimator,
                decodes: AtomicUsize::new(0),
                disposals: AtomicUsize::new(0),
            }),
            pool,
        }
    }

    /// Return the composite for `path`, decoding it on this thread if no
    /// load exists yet, or waiting for the existing one. The result becomes
    /// the current composite. Decode failures yield an empty composite.
    pub fn get_image(&self, path: &UniversalPath) -> Arc<Composite> {
        let task = self
            .shared
            .tasks
            .entry(path.cache_key().clone())
            .or_insert_with(|| Arc::new(LoadTask::new(path.clone())))
            .clone();

        let composite = self.shared.resolve(&task);
        *self.shared.current.write() = Some(Arc::clone(&composite));

        composite
    }

    /// Queue background loads for every path not already cached.
    /// Paths that do not fit in the queue are left uncached.
    pub fn preload_adjacent(&self, paths: &[UniversalPath]) {
        for path in paths {
            if ImageFormat::from_path(path.as_path()).is_preload_disabled() {
                continue;
            }

            let key = path.cache_key().clone();
            let task = match self.shared.tasks.entry(key.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(vacant) => {
                    let task = Arc::new(LoadTask::new(path.clone()));
                    vacant.insert(Arc::clone(&task));
                    task
                }
            };

            let shared = Arc::clone(&self.shared);
            let job_task = Arc::clone(&task);
            let submitted = self.pool.try_submit(move || {
                shared.resolve(&job_task);
            });

            match submitted {
                Ok(()) => tracing::trace!("[ImageLoader] Queued preload: {}", path),
                Err(e) => {
                    tracing::debug!("[ImageLoader] Preload of {} not queued: {}", path, e);
                    self.shared
                        .tasks
                        .remove_if(&key, |_, existing| Arc::ptr_eq(existing, &task));
                }
            }
        }
    }

    /// Evict every entry not in `keep`.
    ///
    /// Completed composites are disposed unless they are the current one.
    /// In-flight loads are dropped from the map without disposal and finish
    /// unobserved.
    pub fn cleanup(&self, keep: &[UniversalPath]) {
        let keep: HashSet<&PathKey> = keep.iter().map(UniversalPath::cache_key).collect();

        let evict: Vec<PathKey> = self
            .shared
            .tasks
            .iter()
            .filter(|entry| !keep.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in evict {
            let Some((_, task)) = self.shared.tasks.remove(&key) else {
                continue;
            };

            match task.result.get() {
                Some(composite) if composite.state() == LoadState::Complete => {
                    if self.shared.is_current(composite) {
                        tracing::debug!("[ImageLoader] Keeping current image alive: {}", task.path);
                    } else {
                        self.shared.dispose(composite);
                    }
                }
                Some(composite) => {
                    tracing::warn!(
                        "[ImageLoader] Dropping {:?} load without disposal: {}",
                        composite.state(),
                        task.path
                    );
                }
                None => {
                    tracing::warn!("[ImageLoader] Load still in flight, not disposing: {}", task.path);
                }
            }
        }
    }

    /// Cancel and forget the load for `path`. Returns whether one existed.
    pub fn cancel(&self, path: &UniversalPath) -> bool {
        match self.shared.tasks.remove(path.cache_key()) {
            Some((_, task)) => {
                task.cancel.cancel();
                tracing::debug!("[ImageLoader] Cancelled: {}", path);
                true
            }
            None => false,
        }
    }

    /// Shutdown teardown: dispose every completed composite (the current one
    /// included) and empty the cache. In-flight loads are skipped.
    pub fn dispose_all(&self) {
        let keys: Vec<PathKey> = self.shared.tasks.iter().map(|entry| entry.key().clone()).collect();

        for key in keys {
            let Some((_, task)) = self.shared.tasks.remove(&key) else {
                continue;
            };

            match task.result.get() {
                Some(composite) if composite.state() == LoadState::Complete => {
                    self.shared.dispose(composite);
                }
                _ => {
                    tracing::warn!("[ImageLoader] Disposing skipped for in-flight/failed image: {}", task.path);
                }
            }
        }

        if let Some(current) = self.shared.current.write().take() {
            self.shared.dispose(&current);
        }
    }

    /// The composite most recently returned by [`ImageLoader::get_image`]
    pub fn current(&self) -> Option<Arc<Composite>> {
        self.shared.current.read().clone()
    }

    pub fn contains(&self, path: &UniversalPath) -> bool {
        self.shared.tasks.contains_key(path.cache_key())
    }

    pub fn len(&self) -> usize {
        self.shared.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.tasks.is_empty()
    }

    pub fn estimator(&self) -> &Arc<LoadTimeEstimator> {
        &self.shared.estimator
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            entries: self.shared.tasks.len(),
            decodes: self.shared.decodes.load(Ordering::Relaxed),
            disposals: self.shared.disposals.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("stats", &self.stats())
            .field("pool", &self.pool)
            .finish()
    }
}

//! Historical decode timings keyed by (format, size bucket)
//!
//! Samples are kept as a sliding window of the most recent observations per
//! key. The table is persisted as a flat JSON object:
//!
//! ```json
//! { "JPEG_4": [31.2, 29.8], "PNG_1": [4.1] }
//! ```

use crate::error::EstimatorError;
use crate::format::ImageFormat;
use dashmap::DashMap;
use directories::ProjectDirs;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Samples kept per key
pub const MAX_SAMPLES: usize = 20;

/// Records between automatic saves
pub const AUTOSAVE_INTERVAL: usize = 5;

/// Bytes per bucket step
const BUCKET_UNIT: f64 = 256_000.0;

const DATA_FILE: &str = "load_time_data.json";

type SampleKey = (ImageFormat, u64);
type Samples = Arc<Mutex<VecDeque<f64>>>;

/// Concurrent load-time statistics with optional file persistence
pub struct LoadTimeEstimator {
    samples: DashMap<SampleKey, Samples>,
    unsaved: AtomicUsize,
    /// Held for the whole write-then-rename of a save
    save_lock: Mutex<()>,
    path: Option<PathBuf>,
}

impl LoadTimeEstimator {
    /// Statistics that are never written to disk
    pub fn in_memory() -> Self {
        Self {
            samples: DashMap::new(),
            unsaved: AtomicUsize::new(0),
            save_lock: Mutex::new(()),
            path: None,
        }
    }

    /// Load from `path` if it exists; later saves go back to it.
    ///
    /// An unreadable or corrupt file is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let estimator = Self {
            samples: DashMap::new(),
            unsaved: AtomicUsize::new(0),
            save_lock: Mutex::new(()),
            path: Some(path.clone()),
        };

        if !path.exists() {
            tracing::info!("[LoadTimeEstimator] No existing time data at {:?}", path);
            return estimator;
        }

        match estimator.load_from(&path) {
            Ok(count) => tracing::info!("[LoadTimeEstimator] Loaded {} buckets from {:?}", count, path),
            Err(e) => tracing::error!("[LoadTimeEstimator] Failed to load time data: {}", e),
        }

        estimator
    }

    /// Open the file in the per-user data directory, falling back to
    /// in-memory statistics when there is none.
    pub fn open_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::open(path),
            None => {
                tracing::warn!("[LoadTimeEstimator] No data directory; statistics will not persist");
                Self::in_memory()
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "Lumen", "Lumen").map(|dirs| dirs.data_dir().join(DATA_FILE))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size bucket for a file: `2^ceil(log2(bytes / 256000))`, at least 1
    pub fn size_bucket(size_bytes: u64) -> u64 {
        let exponent = (size_bytes as f64 / BUCKET_UNIT).log2().ceil();
        if !exponent.is_finite() || exponent <= 0.0 {
            return 1;
        }
        2f64.powf(exponent.min(62.0)) as u64
    }

    /// Add a sample, dropping the oldest beyond [`MAX_SAMPLES`].
    /// Unknown formats are ignored.
    pub fn record(&self, format: ImageFormat, size_bytes: u64, elapsed_ms: f64) {
        if format == ImageFormat::Unknown || !elapsed_ms.is_finite() {
            return;
        }

        let key = (format, Self::size_bucket(size_bytes));
        let list = self.samples.entry(key).or_default().clone();
        {
            let mut list = list.lock();
            list.push_back(elapsed_ms);
            while list.len() > MAX_SAMPLES {
                list.pop_front();
            }
        }

        tracing::debug!("[LoadTimeEstimator] {}: {} bytes, {:.1} ms", format, size_bytes, elapsed_ms);

        // Only the thread that resets the counter autosaves
        let pending = self.unsaved.fetch_add(1, Ordering::AcqRel) + 1;
        if pending >= AUTOSAVE_INTERVAL
            && self
                .unsaved
                .compare_exchange(pending, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.save_quietly();
        }
    }

    /// Mean of the exact bucket, else of the nearest bucket of the same
    /// format. 0 means "no estimate".
    pub fn estimate(&self, format: ImageFormat, size_bytes: u64) -> f64 {
        if format == ImageFormat::Unknown {
            return 0.0;
        }

        let bucket = Self::size_bucket(size_bytes);
        if let Some(list) = self.list((format, bucket)) {
            return mean(&list.lock());
        }

        let nearest = self
            .samples
            .iter()
            .filter(|entry| entry.key().0 == format)
            .map(|entry| entry.key().1)
            .min_by_key(|b| (b.abs_diff(bucket), *b));

        nearest
            .and_then(|b| self.list((format, b)))
            .map(|list| mean(&list.lock()))
            .unwrap_or(0.0)
    }

    pub fn sample_count(&self, format: ImageFormat, size_bytes: u64) -> usize {
        self.list((format, Self::size_bucket(size_bytes)))
            .map(|list| list.lock().len())
            .unwrap_or(0)
    }

    /// Write the table to its file. A no-op for in-memory estimators.
    ///
    /// Saves are serialised and go through a sibling `.tmp` file renamed
    /// over the target, so readers never see a partial document.
    pub fn save(&self) -> Result<(), EstimatorError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.snapshot())?;
        let tmp = temp_path(path);
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        Ok(())
    }

    /// Save, logging the outcome instead of returning it
    pub fn save_logged(&self) {
        match self.save() {
            Ok(()) if self.path.is_some() => tracing::info!("[LoadTimeEstimator] Saved time data"),
            Ok(()) => {}
            Err(e) => tracing::error!("[LoadTimeEstimator] Failed to save time data: {}", e),
        }
    }

    fn save_quietly(&self) {
        match self.save() {
            Ok(()) => tracing::debug!("[LoadTimeEstimator] Autosaved time data"),
            Err(e) => tracing::error!("[LoadTimeEstimator] Failed to save time data: {}", e),
        }
    }

    fn snapshot(&self) -> BTreeMap<String, Vec<f64>> {
        self.samples
            .iter()
            .map(|entry| {
                let (format, bucket) = *entry.key();
                let values = entry.value().lock().iter().copied().collect();
                (format!("{}_{}", format.tag(), bucket), values)
            })
            .collect()
    }

    fn load_from(&self, path: &Path) -> Result<usize, EstimatorError> {
        let content = std::fs::read_to_string(path)?;
        let data: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;

        let mut loaded = 0;
        for (key, value) in data {
            let Some(parsed) = parse_key(&key) else {
                tracing::warn!("[LoadTimeEstimator] Skipping invalid entry: {}", key);
                continue;
            };

            let Ok(values) = serde_json::from_value::<Vec<f64>>(value) else {
                tracing::warn!("[LoadTimeEstimator] Skipping invalid samples for: {}", key);
                continue;
            };

            let mut values: VecDeque<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
            while values.len() > MAX_SAMPLES {
                values.pop_front();
            }

            self.samples.insert(parsed, Arc::new(Mutex::new(values)));
            loaded += 1;
        }

        Ok(loaded)
    }

    fn list(&self, key: SampleKey) -> Option<Samples> {
        self.samples.get(&key).map(|entry| entry.value().clone())
    }
}

impl std::fmt::Debug for LoadTimeEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTimeEstimator")
            .field("buckets", &self.samples.len())
            .field("path", &self.path)
            .finish()
    }
}

/// `load_time_data.json` → `load_time_data.json.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `"PNG_4"` → `(Png, 4)`
fn parse_key(key: &str) -> Option<SampleKey> {
    let (tag, bucket) = key.split_once('_')?;
    let format = ImageFormat::from_tag(tag)?;
    let bucket = bucket.parse::<u64>().ok().filter(|b| *b > 0)?;
    Some((format, bucket))
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

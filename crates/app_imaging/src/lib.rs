//! Lumen imaging pipeline
//!
//! Turns file paths into decoded, displayable composites:
//! - Format classification and decoder dispatch (raster, native float, SVG)
//! - Path-keyed cache with at-most-once decoding per path
//! - Low-priority background preloading of neighbours
//! - Windowed eviction that never disposes the image on screen
//! - Persisted decode-time statistics

pub mod cancel;
pub mod codec;
pub mod composite;
pub mod error;
pub mod estimator;
pub mod exif;
pub mod format;
pub mod loader;
pub mod native;
pub mod pool;
pub mod registry;

pub use cancel::CancelToken;
pub use composite::{Composite, LoadState, Payload, RasterImage, VectorDrawing};
pub use error::{DecodeError, EstimatorError, ImagingError, NativeError, PoolError};
pub use estimator::LoadTimeEstimator;
pub use crate::exif::ExifInfo;
pub use format::ImageFormat;
pub use loader::{ImageLoader, LoaderStats};
pub use native::{NativeCodec, NativeKind};
pub use pool::PreloadPool;
pub use registry::{DecoderRegistry, NativeLibraries};

use app_fs::UniversalPath;
use std::path::PathBuf;
use std::sync::Arc;

/// Where decode-time statistics live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatisticsStore {
    /// `load_time_data.json` in the per-user data directory
    #[default]
    UserData,
    File(PathBuf),
    InMemory,
}

impl StatisticsStore {
    fn open(&self) -> LoadTimeEstimator {
        match self {
            StatisticsStore::UserData => LoadTimeEstimator::open_default(),
            StatisticsStore::File(path) => LoadTimeEstimator::open(path.clone()),
            StatisticsStore::InMemory => LoadTimeEstimator::in_memory(),
        }
    }
}

/// Construction options for [`Imaging`]
#[derive(Debug, Clone)]
pub struct ImagingOptions {
    pub preload_workers: usize,
    pub preload_queue_capacity: usize,
    /// Searched before the install locations for native decoder libraries
    pub native_library_dirs: Vec<PathBuf>,
    pub statistics: StatisticsStore,
}

impl Default for ImagingOptions {
    fn default() -> Self {
        Self {
            preload_workers: 2,
            preload_queue_capacity: 32,
            native_library_dirs: Vec::new(),
            statistics: StatisticsStore::UserData,
        }
    }
}

/// Owned entry point to the pipeline: one loader plus its statistics
pub struct Imaging {
    loader: ImageLoader,
    estimator: Arc<LoadTimeEstimator>,
}

impl Imaging {
    /// Build the pipeline, discovering native decoder libraries
    pub fn new(options: ImagingOptions) -> Result<Self, ImagingError> {
        let natives = NativeLibraries::discover(&options.native_library_dirs);
        Self::with_natives(options, natives)
    }

    /// Build the pipeline with explicitly provided native codecs
    pub fn with_natives(options: ImagingOptions, natives: NativeLibraries) -> Result<Self, ImagingError> {
        let estimator = Arc::new(options.statistics.open());
        let pool = PreloadPool::new(options.preload_workers, options.preload_queue_capacity)?;
        let loader = ImageLoader::new(DecoderRegistry::standard(natives), Arc::clone(&estimator), pool);

        tracing::info!(
            "Imaging initialized ({} preload workers, queue {})",
            options.preload_workers.max(1),
            options.preload_queue_capacity.max(1)
        );

        Ok(Self { loader, estimator })
    }

    /// Load (or attach to the load of) `path` and make it current.
    ///
    /// Missing files are a caller error; undecodable files are not and come
    /// back as an empty composite.
    pub fn get_image(&self, path: &UniversalPath) -> Result<Arc<Composite>, ImagingError> {
        if !path.exists() {
            return Err(ImagingError::NotFound(path.to_string()));
        }
        if !path.is_file() {
            return Err(ImagingError::NotAFile(path.to_string()));
        }

        Ok(self.loader.get_image(path))
    }

    pub fn preload(&self, paths: &[UniversalPath]) {
        self.loader.preload_adjacent(paths);
    }

    pub fn cleanup(&self, keep: &[UniversalPath]) {
        self.loader.cleanup(keep);
    }

    /// Expected decode time for `path` in ms; 0 when unknown
    pub fn estimate(&self, path: &UniversalPath) -> f64 {
        let size = std::fs::metadata(path.as_path()).map(|m| m.len()).unwrap_or(0);
        self.estimator.estimate(ImageFormat::from_path(path.as_path()), size)
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn estimator(&self) -> &LoadTimeEstimator {
        &self.estimator
    }

    /// Persist statistics, then dispose every cached composite
    pub fn save_and_dispose(&self) {
        self.estimator.save_logged();
        self.loader.dispose_all();
    }
}

impl std::fmt::Debug for Imaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Imaging").field("loader", &self.loader).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn imaging(stats: &std::path::Path) -> Imaging {
        let options = ImagingOptions {
            statistics: StatisticsStore::File(stats.to_path_buf()),
            ..Default::default()
        };
        Imaging::with_natives(options, NativeLibraries::none()).unwrap()
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let imaging = imaging(&dir.path().join("stats.json"));

        let result = imaging.get_image(&UniversalPath::new(dir.path().join("nope.png")));
        assert!(matches!(result, Err(ImagingError::NotFound(_))));

        let result = imaging.get_image(&UniversalPath::new(dir.path()));
        assert!(matches!(result, Err(ImagingError::NotAFile(_))));
    }

    #[test]
    fn test_estimate_after_load_and_save() {
        let dir = TempDir::new().unwrap();
        let stats = dir.path().join("stats.json");
        let path = dir.path().join("a.png");
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])).save(&path).unwrap();
        let a = UniversalPath::new(&path);

        let imaging = imaging(&stats);
        assert_eq!(imaging.estimate(&a), 0.0);

        let composite = imaging.get_image(&a).unwrap();
        assert_eq!(composite.state(), LoadState::Complete);
        assert!(imaging.estimate(&a) > 0.0 || composite.elapsed_ms() == 0.0);

        imaging.save_and_dispose();
        assert!(composite.is_disposed());
        assert!(stats.exists());

        let reopened = LoadTimeEstimator::open(&stats);
        assert_eq!(reopened.sample_count(ImageFormat::Png, composite.file_size()), 1);
    }
}

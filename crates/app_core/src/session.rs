//! Viewer session: navigation driving the imaging pipeline

use crate::config::{AppConfig, ImagingConfig};
use crate::error::AppError;
use crate::navigation::Navigator;
use app_imaging::{Composite, Imaging, ImagingOptions, StatisticsStore};
use std::sync::Arc;

/// Owns the navigator and the pipeline and applies the cache window policy
/// on every move: show the current image, evict outside the safe range,
/// then warm the preload window.
pub struct ViewerSession {
    navigator: Navigator,
    imaging: Imaging,
    preload_depth: usize,
    safe_range: usize,
}

impl ViewerSession {
    /// Build a session whose statistics persist in the user data directory
    pub fn new(config: &AppConfig, navigator: Navigator) -> Result<Self, AppError> {
        let imaging = Imaging::new(imaging_options(&config.imaging, StatisticsStore::UserData))
            .map_err(|e| AppError::Init(e.to_string()))?;
        Ok(Self::with_imaging(config, navigator, imaging))
    }

    /// Build a session around an existing pipeline
    pub fn with_imaging(config: &AppConfig, navigator: Navigator, imaging: Imaging) -> Self {
        let imaging_config = config.clone().validated().imaging;

        Self {
            navigator,
            imaging,
            preload_depth: imaging_config.preload_depth,
            safe_range: imaging_config.cleanup_safe_range,
        }
    }

    /// Load and return the current image, then update the cache window.
    /// `None` when the collection is empty.
    pub fn show_current(&self) -> Result<Option<Arc<Composite>>, AppError> {
        let Some(current) = self.navigator.get_current() else {
            return Ok(None);
        };

        let composite = self.imaging.get_image(current)?;

        self.imaging.cleanup(&self.navigator.get_range(self.safe_range));
        if self.preload_depth > 0 {
            self.imaging.preload(&self.navigator.get_range(self.preload_depth));
        }

        let (index, count) = self.navigator.position();
        tracing::info!(
            "[{}/{}] {} ({:?}, {:.1} ms)",
            index,
            count,
            current,
            composite.state(),
            composite.elapsed_ms()
        );

        Ok(Some(composite))
    }

    /// Move forward and show; `None` at the end of the collection
    pub fn next(&mut self) -> Result<Option<Arc<Composite>>, AppError> {
        self.navigate(Navigator::move_next)
    }

    pub fn previous(&mut self) -> Result<Option<Arc<Composite>>, AppError> {
        self.navigate(Navigator::move_previous)
    }

    pub fn first(&mut self) -> Result<Option<Arc<Composite>>, AppError> {
        self.navigate(Navigator::move_first)
    }

    pub fn last(&mut self) -> Result<Option<Arc<Composite>>, AppError> {
        self.navigate(Navigator::move_last)
    }

    fn navigate(&mut self, step: fn(&mut Navigator) -> bool) -> Result<Option<Arc<Composite>>, AppError> {
        if step(&mut self.navigator) {
            self.show_current()
        } else {
            Ok(None)
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn imaging(&self) -> &Imaging {
        &self.imaging
    }

    /// Persist statistics and release every cached image
    pub fn shutdown(&self) {
        tracing::info!("Shutting down viewer session");
        self.imaging.save_and_dispose();
    }
}

/// Pipeline options derived from configuration
pub fn imaging_options(config: &ImagingConfig, statistics: StatisticsStore) -> ImagingOptions {
    ImagingOptions {
        preload_workers: config.preload_workers,
        preload_queue_capacity: config.preload_queue_capacity,
        native_library_dirs: config.native_library_dirs.clone(),
        statistics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_fs::UniversalPath;
    use app_imaging::{LoadState, NativeLibraries};
    use image::{Rgba, RgbaImage};
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn gallery(dir: &Path, count: usize) {
        for i in 0..count {
            RgbaImage::from_pixel(2, 2, Rgba([i as u8, 0, 0, 255]))
                .save(dir.join(format!("img{}.png", i)))
                .unwrap();
        }
    }

    fn session(dir: &Path, depth: usize, safe: usize) -> ViewerSession {
        let mut config = AppConfig::default();
        config.imaging.preload_depth = depth;
        config.imaging.cleanup_safe_range = safe;

        let imaging = Imaging::with_natives(
            imaging_options(&config.imaging, StatisticsStore::InMemory),
            NativeLibraries::none(),
        )
        .unwrap();

        ViewerSession::with_imaging(&config, Navigator::open(dir).unwrap(), imaging)
    }

    fn wait_for_entries(session: &ViewerSession, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while session.imaging().loader().len() != expected {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_show_current_warms_neighbours() {
        let dir = TempDir::new().unwrap();
        gallery(dir.path(), 6);
        let session = session(dir.path(), 1, 1);

        let shown = session.show_current().unwrap().unwrap();
        assert_eq!(shown.state(), LoadState::Complete);

        // img0 plus img1 preloaded
        wait_for_entries(&session, 2);
        assert!(session
            .imaging()
            .loader()
            .contains(&UniversalPath::new(dir.path().join("img1.png"))));
    }

    #[test]
    fn test_navigation_evicts_outside_safe_range() {
        let dir = TempDir::new().unwrap();
        gallery(dir.path(), 6);
        let mut session = session(dir.path(), 1, 1);

        let first = session.show_current().unwrap().unwrap();
        session.next().unwrap();
        session.next().unwrap();
        let third = session.next().unwrap().unwrap();

        // img0 fell outside [img2, img4]
        assert!(first.is_disposed());
        assert!(!third.is_disposed());
        let loader = session.imaging().loader();
        assert!(!loader.contains(&UniversalPath::new(dir.path().join("img0.png"))));
        assert!(loader.contains(&UniversalPath::new(dir.path().join("img3.png"))));
    }

    #[test]
    fn test_bounds_and_shutdown() {
        let dir = TempDir::new().unwrap();
        gallery(dir.path(), 2);
        let mut session = session(dir.path(), 1, 2);

        session.show_current().unwrap();
        assert!(session.previous().unwrap().is_none());

        let last = session.last().unwrap().unwrap();
        assert!(session.next().unwrap().is_none());
        assert_eq!(session.navigator().position(), (2, 2));

        session.shutdown();
        assert!(last.is_disposed());
        assert!(session.imaging().loader().is_empty());
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let session = session(dir.path(), 1, 1);
        assert!(session.show_current().unwrap().is_none());
    }

    #[test]
    fn test_vanished_file_is_recoverable() {
        let dir = TempDir::new().unwrap();
        gallery(dir.path(), 3);
        let mut session = session(dir.path(), 0, 1);

        session.show_current().unwrap();
        std::fs::remove_file(dir.path().join("img1.png")).unwrap();

        let err = session.next().unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
        assert!(err.is_recoverable());
        assert_eq!(session.navigator().position(), (2, 3));

        // Still navigable in both directions
        assert_eq!(session.next().unwrap().unwrap().state(), LoadState::Complete);
        assert_eq!(session.first().unwrap().unwrap().state(), LoadState::Complete);
    }
}

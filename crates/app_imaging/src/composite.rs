//! Composite - the cached outcome of loading one path

use crate::exif::ExifInfo;
use crate::format::ImageFormat;
use app_fs::UniversalPath;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use resvg::usvg;
use std::fmt;

/// Lifecycle of a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loading,
    Complete,
    Failed,
    Cancelled,
    Disposed,
}

impl LoadState {
    /// Whether the load has finished one way or another
    pub fn is_finished(self) -> bool {
        !matches!(self, LoadState::Pending | LoadState::Loading)
    }
}

/// Decoded RGBA8 pixels, row-major, unpremultiplied
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self { width, height, pixels }
    }

    /// Memory footprint of the pixel buffer
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Resolution-independent drawing plus the bounds it should be laid out with
pub struct VectorDrawing {
    pub tree: usvg::Tree,
    pub width: f32,
    pub height: f32,
}

impl fmt::Debug for VectorDrawing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorDrawing")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// What a successful decode produced
#[derive(Debug)]
pub enum Payload {
    Raster(RasterImage),
    Vector(VectorDrawing),
}

impl Payload {
    pub fn size(&self) -> (f32, f32) {
        match self {
            Payload::Raster(img) => (img.width as f32, img.height as f32),
            Payload::Vector(drawing) => (drawing.width, drawing.height),
        }
    }
}

/// The unit of cached state. Built mutably by a decoder, then shared as
/// `Arc<Composite>` between the cache and the viewer; only the payload and
/// lifecycle state change after that, behind locks.
pub struct Composite {
    path: UniversalPath,
    format: ImageFormat,
    file_size: u64,
    payload: RwLock<Option<Payload>>,
    state: Mutex<LoadState>,
    exif: Option<ExifInfo>,
    grayscale: bool,
    elapsed_ms: f64,
    estimated_ms: f64,
}

impl Composite {
    /// A pending composite for `path`. File size is read once here; a
    /// missing file yields size 0 and will fail at decode time.
    pub fn new(path: UniversalPath) -> Self {
        let format = ImageFormat::from_path(path.as_path());
        let file_size = std::fs::metadata(path.as_path()).map(|m| m.len()).unwrap_or(0);

        Self {
            path,
            format,
            file_size,
            payload: RwLock::new(None),
            state: Mutex::new(LoadState::Pending),
            exif: None,
            grayscale: false,
            elapsed_ms: 0.0,
            estimated_ms: 0.0,
        }
    }

    pub fn path(&self) -> &UniversalPath {
        &self.path
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn state(&self) -> LoadState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: LoadState) {
        let mut current = self.state.lock();
        if *current != LoadState::Disposed {
            *current = state;
        }
    }

    /// Store a decoded payload. Replaces any previous one.
    pub fn set_payload(&mut self, payload: Payload) {
        *self.payload.get_mut() = Some(payload);
    }

    pub fn set_exif(&mut self, exif: Option<ExifInfo>) {
        self.exif = exif;
    }

    pub fn set_grayscale(&mut self, grayscale: bool) {
        self.grayscale = grayscale;
    }

    pub(crate) fn set_timing(&mut self, estimated_ms: f64, elapsed_ms: f64) {
        self.estimated_ms = estimated_ms;
        self.elapsed_ms = elapsed_ms;
    }

    /// Read access to the payload; `None` if decoding failed, is pending,
    /// or the composite was disposed.
    pub fn payload(&self) -> RwLockReadGuard<'_, Option<Payload>> {
        self.payload.read()
    }

    /// True when there is nothing to draw. Distinct from "still loading":
    /// check [`Composite::state`] for that.
    pub fn is_empty(&self) -> bool {
        self.payload.read().is_none()
    }

    pub fn is_vector(&self) -> bool {
        matches!(*self.payload.read(), Some(Payload::Vector(_)))
    }

    pub fn is_grayscale(&self) -> bool {
        self.grayscale
    }

    pub fn exif(&self) -> Option<&ExifInfo> {
        self.exif.as_ref()
    }

    /// Observed decode duration
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Estimate taken before decoding started; 0 means no estimate
    pub fn estimated_ms(&self) -> f64 {
        self.estimated_ms
    }

    /// Intrinsic content size, (0, 0) when empty
    pub fn content_size(&self) -> (f32, f32) {
        self.payload.read().as_ref().map(Payload::size).unwrap_or((0.0, 0.0))
    }

    pub fn scaled_content_size(&self, zoom: f32) -> (f32, f32) {
        let (w, h) = self.content_size();
        (w * zoom, h * zoom)
    }

    /// Release the payload. Returns `true` only for the call that actually
    /// disposed; later calls are no-ops, so eviction and shutdown may race.
    pub fn dispose(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == LoadState::Disposed {
                return false;
            }
            *state = LoadState::Disposed;
        }

        self.payload.write().take();
        tracing::trace!("Disposed {}", self.path);
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == LoadState::Disposed
    }
}

impl fmt::Debug for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composite")
            .field("path", &self.path.display())
            .field("format", &self.format)
            .field("state", &self.state())
            .field("empty", &self.is_empty())
            .field("elapsed_ms", &self.elapsed_ms)
            .finish_non_exhaustive()
    }
}

//! Imaging error types

use crate::native::NativeKind;
use resvg::usvg;
use thiserror::Error;

/// Errors surfaced by the [`crate::Imaging`] facade.
///
/// Only contract violations show up here; decode failures become empty
/// composites instead.
#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a decode strategy gave up. Never crosses the loader boundary.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("SVG parse error: {0}")]
    Svg(#[from] usvg::Error),

    #[cfg(feature = "heif")]
    #[error("HEIF decode error: {0}")]
    Heif(#[from] libheif_rs::HeifError),

    #[error("Native decoder error: {0}")]
    Native(#[from] NativeError),

    #[error("Decode cancelled")]
    Cancelled,
}

/// Failures at the native library boundary
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("Native library error: {0}")]
    Library(#[from] libloading::Error),

    #[error("No native {0:?} decoder available")]
    Unavailable(NativeKind),

    #[error("Native decoder rejected {0}")]
    LoadFailed(String),

    #[error("Native decoder returned a null buffer")]
    NullBuffer,

    #[error("Native decoder returned invalid dimensions {0}x{1}")]
    InvalidDimensions(i32, i32),

    #[error("Path cannot be passed to native code: {0}")]
    InvalidPath(String),
}

/// Background submission failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("Preload queue is full")]
    Full,

    #[error("Preload pool is shut down")]
    Closed,
}

/// Estimator persistence failures
#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimator_errors_wrap_their_source() {
        let io: EstimatorError = std::io::Error::other("disk full").into();
        let json: EstimatorError = serde_json::from_str::<u32>("x").unwrap_err().into();

        // Every variant carries an underlying cause
        let wraps_source = |e: &EstimatorError| match e {
            EstimatorError::Io(_) | EstimatorError::Json(_) => true,
        };
        assert!(wraps_source(&io));
        assert!(wraps_source(&json));
        assert!(io.to_string().contains("disk full"));
    }
}

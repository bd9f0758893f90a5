//! Lumen file system layer
//!
//! - UniversalPath: canonical path identity and cache keys
//! - Image directory listing in natural order

mod browser;
mod universal_path;

pub use browser::{list_images, natural_cmp};
pub use universal_path::{PathKey, UniversalPath};

use thiserror::Error;

/// File system errors
#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

//! Application error types

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Recoverable (notify user, continue) =====
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("No images found in {0}")]
    NoImages(String),

    // ===== Fatal (application termination) =====
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Init(String),
}

impl AppError {
    /// Is this error recoverable?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Io(_) | AppError::FileNotFound(_) | AppError::InvalidPath(_) | AppError::NoImages(_)
        )
    }

    /// Is this a fatal error?
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Get a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::FileNotFound(path) => format!("File not found: {}", path),
            AppError::NoImages(dir) => format!("Nothing to show in {}", dir),
            AppError::Init(msg) => format!("Could not start: {}", msg),
            _ => self.to_string(),
        }
    }
}

impl From<app_fs::FsError> for AppError {
    fn from(e: app_fs::FsError) -> Self {
        match e {
            app_fs::FsError::NotFound(p) => AppError::FileNotFound(p),
            app_fs::FsError::InvalidPath(p) => AppError::InvalidPath(p),
            app_fs::FsError::Io(e) => AppError::Io(e),
        }
    }
}

impl From<app_imaging::ImagingError> for AppError {
    fn from(e: app_imaging::ImagingError) -> Self {
        match e {
            app_imaging::ImagingError::NotFound(p) => AppError::FileNotFound(p),
            app_imaging::ImagingError::NotAFile(p) => AppError::InvalidPath(p),
            app_imaging::ImagingError::Io(e) => AppError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(AppError::FileNotFound("a.png".into()).is_recoverable());
        assert!(AppError::Init("no pool".into()).is_fatal());
    }

    #[test]
    fn test_from_fs_error() {
        let err: AppError = app_fs::FsError::NotFound("/x".into()).into();
        assert!(matches!(err, AppError::FileNotFound(p) if p == "/x"));
        assert_eq!(
            AppError::NoImages("/photos".into()).user_message(),
            "Nothing to show in /photos"
        );
    }
}

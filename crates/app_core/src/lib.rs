//! Lumen core application logic
//!
//! This crate contains:
//! - Configuration
//! - Error types
//! - Navigation over an image collection
//! - The viewer session tying navigation to the imaging pipeline
//!
//! There is no global state: the binary owns a [`ViewerSession`] and passes
//! it where it is needed.

pub mod config;
pub mod error;
pub mod navigation;
pub mod session;

pub use config::{AppConfig, GeneralConfig, ImagingConfig};
pub use error::AppError;
pub use navigation::Navigator;
pub use session::{imaging_options, ViewerSession};

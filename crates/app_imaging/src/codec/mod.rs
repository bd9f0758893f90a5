//! Decoder strategies
//!
//! A closed set of format families. Every strategy takes a pending
//! [`Composite`], fills in what it can and hands it back; failures are logged
//! and leave the composite payload-less.

mod float;
#[cfg(feature = "heif")]
mod heif;
mod raster;
mod svg;

pub use float::{detect_grayscale, tone_map, tone_map_channel, FloatRgbaDecoder};
#[cfg(feature = "heif")]
pub use heif::HeifDecoder;
pub use raster::RasterDecoder;
pub use svg::SvgDecoder;

use crate::cancel::CancelToken;
use crate::composite::{Composite, LoadState};
use crate::error::DecodeError;
use crate::format::ImageFormat;

/// One decoder per format family
#[derive(Debug)]
pub enum Decoder {
    Raster(RasterDecoder),
    #[cfg(feature = "heif")]
    Heif(HeifDecoder),
    FloatRgba(FloatRgbaDecoder),
    Vector(SvgDecoder),
}

impl Decoder {
    /// Name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Decoder::Raster(_) => "RasterDecoder",
            #[cfg(feature = "heif")]
            Decoder::Heif(_) => "HeifDecoder",
            Decoder::FloatRgba(d) => d.name(),
            Decoder::Vector(_) => "SvgDecoder",
        }
    }

    pub fn can_decode(&self, format: ImageFormat) -> bool {
        match self {
            Decoder::Raster(d) => d.can_decode(format),
            #[cfg(feature = "heif")]
            Decoder::Heif(d) => d.can_decode(format),
            Decoder::FloatRgba(d) => d.can_decode(format),
            Decoder::Vector(d) => d.can_decode(format),
        }
    }

    /// Decode into `composite`. Never fails: the returned composite is
    /// `Complete` with a payload, or `Failed`/`Cancelled` without one.
    pub fn decode(&self, mut composite: Composite, cancel: &CancelToken) -> Composite {
        tracing::debug!(
            "[{}] [Thread: {}] Decoding {}",
            self.name(),
            current_thread_name(),
            composite.path()
        );

        composite.set_state(LoadState::Loading);

        let result = if cancel.is_cancelled() {
            Err(DecodeError::Cancelled)
        } else {
            match self {
                Decoder::Raster(d) => d.decode_into(&mut composite, cancel),
                #[cfg(feature = "heif")]
                Decoder::Heif(d) => d.decode_into(&mut composite, cancel),
                Decoder::FloatRgba(d) => d.decode_into(&mut composite, cancel),
                Decoder::Vector(d) => d.decode_into(&mut composite, cancel),
            }
        };

        match result {
            Ok(()) => composite.set_state(LoadState::Complete),
            Err(DecodeError::Cancelled) => {
                tracing::debug!("[{}] Cancelled: {}", self.name(), composite.path());
                composite.set_state(LoadState::Cancelled);
            }
            Err(e) => {
                tracing::warn!("[{}] Image could not be loaded: {}: {}", self.name(), composite.path(), e);
                composite.set_state(LoadState::Failed);
            }
        }

        composite
    }
}

pub(crate) fn current_thread_name() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

pub(crate) fn check_cancelled(cancel: &CancelToken) -> Result<(), DecodeError> {
    if cancel.is_cancelled() {
        Err(DecodeError::Cancelled)
    } else {
        Ok(())
    }
}

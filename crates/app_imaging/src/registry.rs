//! Format → decoder lookup

#[cfg(feature = "heif")]
use crate::codec::HeifDecoder;
use crate::codec::{Decoder, FloatRgbaDecoder, RasterDecoder, SvgDecoder};
use crate::format::ImageFormat;
use crate::native::{NativeCodec, NativeKind};
use std::path::PathBuf;

/// Native codecs available to the standard registry
#[derive(Debug, Default)]
pub struct NativeLibraries {
    pub hdr: Option<NativeCodec>,
    pub exr: Option<NativeCodec>,
}

impl NativeLibraries {
    /// Look for both libraries in the install locations plus `extra_dirs`
    pub fn discover(extra_dirs: &[PathBuf]) -> Self {
        Self {
            hdr: NativeCodec::discover(NativeKind::Hdr, extra_dirs),
            exr: NativeCodec::discover(NativeKind::Exr, extra_dirs),
        }
    }

    /// No native decoding; HDR and EXR files fail cleanly
    pub fn none() -> Self {
        Self::default()
    }
}

/// Ordered strategy list with a designated fallback.
///
/// Lookup walks `strategies` in order and returns the first one claiming
/// the format; if none does, `fallback` is returned.
#[derive(Debug)]
pub struct DecoderRegistry {
    strategies: Vec<Decoder>,
    fallback: Decoder,
}

impl DecoderRegistry {
    pub fn new(strategies: Vec<Decoder>, fallback: Decoder) -> Self {
        Self { strategies, fallback }
    }

    /// HEIF (with the `heif` feature), raster, HDR, EXR, SVG; raster fallback
    pub fn standard(natives: NativeLibraries) -> Self {
        let mut strategies = Vec::with_capacity(5);
        #[cfg(feature = "heif")]
        strategies.push(Decoder::Heif(HeifDecoder));
        strategies.extend([
            Decoder::Raster(RasterDecoder),
            Decoder::FloatRgba(FloatRgbaDecoder::new(NativeKind::Hdr, natives.hdr)),
            Decoder::FloatRgba(FloatRgbaDecoder::new(NativeKind::Exr, natives.exr)),
            Decoder::Vector(SvgDecoder),
        ]);

        Self::new(strategies, Decoder::Raster(RasterDecoder))
    }

    pub fn get(&self, format: ImageFormat) -> &Decoder {
        self.strategies
            .iter()
            .find(|d| d.can_decode(format))
            .unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_dispatch() {
        let registry = DecoderRegistry::standard(NativeLibraries::none());

        assert_eq!(registry.get(ImageFormat::Png).name(), "RasterDecoder");
        assert_eq!(registry.get(ImageFormat::Jpeg).name(), "RasterDecoder");
        assert_eq!(registry.get(ImageFormat::Hdr).name(), "HdrDecoder");
        assert_eq!(registry.get(ImageFormat::Exr).name(), "ExrDecoder");
        assert_eq!(registry.get(ImageFormat::Svg).name(), "SvgDecoder");
    }

    #[test]
    fn test_unclaimed_uses_fallback() {
        let registry = DecoderRegistry::standard(NativeLibraries::none());
        assert_eq!(registry.get(ImageFormat::Unknown).name(), "RasterDecoder");
    }

    #[test]
    fn test_heif_dispatch() {
        let registry = DecoderRegistry::standard(NativeLibraries::none());
        let expected = if cfg!(feature = "heif") { "HeifDecoder" } else { "RasterDecoder" };
        assert_eq!(registry.get(ImageFormat::Heif).name(), expected);
        assert_eq!(registry.get(ImageFormat::Avif).name(), expected);
    }

    #[test]
    fn test_first_match_wins() {
        let registry = DecoderRegistry::new(
            vec![Decoder::Vector(SvgDecoder), Decoder::Raster(RasterDecoder)],
            Decoder::FloatRgba(FloatRgbaDecoder::new(NativeKind::Hdr, None)),
        );

        assert_eq!(registry.get(ImageFormat::Svg).name(), "SvgDecoder");
        assert_eq!(registry.get(ImageFormat::Png).name(), "RasterDecoder");
        assert_eq!(registry.get(ImageFormat::Unknown).name(), "HdrDecoder");
    }
}

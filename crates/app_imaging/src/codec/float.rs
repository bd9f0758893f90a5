//! Linear float RGBA formats decoded by native libraries, tone mapped to RGBA8

use super::check_cancelled;
use crate::cancel::CancelToken;
use crate::composite::{Composite, Payload, RasterImage};
use crate::error::{DecodeError, NativeError};
use crate::format::ImageFormat;
use crate::native::{NativeCodec, NativeKind};
use rayon::prelude::*;
use std::sync::Arc;

const GAMMA: f32 = 1.0 / 2.2;

/// Decoder for one native float format (HDR or EXR)
#[derive(Debug)]
pub struct FloatRgbaDecoder {
    kind: NativeKind,
    codec: Option<Arc<NativeCodec>>,
}

impl FloatRgbaDecoder {
    /// `codec` may be `None` when the library could not be found; the
    /// decoder still claims its format so such files fail cleanly instead
    /// of reaching the raster fallback.
    pub fn new(kind: NativeKind, codec: Option<NativeCodec>) -> Self {
        if let Some(codec) = &codec {
            debug_assert_eq!(codec.kind(), kind);
        }

        Self {
            kind,
            codec: codec.map(Arc::new),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            NativeKind::Hdr => "HdrDecoder",
            NativeKind::Exr => "ExrDecoder",
        }
    }

    pub fn kind(&self) -> NativeKind {
        self.kind
    }

    pub fn is_available(&self) -> bool {
        self.codec.is_some()
    }

    pub fn can_decode(&self, format: ImageFormat) -> bool {
        format == self.kind.format()
    }

    pub(crate) fn decode_into(
        &self,
        composite: &mut Composite,
        cancel: &CancelToken,
    ) -> Result<(), DecodeError> {
        let codec = self.codec.as_ref().ok_or(NativeError::Unavailable(self.kind))?;

        let pixels = codec.load(composite.path().as_path())?;
        // From here on `pixels` is released by drop on every path
        check_cancelled(cancel)?;

        let (rgba, grayscale) = tone_map(pixels.as_slice());
        let (width, height) = (pixels.width(), pixels.height());
        drop(pixels);
        check_cancelled(cancel)?;

        composite.set_grayscale(grayscale);
        composite.set_payload(Payload::Raster(RasterImage::new(width, height, rgba)));

        Ok(())
    }
}

/// `clamp(255 * max(v, 0)^(1/2.2))`
pub fn tone_map_channel(value: f32) -> u8 {
    // f32::max discards NaN, so NaN maps to 0
    (value.max(0.0).powf(GAMMA) * 255.0).clamp(0.0, 255.0) as u8
}

/// True when every pixel has G and B exactly zero
pub fn detect_grayscale(src: &[f32]) -> bool {
    src.par_chunks_exact(4).all(|px| px[1] == 0.0 && px[2] == 0.0)
}

/// Convert interleaved float RGBA to RGBA8.
///
/// Grayscale is detected on the source first. Grayscale sources carry their
/// intensity in R only, so it is replicated into G and B.
pub fn tone_map(src: &[f32]) -> (Vec<u8>, bool) {
    let grayscale = detect_grayscale(src);
    let mut out = vec![0u8; src.len() / 4 * 4];

    out.par_chunks_exact_mut(4)
        .zip(src.par_chunks_exact(4))
        .for_each(|(dst, px)| {
            let r = tone_map_channel(px[0]);
            if grayscale {
                dst[0] = r;
                dst[1] = r;
                dst[2] = r;
            } else {
                dst[0] = r;
                dst[1] = tone_map_channel(px[1]);
                dst[2] = tone_map_channel(px[2]);
            }
            dst[3] = tone_map_channel(px[3]);
        });

    (out, grayscale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Decoder;
    use crate::composite::LoadState;
    use crate::native::testing::*;
    use app_fs::UniversalPath;
    use std::ffi::{c_char, c_int};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tone_map_channel() {
        assert_eq!(tone_map_channel(0.0), 0);
        assert_eq!(tone_map_channel(-3.0), 0);
        assert_eq!(tone_map_channel(1.0), 255);
        assert_eq!(tone_map_channel(40.0), 255);
        assert_eq!(tone_map_channel(f32::NAN), 0);
        // 0.5^(1/2.2) * 255 = 186.1
        assert_eq!(tone_map_channel(0.5), 186);
    }

    #[test]
    fn test_grayscale_replicates_red() {
        let src = [0.5, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0];
        let (rgba, gray) = tone_map(&src);
        assert!(gray);
        assert_eq!(rgba, vec![186, 186, 186, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_color_source() {
        let src = [1.0, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let (rgba, gray) = tone_map(&src);
        assert!(!gray);
        assert_eq!(rgba, vec![255, 186, 0, 255, 0, 0, 0, 0]);
    }

    static HDR_LOADS: AtomicUsize = AtomicUsize::new(0);
    static HDR_FREES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn hdr_load(
        path: *const c_char,
        pixels: *mut *mut f32,
        width: *mut c_int,
        height: *mut c_int,
    ) -> bool {
        HDR_LOADS.fetch_add(1, Ordering::SeqCst);
        assert!(path_str(path).ends_with("sky.hdr"));
        write_out(pixels, width, height, 1, 2, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.5, 0.0, 1.0]);
        true
    }

    unsafe extern "C" fn hdr_free(ptr: *mut f32) {
        HDR_FREES.fetch_add(1, Ordering::SeqCst);
        reclaim_buffer(ptr, 8);
    }

    #[test]
    fn test_native_decode_releases_buffer() {
        let codec = unsafe { NativeCodec::from_fns(NativeKind::Hdr, hdr_load, hdr_free) };
        let decoder = Decoder::FloatRgba(FloatRgbaDecoder::new(NativeKind::Hdr, Some(codec)));

        let composite = Composite::new(UniversalPath::new("/images/sky.hdr"));
        let composite = decoder.decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Complete);
        assert_eq!(composite.content_size(), (1.0, 2.0));
        assert!(!composite.is_grayscale());
        assert_eq!(HDR_LOADS.load(Ordering::SeqCst), 1);
        assert_eq!(HDR_FREES.load(Ordering::SeqCst), 1);
    }

    static REJECT_FREES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn reject_load(
        _path: *const c_char,
        _pixels: *mut *mut f32,
        _width: *mut c_int,
        _height: *mut c_int,
    ) -> bool {
        false
    }

    unsafe extern "C" fn reject_free(_ptr: *mut f32) {
        REJECT_FREES.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_native_rejection_is_failed_without_free() {
        let codec = unsafe { NativeCodec::from_fns(NativeKind::Hdr, reject_load, reject_free) };
        let decoder = Decoder::FloatRgba(FloatRgbaDecoder::new(NativeKind::Hdr, Some(codec)));

        let composite = Composite::new(UniversalPath::new("/images/bad.hdr"));
        let composite = decoder.decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Failed);
        assert!(composite.is_empty());
        assert_eq!(REJECT_FREES.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_library_fails_cleanly() {
        let decoder = Decoder::FloatRgba(FloatRgbaDecoder::new(NativeKind::Exr, None));
        assert!(decoder.can_decode(ImageFormat::Exr));

        let composite = Composite::new(UniversalPath::new("/images/a.exr"));
        let composite = decoder.decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Failed);
        assert!(composite.is_empty());
    }
}

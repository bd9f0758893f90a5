//! HEIF/HEIC and AVIF via libheif

use super::check_cancelled;
use crate::cancel::CancelToken;
use crate::composite::{Composite, Payload, RasterImage};
use crate::error::DecodeError;
use crate::exif::ExifInfo;
use crate::format::ImageFormat;
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};

#[derive(Debug, Default, Clone, Copy)]
pub struct HeifDecoder;

impl HeifDecoder {
    pub fn can_decode(&self, format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Heif | ImageFormat::Avif)
    }

    pub(crate) fn decode_into(
        &self,
        composite: &mut Composite,
        cancel: &CancelToken,
    ) -> Result<(), DecodeError> {
        let path = composite.path().to_path_buf();
        let name = path
            .to_str()
            .ok_or_else(|| DecodeError::Io(std::io::Error::other("path is not valid UTF-8")))?;

        let lib = LibHeif::new();
        let context = HeifContext::read_from_file(name)?;
        let handle = context.primary_image_handle()?;
        check_cancelled(cancel)?;

        let image = lib.decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)?;
        check_cancelled(cancel)?;

        let planes = image.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| DecodeError::Io(std::io::Error::other("no interleaved RGBA plane")))?;

        // Rows may be padded past width * 4
        let row_bytes = plane.width as usize * 4;
        let mut pixels = Vec::with_capacity(row_bytes * plane.height as usize);
        for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
            pixels.extend_from_slice(&row[..row_bytes.min(row.len())]);
        }

        composite.set_exif(read_exif(&handle));
        composite.set_payload(Payload::Raster(RasterImage::new(plane.width, plane.height, pixels)));

        Ok(())
    }
}

fn read_exif(handle: &ImageHandle) -> Option<ExifInfo> {
    handle
        .metadata_block_ids(b"Exif")
        .into_iter()
        .find_map(|id| handle.metadata(id).ok())
        .and_then(|block| ExifInfo::from_tiff(&block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Decoder;
    use crate::composite::LoadState;
    use app_fs::UniversalPath;
    use tempfile::TempDir;

    #[test]
    fn test_claims() {
        assert!(HeifDecoder.can_decode(ImageFormat::Heif));
        assert!(HeifDecoder.can_decode(ImageFormat::Avif));
        assert!(!HeifDecoder.can_decode(ImageFormat::Jpeg));
    }

    #[test]
    fn test_garbage_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.heic");
        std::fs::write(&path, b"definitely not ISOBMFF").unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Heif(HeifDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Failed);
        assert!(composite.is_empty());
    }
}

//! Standard raster codecs via the `image` crate

use super::check_cancelled;
use crate::cancel::CancelToken;
use crate::composite::{Composite, Payload, RasterImage};
use crate::error::DecodeError;
use crate::exif::ExifInfo;
use crate::format::ImageFormat;
use image::ImageReader;

const CLAIMS: [ImageFormat; 8] = [
    ImageFormat::Bmp,
    ImageFormat::Gif,
    ImageFormat::Ico,
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Webp,
    ImageFormat::Tga,
    ImageFormat::Tiff,
];

/// General-purpose raster decoder, also the registry fallback
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

impl RasterDecoder {
    pub fn can_decode(&self, format: ImageFormat) -> bool {
        CLAIMS.contains(&format)
    }

    pub(crate) fn decode_into(
        &self,
        composite: &mut Composite,
        cancel: &CancelToken,
    ) -> Result<(), DecodeError> {
        let path = composite.path().to_path_buf();

        // Sniff content; extensions lie often enough
        let img = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
        check_cancelled(cancel)?;

        let grayscale = !img.color().has_color();
        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        check_cancelled(cancel)?;

        composite.set_exif(ExifInfo::read(&path));
        composite.set_grayscale(grayscale);
        composite.set_payload(Payload::Raster(RasterImage::new(width, height, rgba.into_raw())));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::LoadState;
    use crate::codec::Decoder;
    use app_fs::UniversalPath;
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_decode_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("red.png");
        RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255])).save(&path).unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Raster(RasterDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Complete);
        assert_eq!(composite.content_size(), (3.0, 2.0));
        assert!(!composite.is_grayscale());

        let payload = composite.payload();
        let Some(Payload::Raster(img)) = payload.as_ref() else {
            panic!("expected raster payload");
        };
        assert_eq!(&img.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_gray_source_flagged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(2, 2, Luma([128])).save(&path).unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Raster(RasterDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Complete);
        assert!(composite.is_grayscale());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Raster(RasterDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Failed);
        assert!(composite.is_empty());
    }
}

//! Image format classification by file extension

use std::fmt;
use std::path::Path;

/// Logical image format, as far as the pipeline cares about it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageFormat {
    Bmp,
    Gif,
    Ico,
    Jpeg,
    Png,
    Webp,
    Tga,
    Tiff,
    Heif,
    Avif,
    Exr,
    Hdr,
    Svg,
    Unknown,
}

impl ImageFormat {
    /// Every known format, in declaration order
    pub const ALL: [ImageFormat; 13] = [
        ImageFormat::Bmp,
        ImageFormat::Gif,
        ImageFormat::Ico,
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Tga,
        ImageFormat::Tiff,
        ImageFormat::Heif,
        ImageFormat::Avif,
        ImageFormat::Exr,
        ImageFormat::Hdr,
        ImageFormat::Svg,
    ];

    /// File extensions (lowercase, without dot) claimed by this format
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Bmp => &["bmp"],
            ImageFormat::Gif => &["gif"],
            ImageFormat::Ico => &["ico"],
            ImageFormat::Jpeg => &["jpg", "jpeg", "jfif"],
            ImageFormat::Png => &["png"],
            ImageFormat::Webp => &["webp"],
            ImageFormat::Tga => &["tga"],
            ImageFormat::Tiff => &["tif", "tiff"],
            ImageFormat::Heif => &["heic", "heif"],
            ImageFormat::Avif => &["avif"],
            ImageFormat::Exr => &["exr"],
            ImageFormat::Hdr => &["hdr"],
            ImageFormat::Svg => &["svg"],
            ImageFormat::Unknown => &[],
        }
    }

    /// Classify an extension. Accepts `"png"`, `".PNG"`, `" .Png "`.
    pub fn from_extension(ext: &str) -> Self {
        let normalized = normalize_extension(ext);
        if normalized.is_empty() {
            return ImageFormat::Unknown;
        }

        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&normalized.as_str()))
            .unwrap_or(ImageFormat::Unknown)
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(ImageFormat::Unknown)
    }

    /// Whether files with this extension should be offered to the viewer at all
    pub fn is_supported(ext: &str) -> bool {
        let format = Self::from_extension(ext);
        format != ImageFormat::Unknown && !format.is_disabled()
    }

    /// Formats that are recognised but have no decoder in this build.
    /// HEIF and AVIF need the `heif` feature (libheif).
    pub fn is_disabled(self) -> bool {
        cfg!(not(feature = "heif")) && matches!(self, ImageFormat::Heif | ImageFormat::Avif)
    }

    /// Formats that are only decoded on demand, never warmed in the background
    pub fn is_preload_disabled(self) -> bool {
        false
    }

    /// Stable upper-case tag used in persisted statistics
    pub fn tag(self) -> &'static str {
        match self {
            ImageFormat::Bmp => "BMP",
            ImageFormat::Gif => "GIF",
            ImageFormat::Ico => "ICO",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Tga => "TGA",
            ImageFormat::Tiff => "TIFF",
            ImageFormat::Heif => "HEIF",
            ImageFormat::Avif => "AVIF",
            ImageFormat::Exr => "EXR",
            ImageFormat::Hdr => "HDR",
            ImageFormat::Svg => "SVG",
            ImageFormat::Unknown => "UNKNOWN",
        }
    }

    /// Inverse of [`ImageFormat::tag`]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(ImageFormat::from_extension("png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension(".JPG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension(" .Tif "), ImageFormat::Tiff);
        assert_eq!(ImageFormat::from_extension("exr"), ImageFormat::Exr);
        assert_eq!(ImageFormat::from_extension("txt"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_extension(""), ImageFormat::Unknown);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(ImageFormat::from_path(Path::new("/tmp/a.svg")), ImageFormat::Svg);
        assert_eq!(ImageFormat::from_path(Path::new("/tmp/noext")), ImageFormat::Unknown);
    }

    #[test]
    fn test_is_supported() {
        assert!(ImageFormat::is_supported("webp"));
        assert!(ImageFormat::is_supported(".hdr"));
        assert_eq!(ImageFormat::is_supported("heic"), cfg!(feature = "heif"));
        assert_eq!(ImageFormat::is_supported("avif"), cfg!(feature = "heif"));
        assert!(!ImageFormat::is_supported("mp4"));
    }

    #[test]
    fn test_tag_round_trip() {
        for format in ImageFormat::ALL {
            assert_eq!(ImageFormat::from_tag(format.tag()), Some(format));
        }
        assert_eq!(ImageFormat::from_tag("nope"), None);
    }
}

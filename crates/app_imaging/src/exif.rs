//! Camera / exposure metadata attached to decoded images

use ::exif::{Exif, In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Human-readable EXIF summary. Empty strings mean "not present".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifInfo {
    pub make: String,
    pub model: String,
    pub lens: String,

    pub exposure_time: String,
    pub f_number: String,
    pub iso: String,

    pub taken: String,

    pub gps_latitude: String,
    pub gps_longitude: String,

    pub compression: String,
    pub software: String,
}

/// One display row; `None` marks a group separator
type Row<'a> = Option<(&'static str, &'a str)>;

impl ExifInfo {
    /// Read EXIF from an image container (JPEG, TIFF, PNG, WebP, HEIF).
    /// Returns `None` when the file has no readable EXIF block.
    pub fn read(path: &Path) -> Option<Self> {
        let file = File::open(path).ok()?;
        let mut reader = BufReader::new(file);

        match ::exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Some(Self::from_exif(&exif)),
            Err(e) => {
                tracing::trace!("No EXIF in {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Parse a bare TIFF-structured EXIF block, as stored in HEIF
    /// containers. A leading 4-byte header offset (ISO/IEC 23008-12) is
    /// honoured when present.
    pub fn from_tiff(data: &[u8]) -> Option<Self> {
        let tiff = match data.get(..4) {
            Some(&[b'I', b'I', ..]) | Some(&[b'M', b'M', ..]) => data,
            Some(header) => {
                let offset = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
                data.get(4 + offset..)?
            }
            None => return None,
        };

        match ::exif::Reader::new().read_raw(tiff.to_vec()) {
            Ok(exif) => Some(Self::from_exif(&exif)),
            Err(e) => {
                tracing::trace!("Unreadable EXIF block: {}", e);
                None
            }
        }
    }

    fn from_exif(exif: &Exif) -> Self {
        let get = |tag: Tag| describe(exif, tag);

        Self {
            make: get(Tag::Make),
            model: get(Tag::Model),
            lens: get(Tag::LensModel),
            exposure_time: get(Tag::ExposureTime),
            f_number: get(Tag::FNumber),
            iso: get(Tag::PhotographicSensitivity),
            taken: get(Tag::DateTimeOriginal),
            gps_latitude: get(Tag::GPSLatitude),
            gps_longitude: get(Tag::GPSLongitude),
            compression: get(Tag::Compression),
            software: get(Tag::Software),
        }
    }

    /// Whether any field carries a value
    pub fn has_data(&self) -> bool {
        self.rows()
            .iter()
            .flatten()
            .any(|(_, value)| !value.trim().is_empty())
    }

    /// `"Label: value"` lines for an info overlay. Groups are separated by a
    /// single blank line; empty groups and leading/trailing blanks are dropped.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut pending_blank = false;

        for row in self.rows() {
            match row {
                None => pending_blank = !lines.is_empty(),
                Some((_, value)) if value.trim().is_empty() => {}
                Some((label, value)) => {
                    if pending_blank {
                        lines.push(String::new());
                        pending_blank = false;
                    }
                    lines.push(format!("{}: {}", label, value));
                }
            }
        }

        lines
    }

    fn rows(&self) -> [Row<'_>; 15] {
        [
            Some(("Make", &self.make)),
            Some(("Model", &self.model)),
            Some(("Lens", &self.lens)),
            None,
            Some(("Exposure Time", &self.exposure_time)),
            Some(("Aperture", &self.f_number)),
            Some(("ISO", &self.iso)),
            None,
            Some(("Taken", &self.taken)),
            None,
            Some(("GPS Latitude", &self.gps_latitude)),
            Some(("GPS Longitude", &self.gps_longitude)),
            None,
            Some(("Compression", &self.compression)),
            Some(("Software", &self.software)),
        ]
    }
}

fn describe(exif: &Exif, tag: Tag) -> String {
    let Some(field) = exif.get_field(tag, In::PRIMARY) else {
        return String::new();
    };

    match &field.value {
        // display_value() quotes ASCII values; strip to the raw text
        Value::Ascii(parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => field.display_value().with_unit(exif).to_string(),
    }
}

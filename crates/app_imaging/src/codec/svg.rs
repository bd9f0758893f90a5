//! SVG documents kept as resolution-independent `usvg` trees

use super::check_cancelled;
use crate::cancel::CancelToken;
use crate::composite::{Composite, Payload, VectorDrawing};
use crate::error::DecodeError;
use crate::format::ImageFormat;
use resvg::usvg;

/// Upper bound for measured content, in document units
const MEASURE_LIMIT: f32 = 4096.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct SvgDecoder;

impl SvgDecoder {
    pub fn can_decode(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Svg
    }

    pub(crate) fn decode_into(
        &self,
        composite: &mut Composite,
        cancel: &CancelToken,
    ) -> Result<(), DecodeError> {
        let path = composite.path().to_path_buf();
        let data = std::fs::read(&path)?;
        check_cancelled(cancel)?;

        let options = usvg::Options {
            resources_dir: path.parent().map(|p| p.to_path_buf()),
            ..usvg::Options::default()
        };
        let (tree, (width, height)) = match usvg::Tree::from_data(&data, &options) {
            Ok(tree) => {
                let bounds = drawing_bounds(&tree);
                (tree, bounds)
            }
            // A zero or negative root size is rejected by the parser; measure
            // the content instead
            Err(usvg::Error::InvalidSize) => {
                let text = std::str::from_utf8(&data)
                    .ok()
                    .and_then(strip_root_size)
                    .ok_or(usvg::Error::InvalidSize)?;
                let tree = usvg::Tree::from_str(&text, &options)?;
                let bounds = measure_content(&tree);
                (tree, bounds)
            }
            Err(e) => return Err(e.into()),
        };
        check_cancelled(cancel)?;

        composite.set_payload(Payload::Vector(VectorDrawing { tree, width, height }));

        Ok(())
    }
}

/// Layout size of a drawing.
///
/// Uses the document size when it is at least one unit each way. Otherwise
/// the content is measured: the extent of everything drawn, stroke included,
/// measured from the origin and capped at [`MEASURE_LIMIT`].
pub(crate) fn drawing_bounds(tree: &usvg::Tree) -> (f32, f32) {
    let size = tree.size();
    if size.width() >= 1.0 && size.height() >= 1.0 {
        return (size.width(), size.height());
    }

    measure_content(tree)
}

/// Extent of everything drawn, from the origin, within `[1, MEASURE_LIMIT]`
pub(crate) fn measure_content(tree: &usvg::Tree) -> (f32, f32) {
    let bounds = tree.root().abs_stroke_bounding_box();
    let measured = (
        bounds.right().clamp(1.0, MEASURE_LIMIT),
        bounds.bottom().clamp(1.0, MEASURE_LIMIT),
    );

    tracing::debug!(
        "[SvgDecoder] Degenerate document size {}x{}, measured {}x{}",
        tree.size().width(),
        tree.size().height(),
        measured.0,
        measured.1
    );

    measured
}

/// Copy of `text` with `width` and `height` removed from the root `<svg>`
/// start tag. `None` when there is no recognisable root tag.
fn strip_root_size(text: &str) -> Option<String> {
    let start = text.match_indices("<svg").map(|(i, _)| i).find(|&i| {
        text[i + 4..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
    })?;
    let end = start + text[start..].find('>')?;

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&strip_attributes(&text[start..end], &["width", "height"])?);
    out.push_str(&text[end..]);
    Some(out)
}

/// `tag` is a start tag without its closing `>`
fn strip_attributes(tag: &str, names: &[&str]) -> Option<String> {
    let mut rest = tag.strip_prefix("<svg")?;
    let mut out = String::from("<svg");

    loop {
        let trimmed = rest.trim_start();
        let name_len = trimmed
            .find(|c: char| c == '=' || c == '/' || c.is_whitespace())
            .unwrap_or(trimmed.len());
        if name_len == 0 {
            out.push_str(rest);
            return Some(out);
        }

        let name = &trimmed[..name_len];
        let value = trimmed[name_len..].trim_start().strip_prefix('=')?.trim_start();
        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value_len = value[1..].find(quote)? + 2;
        let consumed = rest.len() - value.len() + value_len;

        if !names.contains(&name) {
            out.push_str(&rest[..consumed]);
        }
        rest = &rest[consumed..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Decoder;
    use crate::composite::LoadState;
    use app_fs::UniversalPath;
    use tempfile::TempDir;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="30">
        <rect x="0" y="0" width="40" height="30" fill="red"/>
    </svg>"#;

    #[test]
    fn test_decode_svg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("square.svg");
        std::fs::write(&path, SQUARE).unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Vector(SvgDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Complete);
        assert!(composite.is_vector());
        assert_eq!(composite.content_size(), (40.0, 30.0));
    }

    #[test]
    fn test_bounds_use_document_size() {
        let tree = usvg::Tree::from_str(SQUARE, &usvg::Options::default()).unwrap();
        assert_eq!(drawing_bounds(&tree), (40.0, 30.0));
    }

    #[test]
    fn test_invalid_svg_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.svg");
        std::fs::write(&path, "<svg").unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Vector(SvgDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Failed);
        assert!(!composite.is_vector());
    }

    #[test]
    fn test_zero_size_document_is_measured() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zero.svg");
        std::fs::write(
            &path,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="0" height="0"><rect width="40" height="30"/></svg>"#,
        )
        .unwrap();

        let composite = Composite::new(UniversalPath::new(&path));
        let composite = Decoder::Vector(SvgDecoder).decode(composite, &CancelToken::new());

        assert_eq!(composite.state(), LoadState::Complete);
        assert!(composite.is_vector());
        assert_eq!(composite.content_size(), (40.0, 30.0));
    }

    #[test]
    fn test_measure_clamps_content() {
        let huge = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10000 10000">
            <rect width="9000" height="20"/>
        </svg>"#;
        let tree = usvg::Tree::from_str(huge, &usvg::Options::default()).unwrap();
        assert_eq!(measure_content(&tree), (MEASURE_LIMIT, 20.0));

        let empty = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#;
        let tree = usvg::Tree::from_str(empty, &usvg::Options::default()).unwrap();
        assert_eq!(measure_content(&tree), (1.0, 1.0));
    }

    #[test]
    fn test_strip_root_size() {
        let text = r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" width="0" stroke-width="2" height='0'><rect width="4"/></svg>"#;
        assert_eq!(
            strip_root_size(text).unwrap(),
            r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg" stroke-width="2"><rect width="4"/></svg>"#
        );
        assert_eq!(strip_root_size("<svgfoo/>"), None);
    }
}

//! Position within an ordered image collection

use crate::error::AppError;
use app_fs::UniversalPath;
use app_imaging::ImageFormat;
use std::path::Path;

/// Ordered list of images and a cursor into it
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    images: Vec<UniversalPath>,
    current: Option<usize>,
}

impl Navigator {
    /// Build from a file or directory.
    ///
    /// A file opens its directory with the cursor on that file, even when
    /// its extension is not a supported one. A directory opens on its first
    /// image.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let target = UniversalPath::new(path.as_ref());

        if !target.exists() {
            return Err(AppError::FileNotFound(target.to_string()));
        }

        if target.is_dir() {
            let images = app_fs::list_images(target.as_path(), ImageFormat::is_supported)?;
            tracing::info!("[Navigator] Found {} images in {}", images.len(), target);
            return Ok(Self::from_paths(images));
        }

        let dir = target
            .parent()
            .ok_or_else(|| AppError::InvalidPath(target.to_string()))?;
        let mut images = app_fs::list_images(dir.as_path(), ImageFormat::is_supported)?;

        let index = match images.iter().position(|p| *p == target) {
            Some(index) => index,
            None => {
                images.push(target.clone());
                images.sort_by(|a, b| {
                    app_fs::natural_cmp(a.file_name().unwrap_or(""), b.file_name().unwrap_or(""))
                });
                images.iter().position(|p| *p == target).unwrap_or(0)
            }
        };

        tracing::info!("[Navigator] Found {} images in {}", images.len(), dir);
        Ok(Self {
            images,
            current: Some(index),
        })
    }

    /// Cursor on the first path, if any
    pub fn from_paths(images: Vec<UniversalPath>) -> Self {
        let current = if images.is_empty() { None } else { Some(0) };
        Self { images, current }
    }

    pub fn get_current(&self) -> Option<&UniversalPath> {
        self.current.and_then(|i| self.images.get(i))
    }

    /// Up to `depth` paths on each side of the current one, current
    /// included, in collection order
    pub fn get_range(&self, depth: usize) -> Vec<UniversalPath> {
        let Some(current) = self.current else {
            return Vec::new();
        };

        let start = current.saturating_sub(depth);
        let end = current.saturating_add(depth).min(self.images.len() - 1);
        self.images[start..=end].to_vec()
    }

    pub fn move_next(&mut self) -> bool {
        match self.current {
            Some(i) if i + 1 < self.images.len() => {
                self.current = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_previous(&mut self) -> bool {
        match self.current {
            Some(i) if i > 0 => {
                self.current = Some(i - 1);
                true
            }
            _ => false,
        }
    }

    pub fn move_first(&mut self) -> bool {
        self.move_to(0)
    }

    pub fn move_last(&mut self) -> bool {
        self.move_to(self.images.len().saturating_sub(1))
    }

    fn move_to(&mut self, index: usize) -> bool {
        if self.images.is_empty() || self.current == Some(index) {
            return false;
        }
        self.current = Some(index);
        true
    }

    pub fn has_next(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 < self.images.len())
    }

    pub fn has_previous(&self) -> bool {
        matches!(self.current, Some(i) if i > 0)
    }

    /// 1-based position and total count; (0, 0) when empty
    pub fn position(&self) -> (usize, usize) {
        (self.current.map_or(0, |i| i + 1), self.images.len())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(paths: &[UniversalPath]) -> Vec<&str> {
        paths.iter().filter_map(|p| p.file_name()).collect()
    }

    fn sample() -> Navigator {
        Navigator::from_paths(
            ["a.png", "b.png", "c.png", "d.png", "e.png"]
                .iter()
                .map(|n| UniversalPath::new(format!("/photos/{}", n)))
                .collect(),
        )
    }

    #[test]
    fn test_range_clamped() {
        let mut nav = sample();
        assert_eq!(names(&nav.get_range(2)), vec!["a.png", "b.png", "c.png"]);

        nav.move_next();
        nav.move_next();
        assert_eq!(names(&nav.get_range(1)), vec!["b.png", "c.png", "d.png"]);
        assert_eq!(names(&nav.get_range(0)), vec!["c.png"]);

        nav.move_last();
        assert_eq!(names(&nav.get_range(10)).len(), 5);
    }

    #[test]
    fn test_movement_bounds() {
        let mut nav = sample();
        assert!(!nav.has_previous());
        assert!(!nav.move_previous());
        assert!(!nav.move_first());

        assert!(nav.move_last());
        assert_eq!(nav.position(), (5, 5));
        assert!(!nav.has_next());
        assert!(!nav.move_next());

        assert!(nav.move_previous());
        assert_eq!(nav.get_current().and_then(|p| p.file_name()), Some("d.png"));
    }

    #[test]
    fn test_empty() {
        let mut nav = Navigator::from_paths(Vec::new());
        assert!(nav.get_current().is_none());
        assert!(nav.get_range(3).is_empty());
        assert!(!nav.move_next());
        assert!(!nav.move_last());
        assert_eq!(nav.position(), (0, 0));
    }

    #[test]
    fn test_open_file_anchors_cursor() {
        let dir = TempDir::new().unwrap();
        for name in ["img1.png", "img2.jpg", "img10.png", "readme.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let nav = Navigator::open(dir.path().join("img2.jpg")).unwrap();
        assert_eq!(nav.position(), (2, 3));

        let nav = Navigator::open(dir.path()).unwrap();
        assert_eq!(nav.get_current().and_then(|p| p.file_name()), Some("img1.png"));
    }

    #[test]
    fn test_open_unsupported_file_still_included() {
        let dir = TempDir::new().unwrap();
        for name in ["a.png", "b.raw"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let nav = Navigator::open(dir.path().join("b.raw")).unwrap();
        assert_eq!(nav.position(), (2, 2));
    }

    #[test]
    fn test_open_missing() {
        assert!(matches!(
            Navigator::open("/definitely/not/here.png"),
            Err(AppError::FileNotFound(_))
        ));
    }
}

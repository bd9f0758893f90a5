//! UniversalPath - canonical absolute path with a filesystem-aware cache key

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Comparison key for a path.
///
/// Case-folded on platforms whose default filesystems are case-insensitive
/// (Windows, macOS), verbatim elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A path wrapper used as the identity of an image
///
/// Features:
/// - Absolute, normalized path (UNC prefixed on Windows for long paths)
/// - Lossy UTF-8 display string for logs and UI
/// - Cache key honouring filesystem case sensitivity
/// - Hash-based ID derived from the cache key
#[derive(Debug, Clone)]
pub struct UniversalPath {
    /// Raw path for file system operations
    raw: PathBuf,

    /// UTF-8 display string (lossy conversion)
    display: String,

    key: PathKey,

    id: u64,
}

impl UniversalPath {
    /// Create a new UniversalPath from any path-like type
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let raw = Self::normalize_path(path.as_ref());
        let display = raw.to_string_lossy().to_string();
        let key = PathKey(Self::fold_case(&display));
        let id = xxh3_64(key.0.as_bytes());

        Self { raw, display, key, id }
    }

    /// Get the raw path for file system operations
    pub fn as_path(&self) -> &Path {
        &self.raw
    }

    /// Get the raw PathBuf (owned)
    pub fn to_path_buf(&self) -> PathBuf {
        self.raw.clone()
    }

    /// Get the display string
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Key for caches and sets of paths
    pub fn cache_key(&self) -> &PathKey {
        &self.key
    }

    /// Hash of the cache key
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get parent directory
    pub fn parent(&self) -> Option<Self> {
        self.raw.parent().map(Self::new)
    }

    /// Get file name
    pub fn file_name(&self) -> Option<&str> {
        self.raw.file_name()?.to_str()
    }

    /// Get file extension
    pub fn extension(&self) -> Option<&str> {
        self.raw.extension()?.to_str()
    }

    pub fn exists(&self) -> bool {
        self.raw.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.raw.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.raw.is_file()
    }

    #[cfg(any(windows, target_os = "macos"))]
    fn fold_case(display: &str) -> String {
        display.to_lowercase()
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    fn fold_case(display: &str) -> String {
        display.to_string()
    }

    /// Normalize path and add UNC prefix on Windows
    #[cfg(windows)]
    fn normalize_path(path: &Path) -> PathBuf {
        use std::path::Component;

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        };

        // Resolve . and ..
        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::ParentDir => {
                    normalized.pop();
                }
                Component::CurDir => {}
                _ => normalized.push(component),
            }
        }

        let path_str = normalized.to_string_lossy();
        if !path_str.starts_with(r"\\?\") && !path_str.starts_with(r"\\.\") {
            PathBuf::from(format!(r"\\?\{}", path_str))
        } else {
            normalized
        }
    }

    #[cfg(not(windows))]
    fn normalize_path(path: &Path) -> PathBuf {
        if let Ok(canonical) = path.canonicalize() {
            return canonical;
        }

        // Missing files still need a stable absolute identity
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }
}

impl PartialEq for UniversalPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for UniversalPath {}

impl Hash for UniversalPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl AsRef<Path> for UniversalPath {
    fn as_ref(&self) -> &Path {
        &self.raw
    }
}

impl From<PathBuf> for UniversalPath {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for UniversalPath {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for UniversalPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for UniversalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Without the UNC prefix for readability
        let display = self.display.strip_prefix(r"\\?\").unwrap_or(&self.display);
        write!(f, "{}", display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_consistency() {
        let path1 = UniversalPath::new("/photos/image.jpg");
        let path2 = UniversalPath::new("/photos/image.jpg");
        assert_eq!(path1.id(), path2.id());
        assert_eq!(path1, path2);
    }

    #[test]
    fn test_relative_becomes_absolute() {
        let path = UniversalPath::new("missing-dir/image.jpg");
        assert!(path.as_path().is_absolute());
        assert!(path.display().contains("image.jpg"));
    }

    #[test]
    fn test_canonical_identity() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();

        let direct = UniversalPath::new(dir.path().join("a.png"));
        let dotted = UniversalPath::new(dir.path().join(".").join("a.png"));
        assert_eq!(direct.cache_key(), dotted.cache_key());
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn test_case_insensitive_key() {
        let upper = UniversalPath::new("/Photos/IMAGE.JPG");
        let lower = UniversalPath::new("/photos/image.jpg");
        assert_eq!(upper.cache_key(), lower.cache_key());
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    #[test]
    fn test_case_sensitive_key() {
        let upper = UniversalPath::new("/Photos/IMAGE.JPG");
        let lower = UniversalPath::new("/photos/image.jpg");
        assert_ne!(upper.cache_key(), lower.cache_key());
    }
}

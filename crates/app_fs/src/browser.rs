//! Directory listing for image collections

use crate::{FsError, Result, UniversalPath};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// List the files directly inside `dir` whose extension passes `accept`.
///
/// Hidden files and subdirectories are skipped. Results are in natural
/// order by file name ("image2" before "image10"), case-insensitive.
pub fn list_images<P, F>(dir: P, accept: F) -> Result<Vec<UniversalPath>>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
{
    let dir = dir.as_ref();

    if !dir.exists() {
        return Err(FsError::NotFound(dir.display().to_string()));
    }

    if !dir.is_dir() {
        return Err(FsError::InvalidPath(format!("Not a directory: {}", dir.display())));
    }

    let mut entries: Vec<(String, UniversalPath)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || is_hidden_file(&path) {
            continue;
        }

        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .map(&accept)
            .unwrap_or(false);
        if !accepted {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        entries.push((name, UniversalPath::new(path)));
    }

    entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));

    tracing::debug!("Listed {} images in {}", entries.len(), dir.display());
    Ok(entries.into_iter().map(|(_, path)| path).collect())
}

/// Natural, case-insensitive comparison of file names
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_sort_key(a)
        .cmp(&natural_sort_key(b))
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalSortPart {
    Num(u64),
    Str(String),
}

/// Split into alternating text and number runs
fn natural_sort_key(s: &str) -> Vec<NaturalSortPart> {
    let mut parts = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(&first) = chars.peek() {
        let digits = first.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digits {
                break;
            }
            run.push(c);
            chars.next();
        }

        // Runs too long for u64 fall back to text comparison
        match run.parse::<u64>() {
            Ok(n) if digits => parts.push(NaturalSortPart::Num(n)),
            _ => parts.push(NaturalSortPart::Str(run.to_lowercase())),
        }
    }

    parts
}

#[cfg(windows)]
fn is_hidden_file(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;

    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    fs::metadata(path)
        .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

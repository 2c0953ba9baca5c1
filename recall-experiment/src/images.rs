use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

pub fn is_url(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://")
}

/// URL, or a path whose file name carries a known image extension.
pub fn looks_like_image(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    if is_url(s) {
        return true;
    }
    Path::new(&s.replace('\\', "/"))
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Maps the image cells of a stimulus row to something a renderer can load.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    images_dir: PathBuf,
}

impl ImageResolver {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    /// Lookup order: URL as-is, the path itself, `images_dir/<file name>`,
    /// then a case-insensitive search below `images_dir`.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let raw = raw.trim().replace('\\', "/");
        if raw.is_empty() {
            return None;
        }
        if is_url(&raw) {
            return Some(raw);
        }
        let direct = Path::new(&raw);
        if direct.exists() {
            return Some(raw);
        }
        let name = direct.file_name()?;
        let candidate = self.images_dir.join(name);
        if candidate.exists() {
            return Some(candidate.to_string_lossy().into_owned());
        }
        let wanted = name.to_string_lossy().to_lowercase();
        find_case_insensitive(&self.images_dir, &wanted).map(|p| p.to_string_lossy().into_owned())
    }

    /// First candidate that looks like an image and resolves. A URL that
    /// could not be checked is still returned.
    pub fn pick(&self, candidates: &[&str]) -> Option<String> {
        for value in candidates.iter().map(|c| c.trim()) {
            if !looks_like_image(value) {
                continue;
            }
            if let Some(found) = self.resolve(value) {
                return Some(found);
            }
            debug!(image = value, dir = %self.images_dir.display(), "image not found");
        }
        None
    }
}

fn find_case_insensitive(dir: &Path, wanted: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if entry.file_name().to_string_lossy().to_lowercase() == wanted {
            return Some(path);
        }
    }
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_case_insensitive(sub, wanted))
}

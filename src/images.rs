//! Directory listing for wallpaper candidates.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::normalize_extension;

/// Return `true` if `path` has one of the allowed extensions.
///
/// `extensions` may be given with or without a leading dot and in any case.
#[must_use]
pub fn is_supported_image(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .and_then(normalize_extension)
        .is_some_and(|ext| {
            extensions
                .iter()
                .filter_map(|allowed| normalize_extension(allowed))
                .any(|allowed| allowed == ext)
        })
}

/// List the regular files directly inside `directory` whose extension is allowed,
/// sorted by path.
///
/// Symlinks are followed; dangling links are skipped. A missing directory yields
/// an empty list.
pub fn list_images(directory: &Path, extensions: &[String]) -> Vec<PathBuf> {
    if !directory.is_dir() {
        debug!(directory = %directory.display(), "not a directory; no images listed");
        return Vec::new();
    }

    let mut out: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported_image(path, extensions))
        .collect();
    out.sort();
    debug!(
        directory = %directory.display(),
        count = out.len(),
        "listed wallpaper candidates"
    );
    out
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("フォルダが見つかりません: {}", .0.display())]
    NotFound(PathBuf),
    #[error("フォルダを読めませんでした: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    pub path: PathBuf,
    pub stem: String,
    pub suffix: String,
    pub size_bytes: u64,
}

impl ImageFile {
    pub fn from_path(path: PathBuf, size_bytes: u64) -> Self {
        let stem = path
            .file_stem()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default();
        let suffix = path
            .extension()
            .map(|v| format!(".{}", v.to_string_lossy()))
            .unwrap_or_default();
        Self {
            path,
            stem,
            suffix,
            size_bytes,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Discovery {
    pub images: Vec<ImageFile>,
    /// Matching images before the prefix filter was applied.
    pub matched_types: usize,
}

/// Lists regular files directly under `root` whose extension is one of `extensions`
/// (compared case-insensitively, leading dot optional) and whose name starts with `prefix`.
/// Result is sorted by path.
pub fn discover_images(
    root: &Path,
    extensions: &[String],
    prefix: Option<&str>,
) -> Result<Discovery, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::NotFound(root.to_path_buf()));
    }

    let read_err = |source: io::Error| DiscoveryError::Read {
        path: root.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in fs::read_dir(root).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        if has_accepted_extension(&path, extensions) {
            images.push(ImageFile::from_path(path, meta.len()));
        }
    }
    images.sort_by(|a, b| a.path.cmp(&b.path));

    let matched_types = images.len();
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        images.retain(|image| image.file_name().starts_with(prefix));
    }

    Ok(Discovery {
        images,
        matched_types,
    })
}

fn has_accepted_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

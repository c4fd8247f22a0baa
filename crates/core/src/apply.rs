use crate::discover::ImageFile;
use crate::planner::{Location, RenamePlan};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("元ファイルが存在しません: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("リネーム先が既に存在します: {}", .0.display())]
    TargetExists(PathBuf),
    #[error("移動先フォルダを作成できませんでした: {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("リネームに失敗しました: {} -> {}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Failed,
}

/// One row of a run's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOutcome {
    pub original: String,
    pub description: String,
    pub new_name: String,
    pub location: Option<Location>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenameOutcome {
    pub fn succeeded(image: &ImageFile, description: &str, plan: &RenamePlan) -> Self {
        Self {
            original: image.file_name(),
            description: description.to_string(),
            new_name: plan.new_name.clone(),
            location: Some(plan.location),
            status: Status::Success,
            error: None,
        }
    }

    /// The file keeps its original name.
    pub fn failed(image: &ImageFile, description: &str, reason: impl ToString) -> Self {
        Self {
            original: image.file_name(),
            description: description.to_string(),
            new_name: image.file_name(),
            location: None,
            status: Status::Failed,
            error: Some(reason.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Carries out `plan` for `image`. In preview nothing on disk is touched and the
/// outcome is always a success.
pub fn apply_rename(
    image: &ImageFile,
    description: &str,
    plan: &RenamePlan,
    preview: bool,
) -> RenameOutcome {
    if preview {
        return RenameOutcome::succeeded(image, description, plan);
    }

    let create_dir = plan.location == Location::RenamedFolder;
    match move_file(&image.path, &plan.target_path, create_dir) {
        Ok(()) => RenameOutcome::succeeded(image, description, plan),
        Err(err) => RenameOutcome::failed(image, description, err),
    }
}

/// Renames `from` to `to` without overwriting. With `create_parent`, the destination
/// directory itself (not its ancestors) is created first if missing.
pub fn move_file(from: &Path, to: &Path, create_parent: bool) -> Result<(), MoveError> {
    if !from.exists() {
        return Err(MoveError::SourceMissing(from.to_path_buf()));
    }
    if from == to {
        return Ok(());
    }

    if create_parent {
        if let Some(parent) = to.parent() {
            ensure_dir(parent)?;
        }
    }

    let rename_err = |source: io::Error| MoveError::Rename {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    // hard_link fails atomically when `to` exists; fs::rename would replace it.
    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(err) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(rename_err(err));
            }
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            Err(MoveError::TargetExists(to.to_path_buf()))
        }
        Err(_) => {
            // Filesystems without hard links: check-then-rename, racy against
            // concurrent writers to the same folder.
            if to.exists() {
                return Err(MoveError::TargetExists(to.to_path_buf()));
            }
            fs::rename(from, to).map_err(rename_err)
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), MoveError> {
    match fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(_) if dir.is_dir() => Ok(()),
        Err(source) => Err(MoveError::CreateDir {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

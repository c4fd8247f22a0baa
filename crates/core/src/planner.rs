use crate::discover::ImageFile;
use crate::sanitize::sanitize_description;
use crate::template::{render_file_name, NameFields, TemplateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const RENAMED_DIR: &str = "renamed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    #[serde(rename = "same folder")]
    SameFolder,
    #[serde(rename = "renamed folder")]
    RenamedFolder,
}

impl Location {
    pub fn label(self) -> &'static str {
        match self {
            Location::SameFolder => "same folder",
            Location::RenamedFolder => "renamed folder",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePlan {
    pub new_name: String,
    pub target_path: PathBuf,
    pub location: Location,
    /// False in preview even when moving is configured; nothing gets created then.
    pub will_move: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingOptions<'a> {
    pub template: &'a str,
    pub max_name_len: usize,
    pub move_to_renamed: bool,
    pub preview: bool,
}

pub fn renamed_dir_for(folder: &Path) -> PathBuf {
    folder.join(RENAMED_DIR)
}

/// Derives the new name and destination of `image` from its description. Pure.
pub fn plan_rename(
    image: &ImageFile,
    description: &str,
    options: &NamingOptions<'_>,
) -> Result<RenamePlan, TemplateError> {
    let safe_description = sanitize_description(description, options.max_name_len);
    let new_name = render_file_name(
        options.template,
        &NameFields {
            base: &image.stem,
            description: &safe_description,
        },
        &image.suffix,
    )?;

    let parent = image.path.parent().unwrap_or_else(|| Path::new("."));
    let (location, target_dir) = if options.move_to_renamed {
        (Location::RenamedFolder, renamed_dir_for(parent))
    } else {
        (Location::SameFolder, parent.to_path_buf())
    };

    Ok(RenamePlan {
        target_path: target_dir.join(&new_name),
        new_name,
        location,
        will_move: options.move_to_renamed && !options.preview,
    })
}

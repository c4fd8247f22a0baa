use crate::apply::{apply_rename, RenameOutcome};
use crate::describe::{build_prompt, Describer};
use crate::discover::{discover_images, DiscoveryError, ImageFile};
use crate::planner::{plan_rename, renamed_dir_for, NamingOptions};
use crate::sanitize::DEFAULT_MAX_NAME_LEN;
use crate::template::DEFAULT_TEMPLATE;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SUPPORTED_FILE_TYPES: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const DEFAULT_PROMPT: &str =
    "Pay close attention to the site name, URL, and all visible text in the image.";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("バッチサイズは1以上にしてください: {0}")]
    BatchSize(usize),
    #[error("待ち時間は0秒以上の有限値にしてください: {0}")]
    Delay(f64),
    #[error("最大単語数は1以上にしてください: {0}")]
    MaxWords(usize),
    #[error("ファイル名の最大長は1以上にしてください: {0}")]
    MaxNameLen(usize),
    #[error("対象の拡張子が指定されていません")]
    NoFileTypes,
    #[error("未対応の拡張子です: {0}")]
    UnsupportedFileType(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOptions {
    pub folder: PathBuf,
    pub file_prefix: Option<String>,
    pub batch_size: usize,
    pub delay_secs: f64,
    pub template: String,
    pub file_types: Vec<String>,
    pub move_to_renamed: bool,
    pub preview: bool,
    pub max_words: usize,
    pub max_name_len: usize,
    pub prompt: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            file_prefix: None,
            batch_size: 10,
            delay_secs: 1.0,
            template: DEFAULT_TEMPLATE.to_string(),
            file_types: SUPPORTED_FILE_TYPES.iter().map(|s| s.to_string()).collect(),
            move_to_renamed: true,
            preview: true,
            max_words: 7,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    options: BatchOptions,
    delay: Duration,
}

impl BatchConfig {
    pub fn new(mut options: BatchOptions) -> Result<Self, ConfigError> {
        if options.batch_size == 0 {
            return Err(ConfigError::BatchSize(options.batch_size));
        }
        let delay = Duration::try_from_secs_f64(options.delay_secs)
            .map_err(|_| ConfigError::Delay(options.delay_secs))?;
        if options.max_words == 0 {
            return Err(ConfigError::MaxWords(options.max_words));
        }
        if options.max_name_len == 0 {
            return Err(ConfigError::MaxNameLen(options.max_name_len));
        }

        let mut file_types = Vec::<String>::with_capacity(options.file_types.len());
        for raw in &options.file_types {
            let normalized = raw.trim().trim_start_matches('.').to_ascii_lowercase();
            if !SUPPORTED_FILE_TYPES.contains(&normalized.as_str()) {
                return Err(ConfigError::UnsupportedFileType(raw.clone()));
            }
            if !file_types.contains(&normalized) {
                file_types.push(normalized);
            }
        }
        if file_types.is_empty() {
            return Err(ConfigError::NoFileTypes);
        }
        options.file_types = file_types;

        Ok(Self { options, delay })
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn full_prompt(&self) -> String {
        build_prompt(&self.options.prompt, self.options.max_words)
    }

    fn naming(&self) -> NamingOptions<'_> {
        NamingOptions {
            template: &self.options.template,
            max_name_len: self.options.max_name_len,
            move_to_renamed: self.options.move_to_renamed,
            preview: self.options.preview,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// 1-based.
    pub batch: usize,
    pub batches: usize,
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[RenameOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub preview: bool,
    pub prompt: String,
    pub renamed_dir: Option<PathBuf>,
    /// Images of an accepted type before the prefix filter.
    pub matched_types: usize,
    pub outcomes: Vec<RenameOutcome>,
    pub summary: RunSummary,
}

pub fn preview_description(image: &ImageFile) -> String {
    format!("Sample description for {}", image.file_name())
}

pub fn batch_count(files: usize, batch_size: usize) -> usize {
    files.div_ceil(batch_size.max(1))
}

pub fn run_batch<D>(config: &BatchConfig, describer: &D) -> Result<RunReport, DiscoveryError>
where
    D: Describer + ?Sized,
{
    run_batch_with_progress(config, describer, |_| {})
}

/// Discovers the images of `config.folder` and renames them batch by batch, one file
/// at a time. Only discovery can fail; every per-file error ends up as a failed outcome.
pub fn run_batch_with_progress<D, F>(
    config: &BatchConfig,
    describer: &D,
    mut on_progress: F,
) -> Result<RunReport, DiscoveryError>
where
    D: Describer + ?Sized,
    F: FnMut(&BatchProgress),
{
    let options = config.options();
    let started_at = Local::now();

    let discovery = discover_images(
        &options.folder,
        &options.file_types,
        options.file_prefix.as_deref(),
    )?;
    let images = discovery.images;
    let total = images.len();
    let batches = batch_count(total, options.batch_size);
    info!(
        folder = %options.folder.display(),
        files = total,
        batches,
        preview = options.preview,
        "run started"
    );

    let naming = config.naming();
    let prompt = config.full_prompt();
    let delay = config.delay();
    let mut outcomes = Vec::with_capacity(total);

    for (index, batch) in images.chunks(options.batch_size).enumerate() {
        debug!(batch = index + 1, batches, size = batch.len(), "batch started");
        for image in batch {
            on_progress(&BatchProgress {
                batch: index + 1,
                batches,
                done: outcomes.len(),
                total,
            });

            let outcome = process_image(config, &naming, describer, image);
            if outcome.is_success() {
                debug!(original = %outcome.original, new_name = %outcome.new_name, "renamed");
            } else {
                warn!(
                    original = %outcome.original,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "rename failed"
                );
            }
            outcomes.push(outcome);

            if !options.preview && !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }

    on_progress(&BatchProgress {
        batch: batches,
        batches,
        done: total,
        total,
    });

    let summary = RunSummary::from_outcomes(&outcomes);
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "run completed"
    );

    Ok(RunReport {
        started_at,
        finished_at: Local::now(),
        preview: options.preview,
        prompt,
        renamed_dir: options
            .move_to_renamed
            .then(|| renamed_dir_for(&options.folder)),
        matched_types: discovery.matched_types,
        outcomes,
        summary,
    })
}

fn process_image<D>(
    config: &BatchConfig,
    naming: &NamingOptions<'_>,
    describer: &D,
    image: &ImageFile,
) -> RenameOutcome
where
    D: Describer + ?Sized,
{
    let options = config.options();
    let description = if options.preview {
        preview_description(image)
    } else {
        match describer.describe(&image.path, &options.prompt, options.max_words) {
            Ok(text) => text,
            Err(err) => return RenameOutcome::failed(image, &format!("Error: {err}"), err),
        }
    };

    let plan = match plan_rename(image, &description, naming) {
        Ok(plan) => plan,
        Err(err) => return RenameOutcome::failed(image, &description, err),
    };

    apply_rename(image, &description, &plan, options.preview)
}

use crate::batch::{BatchOptions, DEFAULT_PROMPT};
use crate::describe::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
use crate::sanitize::DEFAULT_MAX_NAME_LEN;
use crate::template::DEFAULT_TEMPLATE;
use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub batch_size: usize,
    pub delay_secs: f64,
    pub template: String,
    pub file_types: Vec<String>,
    pub prompt: String,
    pub max_words: usize,
    pub max_name_len: usize,
    pub move_to_renamed: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            batch_size: 10,
            delay_secs: 1.0,
            template: DEFAULT_TEMPLATE.to_string(),
            file_types: [".png", ".jpg", ".jpeg", ".webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            prompt: DEFAULT_PROMPT.to_string(),
            max_words: 7,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            move_to_renamed: true,
        }
    }
}

impl AppConfig {
    /// Run options for `folder` seeded from this config, in preview mode.
    pub fn batch_options(&self, folder: PathBuf) -> BatchOptions {
        BatchOptions {
            folder,
            file_prefix: None,
            batch_size: self.batch_size,
            delay_secs: self.delay_secs,
            template: self.template.clone(),
            file_types: self.file_types.clone(),
            move_to_renamed: self.move_to_renamed,
            preview: true,
            max_words: self.max_words,
            max_name_len: self.max_name_len,
            prompt: self.prompt.clone(),
        }
    }

    /// Per-request timeout for the describe endpoint; zero is rejected.
    pub fn request_timeout(&self) -> Result<Duration> {
        if self.timeout_secs == 0 {
            bail!("タイムアウトは1秒以上にしてください: timeout_secs = 0");
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "shotname", "shotname")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&app_paths()?.config_path)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&app_paths()?.config_path, config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めませんでした: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| {
            format!("設定ディレクトリを作成できませんでした: {}", dir.display())
        })?;
    }
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(path, body)
        .with_context(|| format!("設定ファイルを書き込めませんでした: {}", path.display()))?;
    Ok(())
}

mod apply;
mod batch;
mod config;
mod describe;
mod discover;
mod planner;
mod sanitize;
mod template;

pub use apply::{apply_rename, move_file, MoveError, RenameOutcome, Status};
pub use batch::{
    batch_count, preview_description, run_batch, run_batch_with_progress, BatchConfig,
    BatchOptions, BatchProgress, ConfigError, RunReport, RunSummary, DEFAULT_PROMPT,
    SUPPORTED_FILE_TYPES,
};
pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use describe::{
    build_prompt, mime_for_path, parse_describe_response, DescribeError, Describer,
    DescriptionResult, HttpDescriber, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS,
};
pub use discover::{discover_images, Discovery, DiscoveryError, ImageFile};
pub use planner::{plan_rename, renamed_dir_for, Location, NamingOptions, RenamePlan, RENAMED_DIR};
pub use sanitize::{sanitize_description, truncate_words, DEFAULT_MAX_NAME_LEN};
pub use template::{
    parse_template, render_file_name, render_template, validate_template, NameFields,
    TemplateError, TemplatePart, Token, DEFAULT_TEMPLATE,
};

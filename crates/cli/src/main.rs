use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shotname_core::{
    app_paths, discover_images, load_config, parse_template, run_batch_with_progress,
    save_config, AppConfig, BatchConfig, HttpDescriber, RunReport,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "shotname-cli")]
#[command(about = "スクリーンショットを画像説明APIで解析し、内容に沿ったファイル名に一括リネームします")]
struct Cli {
    /// デバッグログを表示する
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Scan(ScanArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, Args)]
struct FolderArgs {
    #[arg(long)]
    folder: PathBuf,
    /// ファイル名の先頭一致フィルタ (例: Screenshot)
    #[arg(long)]
    prefix: Option<String>,
    /// 対象拡張子 (複数指定可: --file-type .png --file-type .jpg)
    #[arg(long = "file-type")]
    file_types: Vec<String>,
}

#[derive(Debug, Args)]
struct ScanArgs {
    #[command(flatten)]
    folder: FolderArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[command(flatten)]
    folder: FolderArgs,
    /// 実ファイルを変更する (未指定時はプレビュー)
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, env = "IDEOGRAM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long)]
    batch_size: Option<usize>,
    /// API呼び出し間の待ち時間 (秒)
    #[arg(long)]
    delay: Option<f64>,
    /// 使用可能な変数: {base}, {description}
    #[arg(long)]
    template: Option<String>,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    max_words: Option<usize>,
    /// 説明部分の最大文字数
    #[arg(long)]
    max_name_len: Option<usize>,
    /// API呼び出しのタイムアウト (秒)
    #[arg(long)]
    timeout: Option<u64>,
    /// renamedフォルダへ移動せず同じフォルダでリネームする
    #[arg(long, default_value_t = false)]
    in_place: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Scan(args) => cmd_scan(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init => cmd_config_init(),
        },
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let mut app_config = load_config()?;
    if let Some(timeout) = args.timeout {
        app_config.timeout_secs = timeout;
    }
    let mut options = app_config.batch_options(args.folder.folder);
    options.file_prefix = args.folder.prefix;
    if !args.folder.file_types.is_empty() {
        options.file_types = args.folder.file_types;
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if let Some(delay) = args.delay {
        options.delay_secs = delay;
    }
    if let Some(template) = args.template {
        options.template = template;
    }
    if let Some(prompt) = args.prompt {
        options.prompt = prompt;
    }
    if let Some(max_words) = args.max_words {
        options.max_words = max_words;
    }
    if let Some(max_name_len) = args.max_name_len {
        options.max_name_len = max_name_len;
    }
    if args.in_place {
        options.move_to_renamed = false;
    }
    options.preview = !args.apply;

    parse_template(&options.template)?;
    let config = BatchConfig::new(options)?;

    let api_key = args.api_key.unwrap_or_default();
    if args.apply && api_key.trim().is_empty() {
        anyhow::bail!("APIキーがありません。--api-key か IDEOGRAM_API_KEY を指定してください。");
    }
    let describer = HttpDescriber::new(
        app_config.endpoint.as_str(),
        api_key,
        app_config.request_timeout()?,
    )
    .context("HTTPクライアントを初期化できませんでした")?;

    eprintln!("使用するプロンプト: '{}'", config.full_prompt());

    let report = run_batch_with_progress(&config, &describer, |progress| {
        if progress.done < progress.total {
            info!(
                "バッチ {}/{} を処理中 ({}/{})",
                progress.batch, progress.batches, progress.done, progress.total
            );
        }
    })?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_report(&report),
    }

    print_summary(&report);
    Ok(())
}

fn cmd_scan(args: ScanArgs) -> Result<()> {
    let app_config = load_config()?;
    let file_types = if args.folder.file_types.is_empty() {
        app_config.file_types
    } else {
        args.folder.file_types
    };
    let discovery = discover_images(
        &args.folder.folder,
        &file_types,
        args.folder.prefix.as_deref(),
    )?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&discovery)?),
        OutputFormat::Table => {
            println!("ファイル名\tサイズ(KB)\t種類\tパス");
            for image in &discovery.images {
                println!(
                    "{}\t{:.2}\t{}\t{}",
                    image.file_name(),
                    image.size_bytes as f64 / 1024.0,
                    image.suffix,
                    image.path.display()
                );
            }
        }
    }

    if let Some(prefix) = args.folder.prefix.as_deref() {
        if discovery.images.len() < discovery.matched_types {
            eprintln!(
                "'{}' で始まる画像を {}/{} 件に絞り込みました",
                prefix,
                discovery.images.len(),
                discovery.matched_types
            );
        }
    }
    if discovery.images.is_empty() {
        eprintln!(
            "画像が見つかりません: {} (種類: {})",
            args.folder.folder.display(),
            file_types.join(", ")
        );
    } else {
        eprintln!("{}件の画像が見つかりました", discovery.images.len());
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() {
        anyhow::bail!(
            "設定ファイルは既に存在します: {}",
            paths.config_path.display()
        );
    }
    save_config(&AppConfig::default())?;
    println!("設定ファイルを作成しました: {}", paths.config_path.display());
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("元ファイル | 説明 | 新ファイル | 場所 | 状態");
    for outcome in &report.outcomes {
        println!(
            "{} | {} | {} | {} | {:?}",
            outcome.original,
            outcome.description,
            outcome.new_name,
            outcome.location.map(|l| l.label()).unwrap_or("N/A"),
            outcome.status
        );
        if let Some(error) = &outcome.error {
            println!("    エラー: {error}");
        }
    }
}

fn print_summary(report: &RunReport) {
    eprintln!(
        "\n集計: processed={} succeeded={} failed={}",
        report.summary.total, report.summary.succeeded, report.summary.failed
    );

    match (&report.renamed_dir, report.preview) {
        (Some(dir), true) => eprintln!("'renamed' フォルダの作成先: {}", dir.display()),
        (Some(dir), false) if report.summary.succeeded > 0 => eprintln!(
            "{}件のファイルを移動しました: {}",
            report.summary.succeeded,
            dir.display()
        ),
        _ => {}
    }

    if report.preview {
        eprintln!(
            "プレビューモード: 実ファイルは変更していません。適用するには --apply を指定してください。"
        );
    }
}

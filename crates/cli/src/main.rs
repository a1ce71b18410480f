use anyhow::{Context, Result};
use batch_renamer_core::{
    app_paths, clear_last_mapping, execute_plan, generate_plan, last_mapping, load_config,
    normalize_extensions, record_last_mapping, undo_mapping, validate_template, DiskOccupancy,
    ExecuteOptions, ExecutionReport, ExifDateSource, KamadakExifReader, NamingRules, NoExif,
    OperationOutcome, PlanOptions, RenameMapping, RenamePlan, SortKey, UndoResult,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "batch-renamer")]
#[command(about = "パターンに従ってファイル名を一括リネームします (既定は dry-run)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Undo(UndoArgs),
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
}

#[derive(Debug, Args)]
struct RenameArgs {
    /// 対象フォルダ
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,
    /// 命名パターン: {counter} {orig} {ext} {date} {mtime} {prefix} {suffix}
    /// 例: 'IMG_{counter:04d}' / '{date:%Y%m%d}_{orig}'
    #[arg(short, long)]
    pattern: Option<String>,
    #[arg(long, default_value = "")]
    prefix: String,
    #[arg(long, default_value = "")]
    suffix: String,
    /// 連番の開始値
    #[arg(long, allow_negative_numbers = true)]
    start: Option<i64>,
    /// 書式指定のない {counter} をこの桁数でゼロ埋め
    #[arg(long)]
    digits: Option<usize>,
    /// 対象拡張子 (カンマ区切り、例: "jpg,png")
    #[arg(long, value_delimiter = ',')]
    ext: Vec<String>,
    #[arg(short, long)]
    recursive: bool,
    #[arg(long, value_enum)]
    sort_by: Option<SortArg>,
    /// {date} に EXIF の撮影日時を優先して使う
    #[arg(long)]
    exif_date: bool,
    /// 実際にリネームする (指定しなければプレビューのみ)
    #[arg(short, long)]
    apply: bool,
    /// 対応表 (JSON) の保存先
    #[arg(long)]
    map_file: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct UndoArgs {
    /// 取り消しに使う対応表。省略時は直近の適用結果
    #[arg(long)]
    map_file: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Mtime,
    Ctime,
}

impl From<SortArg> for SortKey {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => SortKey::Name,
            SortArg::Mtime => SortKey::Mtime,
            SortArg::Ctime => SortKey::Ctime,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Rename(args) => args.verbose,
        Commands::Undo(args) => args.verbose,
        Commands::Config(_) => false,
    };
    init_logging(verbose);

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Undo(args) => cmd_undo(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;

    let pattern = args.pattern.unwrap_or(config.pattern);
    validate_template(&pattern)?;

    let extensions = if args.ext.is_empty() {
        normalize_extensions(&config.extensions)
    } else {
        normalize_extensions(&args.ext)
    };
    let digits = args.digits.unwrap_or(config.digits);
    let use_exif_date = args.exif_date || config.exif_date;

    let options = PlanOptions {
        root: args.dir.clone(),
        extensions,
        recursive: args.recursive || config.recursive,
        sort_by: args.sort_by.map(SortKey::from).unwrap_or(config.sort_by),
        rules: NamingRules {
            pattern,
            start: args.start.unwrap_or(config.start),
            digits: (digits > 0).then_some(digits),
            prefix: args.prefix,
            suffix: args.suffix,
            use_exif_date,
        },
    };

    let exif: &dyn ExifDateSource = if use_exif_date {
        &KamadakExifReader
    } else {
        &NoExif
    };
    let plan = generate_plan(&options, exif, &DiskOccupancy)?;

    if plan.operations.is_empty() {
        eprintln!("対象となるファイルが見つかりませんでした。");
        print_skipped(&plan);
        return Ok(());
    }

    let report = execute_plan(
        &plan.operations,
        &ExecuteOptions {
            apply: args.apply,
            verbose: args.verbose,
            mapping_path: args.map_file,
            root: args.dir,
        },
    );

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(&report, args.verbose),
    }
    print_skipped(&plan);

    if !report.applied {
        eprintln!(
            "\ndry-runモード: 実ファイルは変更していません。適用するには --apply を指定してください。"
        );
        eprintln!("リネーム予定: {}件", report.planned);
        return Ok(());
    }

    eprintln!(
        "\n適用完了: 成功 {}件 / 失敗 {}件 (計画 {}件)",
        report.renamed(),
        report.failed(),
        report.planned
    );
    if let Some(path) = &report.mapping_path {
        eprintln!("対応表を保存しました: {}", path.display());
        // An empty mapping has nothing to undo; keep pointing at the previous one.
        if report.renamed() == 0 {
            return Ok(());
        }
        if let Err(err) = app_paths().and_then(|paths| record_last_mapping(&paths, path)) {
            warn!(error = %err, "直近の対応表を記録できませんでした");
        }
    }
    if let Some(err) = &report.mapping_error {
        eprintln!("対応表の保存に失敗しました: {err}");
    }

    Ok(())
}

fn cmd_undo(args: UndoArgs) -> Result<()> {
    let paths = app_paths()?;
    let (mapping_path, from_history) = match args.map_file {
        Some(path) => (path, false),
        None => (last_mapping(&paths)?, true),
    };

    let mapping = RenameMapping::load(&mapping_path)
        .with_context(|| format!("対応表を読み込めませんでした: {}", mapping_path.display()))?;
    let result = undo_mapping(&mapping);
    print_undo(&result, args.verbose);

    if from_history && result.failed.is_empty() {
        clear_last_mapping(&paths)?;
    }

    println!("取り消し完了: 成功 {}件", result.restored_count());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_table(report: &ExecutionReport, verbose: bool) {
    for entry in &report.operations {
        let op = &entry.operation;
        match &entry.outcome {
            OperationOutcome::Previewed => {
                println!("{}  ->  {}", display_name(&op.src), display_name(&op.dst));
            }
            OperationOutcome::Renamed if verbose => {
                println!("{}  ->  {}", op.src.display(), op.dst.display());
            }
            OperationOutcome::Renamed => {}
            OperationOutcome::Failed { reason } => {
                println!(
                    "失敗: {} -> {} : {}",
                    op.src.display(),
                    op.dst.display(),
                    reason
                );
            }
        }
    }
}

fn print_skipped(plan: &RenamePlan) {
    for skipped in &plan.skipped {
        eprintln!(
            "読み取れないためスキップ: {} : {}",
            skipped.path.display(),
            skipped.reason
        );
    }
}

fn print_undo(result: &UndoResult, verbose: bool) {
    if verbose {
        for op in &result.restored {
            println!("REVERT: {} -> {}", op.dst.display(), op.src.display());
        }
    }
    for skipped in &result.skipped {
        println!(
            "スキップ (条件不成立): {} -> {} : {}",
            skipped.operation.dst.display(),
            skipped.operation.src.display(),
            skipped.reason
        );
    }
    for failed in &result.failed {
        println!(
            "取り消し失敗: {} -> {} : {}",
            failed.operation.dst.display(),
            failed.operation.src.display(),
            failed.reason
        );
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

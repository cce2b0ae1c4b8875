//! Binary entry point for the salvage diagnostic CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use salvage::{
    admin::VerifyLevel,
    diagnose::{self, error_chain, DiagnoseConfig, DiagnoseSummary},
};
use tracing_subscriber::{fmt, EnvFilter};

use config::CliConfig;
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "salvage",
    version,
    about = "Back up, check, export and dump a possibly damaged SQLite database"
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Database file to inspect")]
    db: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Diagnostic report destination")]
    report: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Logical dump destination")]
    dump: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory for per-table CSV files")]
    export_dir: Option<PathBuf>,

    #[arg(long, value_name = "PREFIX", help = "File name prefix for CSV exports")]
    export_prefix: Option<String>,

    #[arg(long, value_name = "ROWS", help = "Maximum rows exported per table")]
    row_limit: Option<usize>,

    #[arg(long, value_name = "MS", help = "Busy timeout for the connection")]
    busy_timeout_ms: Option<u64>,

    #[arg(long, value_enum, help = "Consistency checker to run")]
    level: Option<VerifyLevelArg>,

    #[arg(long, help = "Never run VACUUM, even on a clean database")]
    no_vacuum: bool,

    #[arg(long, short, help = "Do not mirror report lines to stdout")]
    quiet: bool,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for the run summary"
    )]
    format: OutputFormat,

    #[arg(long, value_enum, default_value_t = ThemeArg::Auto, help = "Color theme")]
    theme: ThemeArg,

    #[arg(
        long,
        value_name = "FILE",
        env = "SALVAGE_CONFIG",
        help = "Path to a TOML config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILTER",
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset"
    )]
    log_level: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VerifyLevelArg {
    Fast,
    Full,
}

impl From<VerifyLevelArg> for VerifyLevel {
    fn from(level: VerifyLevelArg) -> Self {
        match level {
            VerifyLevelArg::Fast => VerifyLevel::Fast,
            VerifyLevelArg::Full => VerifyLevel::Full,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    if let Err(err) = run(cli) {
        let mut lines = error_chain(err.as_ref()).into_iter();
        if let Some(head) = lines.next() {
            println!("Diagnostic tool crashed: {head}");
        }
        for line in lines {
            println!("{line}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let file_cfg = CliConfig::load(cli.config.clone())?;
    if let Some(path) = file_cfg.path() {
        tracing::debug!(config = %path.display(), "resolved CLI config path");
    }
    let cfg = build_config(&cli, &file_cfg);
    let summary = diagnose::run(&cfg)?;
    emit(&cli.format, &summary, |_| {
        print_summary_text(&Ui::new(cli.theme.into()), &summary, cli.quiet)
    })
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second subscriber is only possible in tests; ignore it.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Layers flags over the config file over built-in defaults.
fn build_config(cli: &Cli, file_cfg: &CliConfig) -> DiagnoseConfig {
    let defaults = file_cfg.diagnose();
    let db_path = cli
        .db
        .clone()
        .or_else(|| file_cfg.default_db_path().cloned())
        .unwrap_or_else(|| PathBuf::from(diagnose::DEFAULT_DATABASE));
    let mut cfg = DiagnoseConfig::for_database(db_path);

    if let Some(report) = cli.report.clone().or_else(|| defaults.report.clone()) {
        cfg.report_path = report;
    }
    if let Some(dump) = cli.dump.clone().or_else(|| defaults.dump.clone()) {
        cfg.dump_path = dump;
    }
    if let Some(dir) = cli.export_dir.clone().or_else(|| defaults.export_dir.clone()) {
        cfg.export.dir = dir;
    }
    if let Some(prefix) = cli
        .export_prefix
        .clone()
        .or_else(|| defaults.export_prefix.clone())
    {
        cfg.export.prefix = prefix;
    }
    if let Some(limit) = cli.row_limit.or(defaults.row_limit) {
        cfg.export.row_limit = limit;
    }
    if let Some(ms) = cli.busy_timeout_ms.or(defaults.busy_timeout_ms) {
        cfg.open.busy_timeout = Duration::from_millis(ms);
    }
    if let Some(level) = cli.level.or(defaults.level) {
        cfg.level = level.into();
    }
    cfg.vacuum = !cli.no_vacuum && defaults.vacuum.unwrap_or(true);
    // JSON output owns stdout.
    cfg.echo = !cli.quiet && cli.format == OutputFormat::Text;
    cfg
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_summary_text(ui: &Ui, summary: &DiagnoseSummary, quiet: bool) {
    if quiet {
        ui.artifacts(summary);
    }
    ui.steps(&summary.steps);
    ui.outcome(summary.outcome);
}

//! dev-digest - one-shot status digest across CI, boards and repos
//!
//! Loads the YAML config, runs every enabled producer under a global
//! deadline and prints the reports to stdout. Logs go to stderr.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use devdigest_core::config::parse_duration;
use devdigest_core::{
    init_tracing, render_json, render_reports, should_color, Config, ExecContext, OutputFormat,
    RenderOptions, Runner,
};
use devdigest_sources::builtin_registry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Level};

#[derive(Parser, Debug)]
#[command(name = "dev-digest")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Status digest from TeamCity and Azure DevOps", long_about = None)]
struct Cli {
    /// Config file (default: $DEV_DIGEST_CONFIG, then ./config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Console)]
    format: Format,

    /// Deadline for the whole run, e.g. 90s or 2m
    #[arg(long, value_parser = parse_deadline, default_value = "2m")]
    deadline: Duration,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Console,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Console => OutputFormat::Console,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn parse_deadline(input: &str) -> std::result::Result<Duration, String> {
    match parse_duration(input) {
        Ok(deadline) if deadline.is_zero() => Err("deadline must be positive".to_string()),
        Ok(deadline) => Ok(deadline),
        Err(err) => Err(err.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json_logs, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dev-digest: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = Config::resolve_path(cli.config.as_deref());
    let mut config = Config::load(&path)?;
    config.resolve_env();

    let token = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(token.clone());
    let root = ExecContext::background()
        .with_timeout(cli.deadline)
        .with_cancellation(token);

    let runner = Runner::new(builtin_registry()?);
    let outcome = runner.collect(root, &config).await;
    interrupt.abort();
    let reports = outcome?;

    let mut out = io::stdout().lock();
    match OutputFormat::from(cli.format) {
        OutputFormat::Console => {
            let color = should_color(
                cli.no_color,
                config.console.color,
                console::Term::stdout().is_term(),
            );
            render_reports(&mut out, &reports, RenderOptions { color })?;
        }
        OutputFormat::Json => render_json(&mut out, &reports)?,
    }
    out.flush()?;
    Ok(())
}

fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            token.cancel();
        }
    })
}

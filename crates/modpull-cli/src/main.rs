//! modpull - Bulk downloader for CurseForge mods
//!
//! Mirrors the newest file of every mod supporting a game version,
//! with the mod and file records stored next to it.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "modpull")]
#[command(about = "Bulk downloader for CurseForge mods")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./modpull.toml or ~/.config/modpull/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum concurrent HTTP connections
    #[arg(long, global = true)]
    max_connections: Option<usize>,

    /// Milliseconds between parallel worker starts
    #[arg(long, global = true)]
    stagger_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Download mods for a game version
    Fetch(cmd::fetch::FetchArgs),
    /// Show current configuration
    Config,
}

/// Exit status of a run aborted by a fatal error
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(modpull_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug; progress bars show activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    modpull_core::init_logging(quiet, cli.debug, multi);

    match run(cli, &progress) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: Cli, progress: &modpull_core::SharedProgress) -> anyhow::Result<ExitCode> {
    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // CLI overrides file values
    if let Some(secs) = cli.read_timeout {
        config.http.read_timeout = secs;
    }
    if let Some(n) = cli.max_connections {
        config.http.max_connections = n;
    }
    if let Some(ms) = cli.stagger_ms {
        config.workers.stagger_ms = ms;
    }

    modpull_core::set_http_config(modpull_core::HttpConfig {
        connect_timeout: Duration::from_secs(config.http.connect_timeout),
        read_timeout: Duration::from_secs(config.http.read_timeout),
        max_connections: config.http.max_connections.max(1),
    });

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, progress),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Output directory",
                &config.output.default_dir.display().to_string(),
            ]);
            table.add_row(vec!["Workers", &config.workers.default.to_string()]);
            table.add_row(vec!["Stagger", &format!("{}ms", config.workers.stagger_ms)]);
            table.add_row(vec!["API URL", &config.catalog.api_url]);
            table.add_row(vec![
                "Section",
                &format!("{}/{}", config.catalog.game_slug, config.catalog.category_slug),
            ]);
            table.add_row(vec!["Batch size", &config.catalog.batch_size.to_string()]);
            table.add_row(vec![
                "Connect timeout",
                &format!("{}s", config.http.connect_timeout),
            ]);
            table.add_row(vec![
                "Read timeout",
                &format!("{}s", config.http.read_timeout),
            ]);
            table.add_row(vec![
                "Max connections",
                &config.http.max_connections.to_string(),
            ]);
            table.add_row(vec!["Max attempts", &config.retry.max_attempts.to_string()]);
            table.add_row(vec!["Retry delay", &format!("{}ms", config.retry.delay_ms)]);

            eprintln!("\n{table}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

//! Fetch subcommand - download every mod file of one game version

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use modpull_core::SharedProgress;
use modpull_curse::config::limit_from_arg;
use modpull_curse::{HttpCatalog, HttpFetcher, RunSummary};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Game version files must support (e.g. 1.12.2)
    pub game_version: String,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum number of mods to process (0 or negative = all)
    #[arg(short = 'l', long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Mods requested per catalog page
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Attempts per mod, counting the first
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl FetchArgs {
    /// Run configuration from arguments, falling back to the config file
    pub fn to_run_config(&self, config: &Config) -> modpull_curse::Config {
        modpull_curse::Config {
            game_version: self.game_version.clone(),
            workers: self.workers.unwrap_or(config.workers.default),
            output_dir: self
                .output
                .clone()
                .unwrap_or_else(|| config.output.default_dir.clone()),
            limit: self.limit.and_then(limit_from_arg),
            batch_size: self.batch_size.unwrap_or(config.catalog.batch_size),
            max_attempts: self.max_attempts.unwrap_or(config.retry.max_attempts),
            retry_delay: config.retry.delay(),
            stagger: Duration::from_millis(config.workers.stagger_ms),
            catalog: config.catalog.settings(),
        }
    }
}

/// Print a key-value summary table on stderr
fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

/// Returns the exit code for a finished run; `Err` means the run aborted
pub fn run(args: FetchArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let run_config = args.to_run_config(config);
    run_config.validate()?;

    log::info!("Fetching mods for {}", run_config.game_version);
    log::info!("  Output: {}", run_config.output_dir.display());
    log::info!("  Catalog: {}", run_config.catalog.api_url);

    let catalog = HttpCatalog::connect(&run_config.catalog, &run_config.game_version)?;
    let summary = modpull_curse::run(&run_config, &catalog, &HttpFetcher, progress)?;

    report(&summary, progress);
    Ok(summary.exit_code())
}

fn report(summary: &RunSummary, progress: &SharedProgress) {
    if progress.is_tty() {
        print_summary("Mods", &summary.rows());
    } else {
        summary.log();
    }
    println!("{}", summary.report());
}

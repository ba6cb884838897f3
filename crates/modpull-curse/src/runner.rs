//! Worker pool orchestration for a download run

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use indicatif::HumanBytes;
use modpull_core::progress::fmt_num;
use modpull_core::{
    FatalSignal, PageSource, SharedProgress, Stats, StatsSnapshot, cleanup_partial_files,
    worker_thread_name,
};

use crate::catalog::{CatalogClient, CatalogPages};
use crate::config::Config;
use crate::fetcher::FileFetcher;
use crate::worker::{ItemProcessor, WorkerContext};

/// Run the download pool to completion.
///
/// Returns the final statistics once every worker has joined, or the first
/// fatal error raised by any worker.
pub fn run(
    config: &Config,
    catalog: &dyn CatalogClient,
    fetcher: &dyn FileFetcher,
    progress: &SharedProgress,
) -> anyhow::Result<RunSummary> {
    config.validate()?;
    let start = Instant::now();

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Cannot create output directory {}",
            config.output_dir.display()
        )
    })?;
    let stale = cleanup_partial_files(&config.output_dir)
        .context("Failed to clean partial files of an earlier run")?;
    if stale > 0 {
        log::info!("Removed {stale} partial files");
    }

    log::info!(
        "Downloading files for {} with {} workers (batch size {}, limit {})",
        config.game_version,
        config.workers,
        config.batch_size,
        config
            .limit
            .map_or_else(|| "none".to_string(), |l| l.to_string())
    );

    let source = PageSource::new(CatalogPages(catalog), config.batch_size, config.limit);
    let stats = Stats::new();
    let fatal = FatalSignal::new();
    let items_bar = progress.items_bar(config.limit.map(|l| l as u64));

    let pool = worker_pool(config.workers)?;

    pool.install(|| {
        rayon::scope(|s| {
            for slot in 0..config.workers {
                let ctx = WorkerContext {
                    source: &source,
                    processor: ItemProcessor {
                        catalog,
                        fetcher,
                        output_dir: &config.output_dir,
                        game_version: &config.game_version,
                    },
                    stats: &stats,
                    fatal: &fatal,
                    max_attempts: config.max_attempts,
                    retry_delay: config.retry_delay,
                    items_bar: &items_bar,
                };
                let fatal = &fatal;
                let stagger = config.stagger;
                s.spawn(move |_| {
                    let idx = current_worker_index(slot);
                    let status = progress.worker_line(&worker_thread_name(idx));
                    if !stagger.is_zero() {
                        std::thread::sleep(stagger * idx as u32);
                    }
                    match catch_unwind(AssertUnwindSafe(|| ctx.run(idx, &status))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => fatal.trip(e.context(format!("Worker {idx} aborted"))),
                        Err(_) => fatal.trip(anyhow::anyhow!("Worker {idx} panicked")),
                    }
                    status.finish_and_clear();
                });
            }
        });
    });

    items_bar.finish_and_clear();

    if let Some(e) = fatal.take_error() {
        return Err(e);
    }

    Ok(RunSummary {
        stats: stats.snapshot(),
        items_drawn: source.drawn(),
        elapsed: start.elapsed(),
    })
}

/// Pool whose thread `i` is named `download-worker-i`
fn worker_pool(workers: usize) -> anyhow::Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(worker_thread_name)
        .build()
        .context("Failed to create thread pool")
}

/// Index of the pool thread running the caller, so that worker numbers in
/// messages match the thread-name prefix of log lines
fn current_worker_index(fallback: usize) -> usize {
    rayon::current_thread_index().unwrap_or(fallback)
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    /// Items handed out by the catalog cursor
    pub items_drawn: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn empty() -> Self {
        Self {
            stats: StatsSnapshot::default(),
            items_drawn: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// 0 only when no item failed permanently
    pub fn exit_status(&self) -> u8 {
        if self.stats.failed == 0 { 0 } else { 1 }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// The two-line result report
    pub fn report(&self) -> String {
        format!(
            "Processing finished:\n\tSucceeded: {}\n\tFailed: {}",
            self.stats.succeeded, self.stats.failed
        )
    }

    /// Detail rows for tables: (label, value)
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Items drawn", fmt_num(self.items_drawn)),
            ("Succeeded", fmt_num(self.stats.succeeded)),
            ("Failed", fmt_num(self.stats.failed)),
            ("Files downloaded", fmt_num(self.stats.downloaded)),
            ("Already present", fmt_num(self.stats.already_present)),
            ("No matching file", fmt_num(self.stats.no_match)),
            ("Bytes", HumanBytes(self.stats.bytes).to_string()),
            ("Time", format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]
    }

    pub fn log(&self) {
        log::info!("=== Download Summary ===");
        log::info!(
            "Items: {} drawn, {} succeeded, {} failed",
            self.items_drawn,
            self.stats.succeeded,
            self.stats.failed
        );
        log::info!(
            "Files: {} downloaded ({}), {} already present, {} without matching file",
            self.stats.downloaded,
            HumanBytes(self.stats.bytes),
            self.stats.already_present,
            self.stats.no_match
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}
